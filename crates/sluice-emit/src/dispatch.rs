/*! Type-directed expression lowering.
 *
 * Each semantic type owns a [`TypeTransformer`] holding an ordered list of handlers. The
 * registry asks transformers in registration order whether they accept an expression, and the
 * first one that does hands it to its first matching handler. Handlers recurse through the
 * [`ExprEmitter`] for their operands, so nested expressions are dispatched the same way.
 */

use crate::emitter::EmitContext;
use crate::error::{EmitError, EmitOutcome};
use crate::handlers;
use crate::result::EmitResult;
use crate::storage::StorageLayout;
use sluice_core::{IRContract, IRExpression, Type};
use tracing::trace;

pub trait ExpressionHandler {
    fn name(&self) -> &'static str;

    fn can_handle(&self, expr: &IRExpression, emitter: &ExprEmitter<'_>) -> bool;

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult>;
}

pub struct TypeTransformer {
    name: &'static str,
    handlers: Vec<Box<dyn ExpressionHandler>>,
}

impl TypeTransformer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: Vec::new(),
        }
    }

    pub fn with_handler(mut self, handler: impl ExpressionHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn accepts(&self, expr: &IRExpression, emitter: &ExprEmitter<'_>) -> bool {
        self.handlers
            .iter()
            .any(|handler| handler.can_handle(expr, emitter))
    }

    fn find(&self, expr: &IRExpression, emitter: &ExprEmitter<'_>) -> Option<&dyn ExpressionHandler> {
        self.handlers
            .iter()
            .find(|handler| handler.can_handle(expr, emitter))
            .map(|handler| handler.as_ref())
    }
}

pub struct TransformerRegistry {
    transformers: Vec<TypeTransformer>,
}

impl Default for TransformerRegistry {
    /// Domain constructs first, then the value types, with the generic fallbacks last.
    fn default() -> Self {
        Self::new()
            .register(handlers::error::transformer())
            .register(handlers::event::transformer())
            .register(handlers::structs::transformer())
            .register(handlers::mapping::transformer())
            .register(handlers::array::transformer())
            .register(handlers::string::transformer())
            .register(handlers::address::transformer())
            .register(handlers::i256::transformer())
            .register(handlers::u256::transformer())
            .register(handlers::boolean::transformer())
            .register(handlers::base::transformer())
    }
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self {
            transformers: Vec::new(),
        }
    }

    pub fn register(mut self, transformer: TypeTransformer) -> Self {
        self.transformers.push(transformer);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transformers.iter().map(TypeTransformer::name).collect()
    }

    pub fn dispatch(
        &self,
        expr: &IRExpression,
        emitter: &mut ExprEmitter<'_>,
    ) -> EmitOutcome<EmitResult> {
        let found = {
            let view: &ExprEmitter<'_> = emitter;
            self.transformers.iter().find_map(|transformer| {
                transformer
                    .find(expr, view)
                    .map(|handler| (transformer.name(), handler))
            })
        };
        match found {
            Some((transformer, handler)) => {
                trace!(transformer, handler = handler.name(), kind = expr.kind_name(), "dispatching");
                handler.handle(expr, emitter)
            }
            None => Err(EmitError::NoHandler {
                kind: expr.kind_name(),
                ty: expr.ty().to_string(),
            }),
        }
    }
}

/// Lowers expressions of one contract through a registry.
pub struct ExprEmitter<'a> {
    registry: &'a TransformerRegistry,
    pub contract: &'a IRContract,
    pub layout: &'a StorageLayout,
    pub ctx: &'a mut EmitContext,
}

impl<'a> ExprEmitter<'a> {
    pub fn new(
        registry: &'a TransformerRegistry,
        contract: &'a IRContract,
        layout: &'a StorageLayout,
        ctx: &'a mut EmitContext,
    ) -> Self {
        Self {
            registry,
            contract,
            layout,
            ctx,
        }
    }

    pub fn emit(&mut self, expr: &IRExpression) -> EmitOutcome<EmitResult> {
        let registry = self.registry;
        registry.dispatch(expr, self)
    }

    /// Emits a value. Statement-only results are rejected here.
    pub fn emit_value(&mut self, expr: &IRExpression) -> EmitOutcome<EmitResult> {
        let result = self.emit(expr)?;
        if result.is_statement() {
            return Err(EmitError::Unsupported(format!(
                "{} expression used as a value",
                expr.kind_name()
            )));
        }
        Ok(result)
    }

    /// Emits operands left to right, returning their joined setup lines and values.
    pub fn emit_operands<'e>(
        &mut self,
        exprs: impl IntoIterator<Item = &'e IRExpression>,
    ) -> EmitOutcome<(Vec<String>, Vec<String>)> {
        let mut setup = Vec::new();
        let mut values = Vec::new();
        for expr in exprs {
            let result = self.emit_value(expr)?;
            setup.extend(result.setup_lines);
            values.push(result.value_expr);
        }
        Ok((setup, values))
    }

    pub fn temp(&mut self) -> String {
        self.ctx.fresh_temp()
    }

    /// Binds `call` to a fresh temporary so the resulting value stays side-effect free.
    pub fn bind(&mut self, mut setup: Vec<String>, call: String, ty: Type) -> EmitResult {
        let temp = self.temp();
        setup.push(format!("const {} = {};", temp, call));
        EmitResult::value(temp, ty).with_setup(setup)
    }

    /// A call made for its effect, or bound when it produces a value.
    pub fn call(&mut self, setup: Vec<String>, call: String, ty: Type) -> EmitResult {
        if ty == Type::Void {
            EmitResult::statement(setup, vec![format!("{};", call)])
        } else {
            self.bind(setup, call, ty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Fixed(&'static str);

    impl ExpressionHandler for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn can_handle(&self, _expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
            true
        }

        fn handle(&self, expr: &IRExpression, _emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
            Ok(EmitResult::value(self.0, expr.ty()))
        }
    }

    fn emit_with(registry: &TransformerRegistry, expr: &IRExpression) -> EmitOutcome<EmitResult> {
        let contract = IRContract::new("Test");
        let layout = StorageLayout::new(&contract);
        let mut ctx = EmitContext::new();
        let mut emitter = ExprEmitter::new(registry, &contract, &layout, &mut ctx);
        emitter.emit(expr)
    }

    #[test]
    fn test_first_match_wins_across_and_within_transformers() {
        let registry = TransformerRegistry::new()
            .register(TypeTransformer::new("empty"))
            .register(
                TypeTransformer::new("first")
                    .with_handler(Fixed("a"))
                    .with_handler(Fixed("b")),
            )
            .register(TypeTransformer::new("second").with_handler(Fixed("c")));

        let result = emit_with(&registry, &IRExpression::boolean(true)).unwrap();
        assert_eq!(result.value_expr, "a");
    }

    #[test]
    fn test_no_handler_is_a_typed_error() {
        let registry = TransformerRegistry::new();
        let err = emit_with(&registry, &IRExpression::number(1)).unwrap_err();
        assert_eq!(
            err,
            EmitError::NoHandler {
                kind: "literal",
                ty: "U256".into()
            }
        );
    }

    #[test]
    fn test_default_registration_order() {
        assert_eq!(
            TransformerRegistry::default().names(),
            vec![
                "error", "event", "struct", "mapping", "array", "string", "address", "i256",
                "u256", "boolean", "core"
            ]
        );
    }
}

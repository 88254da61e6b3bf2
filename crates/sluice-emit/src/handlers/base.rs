use crate::dispatch::{ExprEmitter, ExpressionHandler, TypeTransformer};
use crate::error::{EmitError, EmitOutcome};
use crate::result::EmitResult;
use sluice_core::{Callee, IRExpression, Scope, VariableKind};

/// Variables and internal calls, whatever their type.
pub fn transformer() -> TypeTransformer {
    TypeTransformer::new("core")
        .with_handler(LocalHandler)
        .with_handler(StorageReadHandler)
        .with_handler(InternalCallHandler)
}

struct LocalHandler;

impl ExpressionHandler for LocalHandler {
    fn name(&self) -> &'static str {
        "local"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Var {
                scope: Scope::Memory,
                ..
            }
        )
    }

    fn handle(&self, expr: &IRExpression, _emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        match expr {
            IRExpression::Var { name, ty, .. } => Ok(EmitResult::value(name.clone(), ty.clone())),
            _ => Err(EmitError::Unsupported("local".into())),
        }
    }
}

/// Whole-value reads of scalar and struct storage fields through `load_<field>()`.
struct StorageReadHandler;

impl ExpressionHandler for StorageReadHandler {
    fn name(&self) -> &'static str {
        "storage_read"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Var {
                scope: Scope::Storage,
                ..
            }
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Var { name, ty, .. } = expr else {
            return Err(EmitError::Unsupported("storage read".into()));
        };
        let entry = emitter
            .layout
            .entry(name)
            .ok_or_else(|| EmitError::UnresolvedAccessor(name.clone()))?;
        match entry.variable.kind {
            VariableKind::Simple | VariableKind::Struct => {
                Ok(emitter.bind(Vec::new(), format!("load_{}()", name), ty.clone()))
            }
            kind => Err(EmitError::Unsupported(format!(
                "reading {:?} storage field `{}` as a whole value",
                kind, name
            ))),
        }
    }
}

/// `this.helper(args)`
struct InternalCallHandler;

impl ExpressionHandler for InternalCallHandler {
    fn name(&self) -> &'static str {
        "internal_call"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Call {
                callee: Callee::Internal { .. },
                ..
            }
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Call {
            callee: Callee::Internal { name },
            args,
            return_type,
            ..
        } = expr
        else {
            return Err(EmitError::Unsupported("internal call".into()));
        };
        if emitter.contract.method(name).is_none() {
            return Err(EmitError::UnknownFunction(name.clone()));
        }
        let (setup, values) = emitter.emit_operands(args)?;
        let call = format!("{}({})", name, values.join(", "));
        Ok(emitter.call(setup, call, return_type.clone()))
    }
}

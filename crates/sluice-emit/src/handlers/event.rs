use crate::dispatch::{ExprEmitter, ExpressionHandler, TypeTransformer};
use crate::error::{EmitError, EmitOutcome};
use crate::interface::{check_event, emit_fn};
use crate::result::EmitResult;
use sluice_core::{Callee, IRExpression};

pub fn transformer() -> TypeTransformer {
    TypeTransformer::new("event").with_handler(EmitHandler)
}

/// `Transfer.emit(from, to, amount)` calls the generated log writer.
struct EmitHandler;

impl ExpressionHandler for EmitHandler {
    fn name(&self) -> &'static str {
        "emit"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Call {
                callee: Callee::EmitEvent { .. },
                ..
            }
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Call {
            callee: Callee::EmitEvent { event },
            args,
            ..
        } = expr
        else {
            return Err(EmitError::Unsupported("event emission".into()));
        };
        let contract = emitter.contract;
        let decl = contract
            .events
            .iter()
            .find(|decl| &decl.name == event)
            .ok_or_else(|| EmitError::UnresolvedAccessor(emit_fn(event)))?;
        check_event(decl)?;
        if decl.fields.len() != args.len() {
            return Err(EmitError::Unsupported(format!(
                "`{}.emit` with {} argument(s), expected {}",
                event,
                args.len(),
                decl.fields.len()
            )));
        }
        let (setup, values) = emitter.emit_operands(args)?;
        let line = format!("{}({});", emit_fn(event), values.join(", "));
        Ok(EmitResult::statement(setup, vec![line]))
    }
}

use crate::dispatch::{ExprEmitter, ExpressionHandler, TypeTransformer};
use crate::error::{EmitError, EmitOutcome};
use crate::interface::{check_error, revert_fn};
use crate::result::EmitResult;
use sluice_core::{Callee, IRExpression};

pub fn transformer() -> TypeTransformer {
    TypeTransformer::new("error").with_handler(RevertHandler)
}

/// `InsufficientBalance.revert(needed)` calls the generated payload constructor.
struct RevertHandler;

impl ExpressionHandler for RevertHandler {
    fn name(&self) -> &'static str {
        "revert"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Call {
                callee: Callee::RevertError { .. },
                ..
            }
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Call {
            callee: Callee::RevertError { error },
            args,
            ..
        } = expr
        else {
            return Err(EmitError::Unsupported("revert".into()));
        };
        let contract = emitter.contract;
        let decl = contract
            .errors
            .iter()
            .find(|decl| &decl.name == error)
            .ok_or_else(|| EmitError::UnresolvedAccessor(revert_fn(error)))?;
        check_error(decl)?;
        if decl.fields.len() != args.len() {
            return Err(EmitError::Unsupported(format!(
                "`{}.revert` with {} argument(s), expected {}",
                error,
                args.len(),
                decl.fields.len()
            )));
        }
        let (setup, values) = emitter.emit_operands(args)?;
        let line = format!("{}({});", revert_fn(error), values.join(", "));
        Ok(EmitResult::statement(setup, vec![line]))
    }
}

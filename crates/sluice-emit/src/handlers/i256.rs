use super::{binary_operand_type, emit_runtime_binary, emit_runtime_call, is_factory_call, receiver_type};
use crate::dispatch::{ExprEmitter, ExpressionHandler, TypeTransformer};
use crate::error::{EmitError, EmitOutcome};
use crate::result::EmitResult;
use sluice_core::{Factory, IRExpression, Type, UnaryOp};

pub fn transformer() -> TypeTransformer {
    TypeTransformer::new("i256")
        .with_handler(FactoryHandler)
        .with_handler(MethodHandler)
        .with_handler(BinaryHandler)
        .with_handler(NegateHandler)
}

struct FactoryHandler;

impl ExpressionHandler for FactoryHandler {
    fn name(&self) -> &'static str {
        "i256_factory"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        is_factory_call(expr, Factory::I256)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_call(emitter, "I256", expr)
    }
}

struct MethodHandler;

impl ExpressionHandler for MethodHandler {
    fn name(&self) -> &'static str {
        "i256_method"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        receiver_type(expr) == Some(Type::Int256)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_call(emitter, "I256", expr)
    }
}

struct BinaryHandler;

impl ExpressionHandler for BinaryHandler {
    fn name(&self) -> &'static str {
        "i256_binary"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(expr, IRExpression::Binary { op, .. } if !op.is_logical())
            && binary_operand_type(expr) == Some(Type::Int256)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_binary(emitter, "I256", expr)
    }
}

struct NegateHandler;

impl ExpressionHandler for NegateHandler {
    fn name(&self) -> &'static str {
        "i256_negate"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Unary { op: UnaryOp::Neg, operand, .. } if operand.ty() == Type::Int256
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Unary { operand, .. } = expr else {
            return Err(EmitError::Unsupported("negation".into()));
        };
        let value = emitter.emit_value(operand)?;
        let call = format!("I256.negate({})", value.value_expr);
        Ok(emitter.bind(value.setup_lines, call, Type::Int256))
    }
}

use super::{binary_operand_type, emit_runtime_call, is_factory_call, quote, receiver_type};
use crate::dispatch::{ExprEmitter, ExpressionHandler, TypeTransformer};
use crate::error::{EmitError, EmitOutcome};
use crate::result::EmitResult;
use sluice_core::{BinaryOp, Factory, IRExpression, Literal, Type};

pub fn transformer() -> TypeTransformer {
    TypeTransformer::new("string")
        .with_handler(LiteralHandler)
        .with_handler(FactoryHandler)
        .with_handler(LengthHandler)
        .with_handler(MethodHandler)
        .with_handler(BinaryHandler)
}

struct LiteralHandler;

impl ExpressionHandler for LiteralHandler {
    fn name(&self) -> &'static str {
        "string_literal"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Literal {
                value: Literal::Str(_),
                ..
            }
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Literal {
            value: Literal::Str(text),
            ..
        } = expr
        else {
            return Err(EmitError::Unsupported("non-string literal".into()));
        };
        let call = format!("Str.fromString({})", quote(text));
        Ok(emitter.bind(Vec::new(), call, Type::String))
    }
}

struct FactoryHandler;

impl ExpressionHandler for FactoryHandler {
    fn name(&self) -> &'static str {
        "string_factory"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        is_factory_call(expr, Factory::Str)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_call(emitter, "Str", expr)
    }
}

/// `text.length` read as a property.
struct LengthHandler;

impl ExpressionHandler for LengthHandler {
    fn name(&self) -> &'static str {
        "string_length"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Member { object, property, .. }
                if property == "length" && object.ty() == Type::String
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Member { object, .. } = expr else {
            return Err(EmitError::Unsupported("string length".into()));
        };
        let text = emitter.emit_value(object)?;
        let call = format!("U256.fromU64(Str.length({}))", text.value_expr);
        Ok(emitter.bind(text.setup_lines, call, Type::Uint256))
    }
}

struct MethodHandler;

impl ExpressionHandler for MethodHandler {
    fn name(&self) -> &'static str {
        "string_method"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        receiver_type(expr) == Some(Type::String)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_call(emitter, "Str", expr)
    }
}

/// Equality and `+` concatenation.
struct BinaryHandler;

impl ExpressionHandler for BinaryHandler {
    fn name(&self) -> &'static str {
        "string_binary"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Binary { op: BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Add, .. }
        ) && binary_operand_type(expr) == Some(Type::String)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Binary {
            op,
            left,
            right,
            ty,
        } = expr
        else {
            return Err(EmitError::Unsupported("string operator".into()));
        };
        let method = match op {
            BinaryOp::Add => "concat",
            other => other.method_name(),
        };
        let (setup, values) = emitter.emit_operands([left.as_ref(), right.as_ref()])?;
        let call = format!("Str.{}({})", method, values.join(", "));
        Ok(emitter.bind(setup, call, ty.clone()))
    }
}

use super::{emit_runtime_binary, emit_runtime_call, is_factory_call, receiver_type};
use crate::dispatch::{ExprEmitter, ExpressionHandler, TypeTransformer};
use crate::error::{EmitError, EmitOutcome};
use crate::result::EmitResult;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use sluice_core::{Builtin, Callee, Factory, IRExpression, Literal, Type, UnaryOp};

pub fn transformer() -> TypeTransformer {
    TypeTransformer::new("u256")
        .with_handler(LiteralHandler)
        .with_handler(FactoryHandler)
        .with_handler(BuiltinHandler)
        .with_handler(MethodHandler)
        .with_handler(BinaryHandler)
        .with_handler(NegateHandler)
}

/// Constructor call for a numeric constant. Anything wider than 64 bits goes through hex.
pub(crate) fn constant(value: &BigUint) -> String {
    match value.to_u64() {
        Some(small) => format!("U256.fromU64({})", small),
        None => format!("U256.fromHex(\"0x{}\")", value.to_str_radix(16)),
    }
}

struct LiteralHandler;

impl ExpressionHandler for LiteralHandler {
    fn name(&self) -> &'static str {
        "u256_literal"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Literal {
                value: Literal::Number(_),
                ..
            }
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Literal {
            value: Literal::Number(value),
            ..
        } = expr
        else {
            return Err(EmitError::Unsupported("non-numeric literal".into()));
        };
        Ok(emitter.bind(Vec::new(), constant(value), Type::Uint256))
    }
}

struct FactoryHandler;

impl ExpressionHandler for FactoryHandler {
    fn name(&self) -> &'static str {
        "u256_factory"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        is_factory_call(expr, Factory::U256)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_call(emitter, "U256", expr)
    }
}

/// Host reads that produce a wide unsigned integer.
struct BuiltinHandler;

impl ExpressionHandler for BuiltinHandler {
    fn name(&self) -> &'static str {
        "u256_builtin"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Call { callee: Callee::Builtin(builtin), .. } if builtin.ty() == Type::Uint256
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Call {
            callee: Callee::Builtin(builtin),
            ..
        } = expr
        else {
            return Err(EmitError::Unsupported("builtin".into()));
        };
        match builtin {
            Builtin::MsgValue => {
                let temp = emitter.temp();
                let setup = vec![
                    format!("const {} = malloc(32);", temp),
                    format!("msg_value({});", temp),
                ];
                Ok(EmitResult::value(temp, Type::Uint256).with_setup(setup))
            }
            Builtin::BlockTimestamp => Ok(emitter.bind(
                Vec::new(),
                "U256.fromU64(block_timestamp())".into(),
                Type::Uint256,
            )),
            Builtin::BlockNumber => Ok(emitter.bind(
                Vec::new(),
                "U256.fromU64(block_number())".into(),
                Type::Uint256,
            )),
            other => Err(EmitError::Unsupported(format!("builtin {:?} as U256", other))),
        }
    }
}

struct MethodHandler;

impl ExpressionHandler for MethodHandler {
    fn name(&self) -> &'static str {
        "u256_method"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        receiver_type(expr) == Some(Type::Uint256)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_call(emitter, "U256", expr)
    }
}

/// Arithmetic and comparisons with a U256 left operand.
struct BinaryHandler;

impl ExpressionHandler for BinaryHandler {
    fn name(&self) -> &'static str {
        "u256_binary"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Binary { op, left, .. } if !op.is_logical() && left.ty() == Type::Uint256
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_binary(emitter, "U256", expr)
    }
}

/// Wrapping negation of an unsigned value.
struct NegateHandler;

impl ExpressionHandler for NegateHandler {
    fn name(&self) -> &'static str {
        "u256_negate"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Unary { op: UnaryOp::Neg, operand, .. } if operand.ty() == Type::Uint256
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Unary { operand, .. } = expr else {
            return Err(EmitError::Unsupported("negation".into()));
        };
        let value = emitter.emit_value(operand)?;
        let call = format!("U256.negate({})", value.value_expr);
        Ok(emitter.bind(value.setup_lines, call, Type::Uint256))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Num;

    #[test]
    fn test_constants() {
        assert_eq!(constant(&BigUint::from(42u32)), "U256.fromU64(42)");
        let wide = BigUint::from_str_radix("ffffffffffffffffff", 16).unwrap();
        assert_eq!(constant(&wide), "U256.fromHex(\"0xffffffffffffffffff\")");
    }
}

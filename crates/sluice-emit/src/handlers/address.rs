use super::{binary_operand_type, emit_runtime_binary, emit_runtime_call, is_factory_call, receiver_type};
use crate::dispatch::{ExprEmitter, ExpressionHandler, TypeTransformer};
use crate::error::{EmitError, EmitOutcome};
use crate::result::EmitResult;
use sluice_core::{Builtin, Callee, Factory, IRExpression, Type};

pub fn transformer() -> TypeTransformer {
    TypeTransformer::new("address")
        .with_handler(FactoryHandler)
        .with_handler(BuiltinHandler)
        .with_handler(MethodHandler)
        .with_handler(BinaryHandler)
}

struct FactoryHandler;

impl ExpressionHandler for FactoryHandler {
    fn name(&self) -> &'static str {
        "address_factory"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        is_factory_call(expr, Factory::Address)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_call(emitter, "Address", expr)
    }
}

/// `msg.sender` and `contract.address`. Hosts write 20 bytes, which land right-aligned in
/// a zeroed word.
struct BuiltinHandler;

impl ExpressionHandler for BuiltinHandler {
    fn name(&self) -> &'static str {
        "address_builtin"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Call { callee: Callee::Builtin(builtin), .. } if builtin.ty() == Type::Address
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let host = match expr {
            IRExpression::Call {
                callee: Callee::Builtin(Builtin::MsgSender),
                ..
            } => "msg_sender",
            IRExpression::Call {
                callee: Callee::Builtin(Builtin::ContractAddress),
                ..
            } => "contract_address",
            _ => return Err(EmitError::Unsupported("builtin as Address".into())),
        };
        let temp = emitter.temp();
        let setup = vec![
            format!("const {} = malloc(32);", temp),
            format!("{}({} + 12);", host, temp),
        ];
        Ok(EmitResult::value(temp, Type::Address).with_setup(setup))
    }
}

struct MethodHandler;

impl ExpressionHandler for MethodHandler {
    fn name(&self) -> &'static str {
        "address_method"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        receiver_type(expr) == Some(Type::Address)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_call(emitter, "Address", expr)
    }
}

/// Address equality.
struct BinaryHandler;

impl ExpressionHandler for BinaryHandler {
    fn name(&self) -> &'static str {
        "address_binary"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(expr, IRExpression::Binary { op, .. } if op.is_comparison())
            && binary_operand_type(expr) == Some(Type::Address)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_binary(emitter, "Address", expr)
    }
}

/*! Expression handlers, one module per semantic type or domain construct.
 *
 * Every module exposes a `transformer()` constructor that bundles its handlers in match
 * order. Runtime calls are always bound to a fresh temporary, so the value a handler returns
 * is a plain name or literal.
 */

pub mod address;
pub mod array;
pub mod boolean;
pub mod base;
pub mod error;
pub mod event;
pub mod i256;
pub mod mapping;
pub mod string;
pub mod structs;
pub mod u256;

use crate::dispatch::ExprEmitter;
use crate::error::EmitOutcome;
use crate::result::EmitResult;
use sluice_core::{Callee, Factory, IRExpression, Scope, Type};

/// Type of the receiver when `expr` is a method call on a value.
pub(crate) fn receiver_type(expr: &IRExpression) -> Option<Type> {
    match expr {
        IRExpression::Call {
            callee: Callee::Method { .. },
            receiver: Some(receiver),
            ..
        } => Some(receiver.ty()),
        _ => None,
    }
}

pub(crate) fn is_factory_call(expr: &IRExpression, factory: Factory) -> bool {
    matches!(
        expr,
        IRExpression::Call { callee: Callee::Factory { factory: f, .. }, .. } if *f == factory
    )
}

/// Operand type of a binary expression, taken from its left side.
pub(crate) fn binary_operand_type(expr: &IRExpression) -> Option<Type> {
    match expr {
        IRExpression::Binary { left, .. } => Some(left.ty()),
        _ => None,
    }
}

/// A storage variable reference, as `(name, type)`.
pub(crate) fn storage_var(expr: &IRExpression) -> Option<(&str, &Type)> {
    match expr {
        IRExpression::Var {
            name,
            scope: Scope::Storage,
            ty,
        } => Some((name, ty)),
        _ => None,
    }
}

/// Lowers `Namespace.method(receiver, args..)` on a runtime value type.
pub(crate) fn emit_runtime_call(
    emitter: &mut ExprEmitter<'_>,
    namespace: &str,
    expr: &IRExpression,
) -> EmitOutcome<EmitResult> {
    let IRExpression::Call {
        callee,
        receiver,
        args,
        return_type,
        ..
    } = expr
    else {
        return Err(crate::error::EmitError::Unsupported(format!(
            "{} expression as a runtime call",
            expr.kind_name()
        )));
    };
    let method = match callee {
        Callee::Method { name } => name,
        Callee::Factory { method, .. } => method,
        other => {
            return Err(crate::error::EmitError::Unsupported(format!(
                "callee {:?} on {}",
                other, namespace
            )))
        }
    };
    let (setup, values) = emitter.emit_operands(receiver.as_deref().into_iter().chain(args))?;
    let call = format!("{}.{}({})", namespace, method, values.join(", "));
    Ok(emitter.call(setup, call, return_type.clone()))
}

/// Lowers a binary operator to `Namespace.<op>(left, right)`.
pub(crate) fn emit_runtime_binary(
    emitter: &mut ExprEmitter<'_>,
    namespace: &str,
    expr: &IRExpression,
) -> EmitOutcome<EmitResult> {
    let IRExpression::Binary {
        op,
        left,
        right,
        ty,
    } = expr
    else {
        return Err(crate::error::EmitError::Unsupported(format!(
            "{} expression as a binary operation",
            expr.kind_name()
        )));
    };
    let (setup, values) = emitter.emit_operands([left.as_ref(), right.as_ref()])?;
    let call = format!("{}.{}({})", namespace, op.method_name(), values.join(", "));
    Ok(emitter.bind(setup, call, ty.clone()))
}

/// Quotes a string literal for the generated source.
pub(crate) fn quote(value: &str) -> String {
    format!("{:?}", value)
}

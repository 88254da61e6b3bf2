/*! Method-call resolution.
 *
 * A call like `U256Factory.fromString("2").add(this.total)` arrives as nested
 * `call(property(call(property(..), ..), "add"), ..)` nodes. The receiver of each call is
 * classified first, chainable receivers are resolved depth-first, and the result is a
 * right-nested tree of `Call` nodes where every level knows its own return type.
 */

use super::context::BodyContext;
use super::errors::TransformError;
use super::expression_transformer::ExpressionTransformer;
use super::type_resolver::TypeResolver;
use sluice_core::{Callee, Expr, Factory, IRExpression, Scope, Type};
use tracing::trace;

/// Shape of the expression a method is invoked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverKind {
    Call,
    Property,
    Identifier,
}

impl ReceiverKind {
    pub fn classify(expr: &Expr) -> Option<ReceiverKind> {
        match expr {
            Expr::Call { .. } => Some(ReceiverKind::Call),
            Expr::Property { .. } | Expr::Element { .. } => Some(ReceiverKind::Property),
            Expr::Identifier { .. } | Expr::This => Some(ReceiverKind::Identifier),
            Expr::Paren { inner } => ReceiverKind::classify(inner),
            _ => None,
        }
    }

    /// Only the result of another call can itself carry further calls.
    pub fn is_chainable(self) -> bool {
        matches!(self, ReceiverKind::Call)
    }
}

pub struct ChainedCallResolver;

impl ChainedCallResolver {
    pub fn resolve(
        callee: &Expr,
        args: &[Expr],
        ctx: &mut BodyContext,
    ) -> Result<IRExpression, TransformError> {
        let (object, method) = match callee {
            Expr::Property { object, name } => (object.as_ref(), name.as_str()),
            Expr::Identifier { name } => {
                return Err(TransformError::UnsupportedExpression(format!(
                    "free function call `{}`",
                    name
                )))
            }
            _ => {
                return Err(TransformError::UnsupportedExpression(
                    "call on a computed callee".into(),
                ))
            }
        };

        match object {
            Expr::This => Self::resolve_internal(method, args, ctx),
            Expr::Identifier { name } if ctx.local(name).is_none() => {
                Self::resolve_static(name, method, args, ctx)
            }
            Expr::Property { object: inner, name: field }
                if matches!(inner.as_ref(), Expr::This)
                    && ctx.storage_type(field).map_or(false, Type::is_mapping) =>
            {
                Self::resolve_mapping(field, method, args, ctx)
            }
            receiver => Self::resolve_method(receiver, method, args, ctx),
        }
    }

    fn resolve_internal(
        method: &str,
        args: &[Expr],
        ctx: &mut BodyContext,
    ) -> Result<IRExpression, TransformError> {
        let return_type = ctx
            .symbols
            .function(method)
            .map(|signature| signature.return_type.clone())
            .ok_or_else(|| TransformError::UnknownIdentifier(format!("this.{}", method)))?;
        let args = ExpressionTransformer::transform_all(args, ctx)?;

        Ok(IRExpression::Call {
            callee: Callee::Internal {
                name: method.to_string(),
            },
            receiver: None,
            args,
            return_type,
            scope: Scope::Memory,
        })
    }

    /// Calls on a type-level name: factories, events, errors and struct constructors.
    fn resolve_static(
        name: &str,
        method: &str,
        args: &[Expr],
        ctx: &mut BodyContext,
    ) -> Result<IRExpression, TransformError> {
        let (callee, return_type) = if let Some(factory) = Factory::from_name(name) {
            (
                Callee::Factory {
                    factory,
                    method: method.to_string(),
                },
                TypeResolver::factory_return_type(factory, method),
            )
        } else if method == "emit" && ctx.symbols.event(name).is_some() {
            (
                Callee::EmitEvent {
                    event: name.to_string(),
                },
                Type::Void,
            )
        } else if method == "revert" && ctx.symbols.error(name).is_some() {
            (
                Callee::RevertError {
                    error: name.to_string(),
                },
                Type::Void,
            )
        } else if method == "create" && ctx.symbols.has_struct(name) {
            (
                Callee::StructCreate {
                    name: name.to_string(),
                },
                Type::Struct(name.to_string()),
            )
        } else {
            return Err(TransformError::UnknownIdentifier(format!("{}.{}", name, method)));
        };

        let args = ExpressionTransformer::transform_all(args, ctx)?;
        Ok(IRExpression::Call {
            callee,
            receiver: None,
            args,
            return_type,
            scope: Scope::Memory,
        })
    }

    fn resolve_mapping(
        field: &str,
        method: &str,
        args: &[Expr],
        ctx: &mut BodyContext,
    ) -> Result<IRExpression, TransformError> {
        let ty = ctx
            .storage_type(field)
            .cloned()
            .ok_or_else(|| TransformError::UnknownIdentifier(format!("this.{}", field)))?;
        let slot = ctx.slots.slot_for_variable(field)?;
        let mut args = ExpressionTransformer::transform_all(args, ctx)?.into_iter();
        let mapping = field.to_string();

        let expr = match (&ty, method, args.len()) {
            (Type::Mapping { value, .. }, "get", 1) => IRExpression::MapGet {
                mapping,
                slot,
                key: Box::new(Self::next_arg(&mut args)?),
                value_type: (**value).clone(),
            },
            (Type::Mapping { value, .. }, "set", 2) => IRExpression::MapSet {
                mapping,
                slot,
                key: Box::new(Self::next_arg(&mut args)?),
                value: Box::new(Self::next_arg(&mut args)?),
                value_type: (**value).clone(),
            },
            (Type::MappingNested { value, .. }, "get", 2) => IRExpression::MapGet2 {
                mapping,
                slot,
                outer_key: Box::new(Self::next_arg(&mut args)?),
                inner_key: Box::new(Self::next_arg(&mut args)?),
                value_type: (**value).clone(),
            },
            (Type::MappingNested { value, .. }, "set", 3) => IRExpression::MapSet2 {
                mapping,
                slot,
                outer_key: Box::new(Self::next_arg(&mut args)?),
                inner_key: Box::new(Self::next_arg(&mut args)?),
                value: Box::new(Self::next_arg(&mut args)?),
                value_type: (**value).clone(),
            },
            (_, method, count) => {
                return Err(TransformError::UnsupportedExpression(format!(
                    "this.{}.{} with {} argument(s)",
                    field, method, count
                )))
            }
        };
        Ok(expr)
    }

    fn next_arg(
        args: &mut impl Iterator<Item = IRExpression>,
    ) -> Result<IRExpression, TransformError> {
        args.next()
            .ok_or_else(|| TransformError::UnsupportedExpression("missing argument".into()))
    }

    fn resolve_method(
        receiver: &Expr,
        method: &str,
        args: &[Expr],
        ctx: &mut BodyContext,
    ) -> Result<IRExpression, TransformError> {
        let kind = ReceiverKind::classify(receiver).ok_or_else(|| {
            TransformError::UnsupportedExpression(format!("receiver of `.{}()`", method))
        })?;

        let receiver = if kind.is_chainable() {
            match receiver {
                Expr::Call { callee, args } => Self::resolve(callee, args, ctx)?,
                other => ExpressionTransformer::transform_expression(other, ctx)?,
            }
        } else {
            ExpressionTransformer::transform_expression(receiver, ctx)?
        };
        let args = ExpressionTransformer::transform_all(args, ctx)?;

        let receiver_ty = receiver.ty();
        let return_type = TypeResolver::method_return_type(&receiver_ty, method);
        trace!(?kind, %receiver_ty, method, %return_type, "resolved method call");

        let scope = match &receiver {
            IRExpression::Var { scope, .. } => *scope,
            _ => Scope::Memory,
        };

        Ok(IRExpression::Call {
            callee: Callee::Method {
                name: method.to_string(),
            },
            receiver: Some(Box::new(receiver)),
            args,
            return_type,
            scope,
        })
    }
}

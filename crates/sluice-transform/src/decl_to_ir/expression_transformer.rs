use super::chained_call::ChainedCallResolver;
use super::context::BodyContext;
use super::errors::TransformError;
use num_bigint::BigUint;
use num_traits::Num;
use sluice_core::{
    BinaryOp, Builtin, Callee, Expr, IRExpression, Literal, Scope, Type, UnaryOp,
};

pub struct ExpressionTransformer;

impl ExpressionTransformer {
    pub fn transform_expression(
        expr: &Expr,
        ctx: &mut BodyContext,
    ) -> Result<IRExpression, TransformError> {
        match expr {
            Expr::Identifier { name } => Self::transform_identifier(name, ctx),
            Expr::This => Err(TransformError::UnsupportedExpression(
                "`this` outside a member access".into(),
            )),
            Expr::Number { value } => Self::transform_number_literal(value),
            Expr::Str { value } => Ok(IRExpression::string(value.clone())),
            Expr::Bool { value } => Ok(IRExpression::boolean(*value)),
            Expr::Call { callee, args } => ChainedCallResolver::resolve(callee, args, ctx),
            Expr::Property { object, name } => Self::transform_member_expression(object, name, ctx),
            Expr::Element { object, index } => Self::transform_index_expression(object, index, ctx),
            Expr::Binary { op, left, right } => {
                Self::transform_binary_expression(op, left, right, ctx)
            }
            Expr::Unary { op, operand } => Self::transform_unary_expression(op, operand, ctx),
            Expr::Array { elements } => Self::transform_array_literal(elements, ctx),
            Expr::Assign { .. } => Err(TransformError::UnsupportedExpression(
                "assignment used as a value".into(),
            )),
            Expr::Paren { inner } => Self::transform_expression(inner, ctx),
        }
    }

    pub fn transform_all(
        exprs: &[Expr],
        ctx: &mut BodyContext,
    ) -> Result<Vec<IRExpression>, TransformError> {
        exprs
            .iter()
            .map(|expr| Self::transform_expression(expr, ctx))
            .collect()
    }

    fn transform_identifier(name: &str, ctx: &BodyContext) -> Result<IRExpression, TransformError> {
        ctx.local(name)
            .map(|ty| IRExpression::local(name, ty.clone()))
            .ok_or_else(|| TransformError::UnknownIdentifier(name.to_string()))
    }

    fn transform_number_literal(text: &str) -> Result<IRExpression, TransformError> {
        let clean = text.replace('_', "");
        let parsed = match clean.strip_prefix("0x").or_else(|| clean.strip_prefix("0X")) {
            Some(hex) => BigUint::from_str_radix(hex, 16),
            None => BigUint::from_str_radix(&clean, 10),
        };
        let value = parsed
            .map_err(|_| TransformError::UnsupportedExpression(format!("number literal `{}`", text)))?;
        if value.bits() > 256 {
            return Err(TransformError::LiteralOutOfRange(text.to_string()));
        }
        Ok(IRExpression::Literal {
            value: Literal::Number(value),
            ty: Type::Uint256,
        })
    }

    fn transform_member_expression(
        object: &Expr,
        property: &str,
        ctx: &mut BodyContext,
    ) -> Result<IRExpression, TransformError> {
        match object {
            Expr::This => {
                return ctx
                    .storage_type(property)
                    .map(|ty| IRExpression::storage(property, ty.clone()))
                    .ok_or_else(|| TransformError::UnknownIdentifier(format!("this.{}", property)));
            }
            Expr::Identifier { name } if ctx.local(name).is_none() => {
                if let Some(builtin) = Builtin::resolve(name, property) {
                    return Ok(IRExpression::Call {
                        callee: Callee::Builtin(builtin),
                        receiver: None,
                        args: vec![],
                        return_type: builtin.ty(),
                        scope: Scope::Memory,
                    });
                }
            }
            _ => {}
        }

        let object = Self::transform_expression(object, ctx)?;
        let object_ty = object.ty();
        let ty = match (&object_ty, property) {
            (Type::Struct(name), _) => ctx
                .symbols
                .struct_def(name)
                .and_then(|def| def.field(property))
                .map(|field| field.ty.clone())
                .ok_or_else(|| TransformError::UnknownIdentifier(format!("{}.{}", name, property)))?,
            (Type::Array { .. } | Type::String, "length") => Type::Uint256,
            _ => {
                return Err(TransformError::UnknownIdentifier(format!(
                    "{}.{}",
                    object_ty, property
                )))
            }
        };

        Ok(IRExpression::Member {
            object: Box::new(object),
            property: property.to_string(),
            ty,
        })
    }

    /// `a[i]` on arrays, and `this.m[k]` as shorthand for a mapping read.
    fn transform_index_expression(
        object: &Expr,
        index: &Expr,
        ctx: &mut BodyContext,
    ) -> Result<IRExpression, TransformError> {
        let array = Self::transform_expression(object, ctx)?;
        let index = Self::transform_expression(index, ctx)?;

        match array {
            IRExpression::Var {
                name,
                scope: Scope::Storage,
                ty: Type::Mapping { value, .. },
            } => {
                let slot = ctx.slots.slot_for_variable(&name)?;
                Ok(IRExpression::MapGet {
                    mapping: name,
                    slot,
                    key: Box::new(index),
                    value_type: *value,
                })
            }
            array => {
                let ty = array
                    .ty()
                    .array_element()
                    .cloned()
                    .ok_or_else(|| {
                        TransformError::UnsupportedExpression(format!(
                            "indexing a value of type {}",
                            array.ty()
                        ))
                    })?;
                Ok(IRExpression::ArrayAccess {
                    array: Box::new(array),
                    index: Box::new(index),
                    ty,
                })
            }
        }
    }

    fn transform_binary_expression(
        op: &str,
        left: &Expr,
        right: &Expr,
        ctx: &mut BodyContext,
    ) -> Result<IRExpression, TransformError> {
        let op = BinaryOp::from_token(op)
            .ok_or_else(|| TransformError::UnsupportedExpression(format!("operator `{}`", op)))?;
        let left = Self::transform_expression(left, ctx)?;
        let right = Self::transform_expression(right, ctx)?;

        let ty = if op.is_comparison() || op.is_logical() {
            Type::Bool
        } else {
            left.ty()
        };

        Ok(IRExpression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        })
    }

    fn transform_unary_expression(
        op: &str,
        operand: &Expr,
        ctx: &mut BodyContext,
    ) -> Result<IRExpression, TransformError> {
        let operand = Self::transform_expression(operand, ctx)?;
        let (op, ty) = match op {
            "!" => (UnaryOp::Not, Type::Bool),
            "-" => (UnaryOp::Neg, operand.ty()),
            other => {
                return Err(TransformError::UnsupportedExpression(format!(
                    "unary operator `{}`",
                    other
                )))
            }
        };
        Ok(IRExpression::Unary {
            op,
            operand: Box::new(operand),
            ty,
        })
    }

    fn transform_array_literal(
        elements: &[Expr],
        ctx: &mut BodyContext,
    ) -> Result<IRExpression, TransformError> {
        let elements = Self::transform_all(elements, ctx)?;
        let element = elements
            .first()
            .map(IRExpression::ty)
            .unwrap_or(Type::Uint256);
        Ok(IRExpression::ArrayLiteral {
            elements,
            ty: Type::Array {
                element: Box::new(element),
                length: None,
            },
        })
    }
}

use super::context::BodyContext;
use super::errors::TransformError;
use super::expression_transformer::ExpressionTransformer;
use super::type_resolver::TypeResolver;
use sluice_core::{Expr, IRExpression, IRStatement, Scope, Stmt};

pub struct StatementTransformer;

impl StatementTransformer {
    /// Lowers a statement list, reporting and skipping statements that fail.
    pub fn transform_block(stmts: &[Stmt], ctx: &mut BodyContext) -> Vec<IRStatement> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            match Self::transform_statement(stmt, ctx) {
                Ok(lowered) => out.push(lowered),
                Err(err) => ctx.report(err),
            }
        }
        out
    }

    fn transform_scoped(stmts: &[Stmt], ctx: &mut BodyContext) -> Vec<IRStatement> {
        ctx.push_scope();
        let body = Self::transform_block(stmts, ctx);
        ctx.pop_scope();
        body
    }

    pub fn transform_statement(
        stmt: &Stmt,
        ctx: &mut BodyContext,
    ) -> Result<IRStatement, TransformError> {
        match stmt {
            Stmt::Let {
                name,
                type_name,
                init,
            } => Self::transform_let(name, type_name.as_deref(), init.as_ref(), ctx),
            Stmt::Expr {
                expr: Expr::Assign { target, value },
            } => Self::transform_assignment(target, value, ctx),
            Stmt::Expr { expr } => Ok(IRStatement::Expr {
                expr: ExpressionTransformer::transform_expression(expr, ctx)?,
            }),
            Stmt::Return { value } => Ok(IRStatement::Return {
                value: value
                    .as_ref()
                    .map(|value| ExpressionTransformer::transform_expression(value, ctx))
                    .transpose()?,
            }),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = ExpressionTransformer::transform_expression(condition, ctx)?;
                Ok(IRStatement::If {
                    condition,
                    then_branch: Self::transform_scoped(then_branch, ctx),
                    else_branch: Self::transform_scoped(else_branch, ctx),
                })
            }
            Stmt::Block { body } => Ok(IRStatement::Block {
                body: Self::transform_scoped(body, ctx),
            }),
        }
    }

    fn transform_let(
        name: &str,
        type_name: Option<&str>,
        init: Option<&Expr>,
        ctx: &mut BodyContext,
    ) -> Result<IRStatement, TransformError> {
        let declared = type_name
            .map(|type_name| TypeResolver::resolve(type_name, ctx.symbols))
            .transpose()?;

        let init = match init.map(|init| ExpressionTransformer::transform_expression(init, ctx)) {
            Some(Ok(init)) => Some(init),
            Some(Err(err)) => {
                // keep the name visible so later statements don't cascade into E009
                if let Some(ty) = declared {
                    ctx.declare_local(name, ty);
                }
                return Err(err);
            }
            None => None,
        };

        let ty = declared
            .or_else(|| init.as_ref().map(IRExpression::ty))
            .ok_or_else(|| TransformError::MissingTypeAnnotation(name.to_string()))?;

        ctx.declare_local(name, ty.clone());
        Ok(IRStatement::Let {
            name: name.to_string(),
            ty,
            init,
        })
    }

    fn transform_assignment(
        target: &Expr,
        value: &Expr,
        ctx: &mut BodyContext,
    ) -> Result<IRStatement, TransformError> {
        let target = match target {
            Expr::Identifier { .. } | Expr::Property { .. } | Expr::Element { .. } => {
                ExpressionTransformer::transform_expression(target, ctx)?
            }
            Expr::Paren { inner } => return Self::transform_assignment(inner, value, ctx),
            _ => {
                return Err(TransformError::InvalidAssignmentTarget(
                    "left-hand side is not a variable, field or element".into(),
                ))
            }
        };
        let value = ExpressionTransformer::transform_expression(value, ctx)?;

        match target {
            IRExpression::MapGet {
                mapping,
                slot,
                key,
                value_type,
            } => Ok(IRStatement::Expr {
                expr: IRExpression::MapSet {
                    mapping,
                    slot,
                    key,
                    value: Box::new(value),
                    value_type,
                },
            }),
            IRExpression::Member {
                ref object,
                ref property,
                ..
            } if property == "length" && object.ty().struct_name().is_none() => Err(
                TransformError::InvalidAssignmentTarget(format!("`{}` is read-only", property)),
            ),
            IRExpression::Var { .. } | IRExpression::Member { .. } | IRExpression::ArrayAccess { .. } => {
                Ok(IRStatement::Assign { target, value })
            }
            other => Err(TransformError::InvalidAssignmentTarget(format!(
                "cannot assign to a {} expression",
                other.kind_name()
            ))),
        }
    }
}

/// Name of the first storage location written in `stmts`, searching nested blocks.
pub fn storage_write_target(stmts: &[IRStatement]) -> Option<&str> {
    stmts.iter().find_map(|stmt| match stmt {
        IRStatement::Assign { target, .. } => storage_root(target),
        IRStatement::Expr {
            expr: IRExpression::MapSet { mapping, .. } | IRExpression::MapSet2 { mapping, .. },
        } => Some(mapping.as_str()),
        IRStatement::If {
            then_branch,
            else_branch,
            ..
        } => storage_write_target(then_branch).or_else(|| storage_write_target(else_branch)),
        IRStatement::Block { body } => storage_write_target(body),
        _ => None,
    })
}

fn storage_root(target: &IRExpression) -> Option<&str> {
    match target {
        IRExpression::Var {
            name,
            scope: Scope::Storage,
            ..
        } => Some(name),
        IRExpression::Member { object, .. } => storage_root(object),
        IRExpression::ArrayAccess { array, .. } => storage_root(array),
        _ => None,
    }
}

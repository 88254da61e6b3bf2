use super::{binary_operand_type, emit_runtime_call, is_factory_call, receiver_type};
use crate::dispatch::{ExprEmitter, ExpressionHandler, TypeTransformer};
use crate::error::{EmitError, EmitOutcome};
use crate::result::EmitResult;
use sluice_core::{BinaryOp, Factory, IRExpression, Literal, Type, UnaryOp};

pub fn transformer() -> TypeTransformer {
    TypeTransformer::new("boolean")
        .with_handler(LiteralHandler)
        .with_handler(FactoryHandler)
        .with_handler(MethodHandler)
        .with_handler(LogicalHandler)
        .with_handler(EqualityHandler)
        .with_handler(NotHandler)
}

struct LiteralHandler;

impl ExpressionHandler for LiteralHandler {
    fn name(&self) -> &'static str {
        "bool_literal"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Literal {
                value: Literal::Bool(_),
                ..
            }
        )
    }

    fn handle(&self, expr: &IRExpression, _emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        match expr {
            IRExpression::Literal {
                value: Literal::Bool(value),
                ..
            } => Ok(EmitResult::value(value.to_string(), Type::Bool)),
            _ => Err(EmitError::Unsupported("non-boolean literal".into())),
        }
    }
}

struct FactoryHandler;

impl ExpressionHandler for FactoryHandler {
    fn name(&self) -> &'static str {
        "bool_factory"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        is_factory_call(expr, Factory::Boolean)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_call(emitter, "Bool", expr)
    }
}

struct MethodHandler;

impl ExpressionHandler for MethodHandler {
    fn name(&self) -> &'static str {
        "bool_method"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        receiver_type(expr) == Some(Type::Bool)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        emit_runtime_call(emitter, "Bool", expr)
    }
}

/// `&&` and `||`. The right operand's setup only runs when it can change the result.
struct LogicalHandler;

impl ExpressionHandler for LogicalHandler {
    fn name(&self) -> &'static str {
        "bool_logical"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(expr, IRExpression::Binary { op, .. } if op.is_logical())
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Binary {
            op, left, right, ..
        } = expr
        else {
            return Err(EmitError::Unsupported("logical operator".into()));
        };
        let symbol = if *op == BinaryOp::And { "&&" } else { "||" };
        let left = emitter.emit_value(left)?;
        let right = emitter.emit_value(right)?;

        if right.setup_lines.is_empty() {
            let value = format!("({} {} {})", left.value_expr, symbol, right.value_expr);
            return Ok(EmitResult::value(value, Type::Bool).with_setup(left.setup_lines));
        }

        let temp = emitter.temp();
        let indent = emitter.ctx.indent_chars.clone();
        let guard = if *op == BinaryOp::And {
            temp.clone()
        } else {
            format!("!{}", temp)
        };
        let mut setup = left.setup_lines;
        setup.push(format!("let {} = {};", temp, left.value_expr));
        setup.push(format!("if ({}) {{", guard));
        setup.extend(right.setup_lines.iter().map(|line| format!("{}{}", indent, line)));
        setup.push(format!("{}{} = {};", indent, temp, right.value_expr));
        setup.push("}".to_string());
        Ok(EmitResult::value(temp, Type::Bool).with_setup(setup))
    }
}

/// Equality between two booleans.
struct EqualityHandler;

impl ExpressionHandler for EqualityHandler {
    fn name(&self) -> &'static str {
        "bool_equality"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(expr, IRExpression::Binary { op: BinaryOp::Eq | BinaryOp::Ne, .. })
            && binary_operand_type(expr) == Some(Type::Bool)
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Binary {
            op, left, right, ..
        } = expr
        else {
            return Err(EmitError::Unsupported("boolean equality".into()));
        };
        let symbol = if *op == BinaryOp::Eq { "==" } else { "!=" };
        let (setup, values) = emitter.emit_operands([left.as_ref(), right.as_ref()])?;
        let value = format!("({} {} {})", values[0], symbol, values[1]);
        Ok(EmitResult::value(value, Type::Bool).with_setup(setup))
    }
}

struct NotHandler;

impl ExpressionHandler for NotHandler {
    fn name(&self) -> &'static str {
        "bool_not"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(expr, IRExpression::Unary { op: UnaryOp::Not, .. })
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Unary { operand, .. } = expr else {
            return Err(EmitError::Unsupported("negation".into()));
        };
        let value = emitter.emit_value(operand)?;
        let negated = format!("!{}", value.value_expr);
        Ok(EmitResult::value(negated, Type::Bool).with_setup(value.setup_lines))
    }
}

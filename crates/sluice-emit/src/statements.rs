/*! Statement lowering.
 *
 * Statements are lowered one at a time. A statement that fails to lower is replaced by an
 * inert `// ERROR:` line and recorded as a codegen diagnostic, and the rest of the body is
 * still emitted.
 */

use crate::dispatch::ExprEmitter;
use crate::error::{EmitError, EmitOutcome};
use crate::handlers::array::{index_u64, to_slot};
use crate::storage::{target_type, StoragePrimitive};
use crate::structs::{alloc_fn, memory_setter, storage_setter};
use sluice_core::{IRExpression, IRStatement, Scope, Type, VariableKind};
use tracing::warn;

pub fn lower_block(body: &[IRStatement], emitter: &mut ExprEmitter<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    for statement in body {
        match lower_statement(statement, emitter) {
            Ok(statement_lines) => lines.extend(statement_lines),
            Err(err) => {
                warn!(contract = %emitter.contract.name, error = %err, "statement lowered to an error comment");
                lines.push(format!("// ERROR: {}", err));
                emitter.ctx.report(err.to_string());
            }
        }
    }
    lines
}

fn indented(lines: Vec<String>, unit: &str) -> impl Iterator<Item = String> + '_ {
    lines.into_iter().map(move |line| format!("{}{}", unit, line))
}

pub fn lower_statement(
    statement: &IRStatement,
    emitter: &mut ExprEmitter<'_>,
) -> EmitOutcome<Vec<String>> {
    match statement {
        IRStatement::Let { name, ty, init } => {
            let (mut lines, value) = match init {
                Some(init) => {
                    let value = emitter.emit_value(init)?;
                    (value.setup_lines, value.value_expr)
                }
                None => (Vec::new(), zero_value(ty, emitter)?),
            };
            lines.push(format!("let {}: {} = {};", name, target_type(ty), value));
            Ok(lines)
        }
        IRStatement::Expr { expr } => Ok(emitter.emit(expr)?.into_statement_lines()),
        IRStatement::Return { value: None } => Ok(vec!["return;".to_string()]),
        IRStatement::Return { value: Some(value) } => {
            let value = emitter.emit_value(value)?;
            let mut lines = value.setup_lines;
            lines.push(format!("return {};", value.value_expr));
            Ok(lines)
        }
        IRStatement::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let condition = emitter.emit_value(condition)?;
            let unit = emitter.ctx.indent_chars.clone();
            let mut lines = condition.setup_lines;
            lines.push(format!("if ({}) {{", condition.value_expr));
            lines.extend(indented(lower_block(then_branch, emitter), &unit));
            if !else_branch.is_empty() {
                lines.push("} else {".to_string());
                lines.extend(indented(lower_block(else_branch, emitter), &unit));
            }
            lines.push("}".to_string());
            Ok(lines)
        }
        IRStatement::Block { body } => {
            let unit = emitter.ctx.indent_chars.clone();
            let mut lines = vec!["{".to_string()];
            lines.extend(indented(lower_block(body, emitter), &unit));
            lines.push("}".to_string());
            Ok(lines)
        }
        IRStatement::Assign { target, value } => lower_assign(target, value, emitter),
    }
}

/// Initial value of a local declared without an initializer.
fn zero_value(ty: &Type, emitter: &ExprEmitter<'_>) -> EmitOutcome<String> {
    match ty {
        Type::Bool => Ok("false".to_string()),
        Type::Uint256 | Type::Int256 | Type::Address => Ok("malloc(32)".to_string()),
        Type::String => Ok("Str.fromString(\"\")".to_string()),
        Type::Array { length, .. } => Ok(format!("Array.alloc({})", length.unwrap_or(0))),
        Type::Struct(name) if emitter.contract.struct_def(name).is_some() => {
            Ok(format!("{}()", alloc_fn(name)))
        }
        other => Err(EmitError::Unsupported(format!("local of type {}", other))),
    }
}

fn rooted_in_storage(expr: &IRExpression) -> bool {
    match expr {
        IRExpression::Var { scope, .. } => *scope == Scope::Storage,
        IRExpression::Member { object, .. } => rooted_in_storage(object),
        IRExpression::ArrayAccess { array, .. } => rooted_in_storage(array),
        _ => false,
    }
}

fn lower_assign(
    target: &IRExpression,
    value: &IRExpression,
    emitter: &mut ExprEmitter<'_>,
) -> EmitOutcome<Vec<String>> {
    match target {
        IRExpression::Var {
            name,
            scope: Scope::Memory,
            ..
        } => {
            let value = emitter.emit_value(value)?;
            let mut lines = value.setup_lines;
            lines.push(format!("{} = {};", name, value.value_expr));
            Ok(lines)
        }
        IRExpression::Var {
            name,
            scope: Scope::Storage,
            ..
        } => {
            let kind = emitter
                .layout
                .entry(name)
                .map(|entry| entry.variable.kind)
                .ok_or_else(|| EmitError::UnresolvedAccessor(name.clone()))?;
            if !matches!(kind, VariableKind::Simple | VariableKind::Struct) {
                return Err(EmitError::Unsupported(format!(
                    "assigning a whole {:?} storage field `{}`",
                    kind, name
                )));
            }
            let value = emitter.emit_value(value)?;
            let mut lines = value.setup_lines;
            lines.push(format!("store_{}({});", name, value.value_expr));
            Ok(lines)
        }
        IRExpression::Member {
            object, property, ..
        } => lower_field_assign(object, property, value, emitter),
        IRExpression::ArrayAccess { array, index, ty } => {
            let storage_name = match array.as_ref() {
                IRExpression::Var {
                    name,
                    scope: Scope::Storage,
                    ..
                } => Some(name),
                _ => None,
            };
            if let Some(name) = storage_name {
                StoragePrimitive::for_type(ty)
                    .ok_or_else(|| EmitError::UnresolvedAccessor(format!("store_{}", name)))?;
                let (mut lines, values) = emitter.emit_operands([index.as_ref(), value])?;
                lines.push(format!(
                    "store_{}({}, {});",
                    name,
                    index_u64(&values[0]),
                    values[1]
                ));
                return Ok(lines);
            }
            if rooted_in_storage(array) {
                return Err(EmitError::Unsupported(
                    "element assignment inside a storage struct".into(),
                ));
            }
            let (mut lines, values) =
                emitter.emit_operands([array.as_ref(), index.as_ref(), value])?;
            lines.push(format!(
                "Array.set({}, {}, {});",
                values[0],
                index_u64(&values[1]),
                to_slot(&values[2], ty)
            ));
            Ok(lines)
        }
        IRExpression::MapGet {
            mapping,
            slot,
            key,
            value_type,
        } => {
            let write = IRExpression::MapSet {
                mapping: mapping.clone(),
                slot: *slot,
                key: key.clone(),
                value: Box::new(value.clone()),
                value_type: value_type.clone(),
            };
            Ok(emitter.emit(&write)?.into_statement_lines())
        }
        IRExpression::MapGet2 {
            mapping,
            slot,
            outer_key,
            inner_key,
            value_type,
        } => {
            let write = IRExpression::MapSet2 {
                mapping: mapping.clone(),
                slot: *slot,
                outer_key: outer_key.clone(),
                inner_key: inner_key.clone(),
                value: Box::new(value.clone()),
                value_type: value_type.clone(),
            };
            Ok(emitter.emit(&write)?.into_statement_lines())
        }
        other => Err(EmitError::Unsupported(format!(
            "assignment to a {} expression",
            other.kind_name()
        ))),
    }
}

fn lower_field_assign(
    object: &IRExpression,
    property: &str,
    value: &IRExpression,
    emitter: &mut ExprEmitter<'_>,
) -> EmitOutcome<Vec<String>> {
    if let IRExpression::Var {
        name,
        scope: Scope::Storage,
        ..
    } = object
    {
        let prefix = emitter
            .layout
            .entry(name)
            .and_then(|entry| entry.accessor_prefix.clone())
            .ok_or_else(|| EmitError::UnresolvedAccessor(format!("{}.{}", name, property)))?;
        let value = emitter.emit_value(value)?;
        let mut lines = value.setup_lines;
        lines.push(format!(
            "{}({});",
            storage_setter(&prefix, property),
            value.value_expr
        ));
        return Ok(lines);
    }
    if rooted_in_storage(object) {
        return Err(EmitError::Unsupported(format!(
            "assignment to nested storage field `{}`",
            property
        )));
    }

    let object_type = object.ty();
    let struct_name = object_type
        .struct_name()
        .filter(|name| emitter.contract.struct_def(name).is_some())
        .ok_or_else(|| EmitError::Unsupported(format!("assignment to `{}` on {}", property, object_type)))?;
    let setter = memory_setter(struct_name, property);
    let (mut lines, values) = emitter.emit_operands([object, value])?;
    lines.push(format!("{}({}, {});", setter, values[0], values[1]));
    Ok(lines)
}

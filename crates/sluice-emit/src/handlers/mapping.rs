use crate::dispatch::{ExprEmitter, ExpressionHandler, TypeTransformer};
use crate::error::{EmitError, EmitOutcome};
use crate::result::EmitResult;
use crate::storage::{slot_constant, StoragePrimitive};
use sluice_core::{IRExpression, Type};

pub fn transformer() -> TypeTransformer {
    TypeTransformer::new("mapping")
        .with_handler(ReadHandler)
        .with_handler(WriteHandler)
}

/// A key as the 32-byte word the slot hash consumes.
fn key_word(value: &str, ty: &Type) -> String {
    match ty {
        Type::Bool => format!("Bool.toWord({})", value),
        Type::String => format!("Str.keyWord({})", value),
        _ => value.to_string(),
    }
}

fn primitive(value_type: &Type, mapping: &str) -> EmitOutcome<StoragePrimitive> {
    StoragePrimitive::for_type(value_type).ok_or_else(|| {
        EmitError::Unsupported(format!("mapping `{}` with {} values", mapping, value_type))
    })
}

/// Emits the keys and returns their setup lines plus the hashed slot expression.
fn slot_for(
    emitter: &mut ExprEmitter<'_>,
    slot: u64,
    keys: &[&IRExpression],
) -> EmitOutcome<(Vec<String>, String)> {
    let mut setup = Vec::new();
    let mut words = Vec::new();
    for key in keys {
        let result = emitter.emit_value(key)?;
        setup.extend(result.setup_lines);
        words.push(key_word(&result.value_expr, &key.ty()));
    }
    let helper = if keys.len() == 2 {
        "mapping_slot2"
    } else {
        "mapping_slot"
    };
    let slot_expr = format!("{}({}, {})", helper, slot_constant(slot), words.join(", "));
    Ok((setup, slot_expr))
}

struct ReadHandler;

impl ExpressionHandler for ReadHandler {
    fn name(&self) -> &'static str {
        "mapping_read"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(expr, IRExpression::MapGet { .. } | IRExpression::MapGet2 { .. })
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let (mapping, slot, keys, value_type) = match expr {
            IRExpression::MapGet {
                mapping,
                slot,
                key,
                value_type,
            } => (mapping, *slot, vec![key.as_ref()], value_type),
            IRExpression::MapGet2 {
                mapping,
                slot,
                outer_key,
                inner_key,
                value_type,
            } => (
                mapping,
                *slot,
                vec![outer_key.as_ref(), inner_key.as_ref()],
                value_type,
            ),
            _ => return Err(EmitError::Unsupported("mapping read".into())),
        };
        let primitive = primitive(value_type, mapping)?;
        let (mut setup, slot_expr) = slot_for(emitter, slot, &keys)?;
        let temp = emitter.temp();
        setup.extend(primitive.load_into(&slot_expr, &temp));
        Ok(EmitResult::value(temp, value_type.clone()).with_setup(setup))
    }
}

/// Mapping writes are statements; the value is evaluated after the keys.
struct WriteHandler;

impl ExpressionHandler for WriteHandler {
    fn name(&self) -> &'static str {
        "mapping_write"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(expr, IRExpression::MapSet { .. } | IRExpression::MapSet2 { .. })
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let (mapping, slot, keys, value, value_type) = match expr {
            IRExpression::MapSet {
                mapping,
                slot,
                key,
                value,
                value_type,
            } => (mapping, *slot, vec![key.as_ref()], value, value_type),
            IRExpression::MapSet2 {
                mapping,
                slot,
                outer_key,
                inner_key,
                value,
                value_type,
            } => (
                mapping,
                *slot,
                vec![outer_key.as_ref(), inner_key.as_ref()],
                value,
                value_type,
            ),
            _ => return Err(EmitError::Unsupported("mapping write".into())),
        };
        let primitive = primitive(value_type, mapping)?;
        let (mut setup, slot_expr) = slot_for(emitter, slot, &keys)?;
        let value = emitter.emit_value(value)?;
        setup.extend(value.setup_lines);
        let scratch = emitter.temp();
        let lines = primitive.store(&slot_expr, &value.value_expr, &scratch);
        Ok(EmitResult::statement(setup, lines))
    }
}

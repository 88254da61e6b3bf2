use super::storage_var;
use crate::dispatch::{ExprEmitter, ExpressionHandler, TypeTransformer};
use crate::error::{EmitError, EmitOutcome};
use crate::result::EmitResult;
use crate::structs::{alloc_fn, is_known_struct, memory_getter, storage_getter};
use sluice_core::{Callee, IRExpression};

pub fn transformer() -> TypeTransformer {
    TypeTransformer::new("struct")
        .with_handler(CreateHandler)
        .with_handler(StorageFieldHandler)
        .with_handler(MemoryFieldHandler)
}

/// `Info.create()` allocates a zeroed instance in memory.
struct CreateHandler;

impl ExpressionHandler for CreateHandler {
    fn name(&self) -> &'static str {
        "struct_create"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Call {
                callee: Callee::StructCreate { .. },
                ..
            }
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Call {
            callee: Callee::StructCreate { name },
            return_type,
            ..
        } = expr
        else {
            return Err(EmitError::Unsupported("struct creation".into()));
        };
        if emitter.contract.struct_def(name).is_none() {
            return Err(EmitError::UnresolvedAccessor(alloc_fn(name)));
        }
        Ok(emitter.bind(Vec::new(), format!("{}()", alloc_fn(name)), return_type.clone()))
    }
}

/// `this.info.a` reads one field straight from storage.
struct StorageFieldHandler;

impl ExpressionHandler for StorageFieldHandler {
    fn name(&self) -> &'static str {
        "struct_storage_field"
    }

    fn can_handle(&self, expr: &IRExpression, emitter: &ExprEmitter<'_>) -> bool {
        let IRExpression::Member { object, .. } = expr else {
            return false;
        };
        storage_var(object)
            .and_then(|(name, _)| emitter.layout.entry(name))
            .is_some_and(|entry| entry.accessor_prefix.is_some())
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Member {
            object,
            property,
            ty,
        } = expr
        else {
            return Err(EmitError::Unsupported("struct field".into()));
        };
        let prefix = storage_var(object)
            .and_then(|(name, _)| emitter.layout.entry(name))
            .and_then(|entry| entry.accessor_prefix.clone())
            .ok_or_else(|| EmitError::UnresolvedAccessor(property.clone()))?;
        let call = format!("{}()", storage_getter(&prefix, property));
        Ok(emitter.bind(Vec::new(), call, ty.clone()))
    }
}

/// Field reads on a struct value held in memory.
struct MemoryFieldHandler;

impl ExpressionHandler for MemoryFieldHandler {
    fn name(&self) -> &'static str {
        "struct_memory_field"
    }

    fn can_handle(&self, expr: &IRExpression, emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Member { object, .. } if is_known_struct(&object.ty(), emitter.contract)
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Member {
            object,
            property,
            ty,
        } = expr
        else {
            return Err(EmitError::Unsupported("struct field".into()));
        };
        let object_type = object.ty();
        let struct_name = object_type
            .struct_name()
            .ok_or_else(|| EmitError::UnresolvedAccessor(property.clone()))?;
        let has_field = emitter
            .contract
            .struct_def(struct_name)
            .is_some_and(|def| def.field(property).is_some());
        if !has_field {
            return Err(EmitError::UnresolvedAccessor(format!("{}.{}", struct_name, property)));
        }
        let getter = memory_getter(struct_name, property);
        let base = emitter.emit_value(object)?;
        let call = format!("{}({})", getter, base.value_expr);
        Ok(emitter.bind(base.setup_lines, call, ty.clone()))
    }
}

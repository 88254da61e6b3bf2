/*! Struct allocation and field accessors.
 *
 * A struct in memory is a flat block of `size` bytes laid out by field offset: words inline,
 * booleans as a single byte, strings as a pointer, nested structs inline. In storage each
 * field starts at `base + offset / 32` and uses the same primitive as a scalar field of
 * its type.
 */

use crate::emitter::{EmitContext, EmitHelper, WriteResult};
use crate::storage::{slot_at, target_type, StorageEntry, StoragePrimitive, FLUSH};
use sluice_core::types::WORD_SIZE;
use sluice_core::{IRContract, IRStruct, IRStructField, Type};
use std::io::Write;

pub fn accessor_prefix(struct_name: &str, variable: &str, shared: bool) -> String {
    if shared {
        format!("{}_{}", struct_name, variable)
    } else {
        struct_name.to_string()
    }
}

pub fn alloc_fn(struct_name: &str) -> String {
    format!("{}_alloc", struct_name)
}

pub fn load_fn(struct_name: &str) -> String {
    format!("{}_load", struct_name)
}

pub fn store_fn(struct_name: &str) -> String {
    format!("{}_store", struct_name)
}

pub fn storage_getter(prefix: &str, field: &str) -> String {
    format!("{}_get_{}", prefix, field)
}

pub fn storage_setter(prefix: &str, field: &str) -> String {
    format!("{}_set_{}", prefix, field)
}

pub fn memory_getter(struct_name: &str, field: &str) -> String {
    format!("{}_memory_get_{}", struct_name, field)
}

pub fn memory_setter(struct_name: &str, field: &str) -> String {
    format!("{}_memory_set_{}", struct_name, field)
}

enum FieldRepr<'a> {
    Primitive(StoragePrimitive),
    Nested(&'a IRStruct),
}

fn field_repr<'a>(field: &IRStructField, contract: &'a IRContract) -> Option<FieldRepr<'a>> {
    if let Some(primitive) = StoragePrimitive::for_type(&field.ty) {
        return Some(FieldRepr::Primitive(primitive));
    }
    field
        .ty
        .struct_name()
        .and_then(|name| contract.struct_def(name))
        .map(FieldRepr::Nested)
}

fn unsupported_field(def: &IRStruct, field: &IRStructField) -> String {
    format!(
        "field `{}.{}` of type {} has no accessors",
        def.name, field.name, field.ty
    )
}

/// Allocation, memory accessors and whole-struct storage copies for one struct.
pub fn write_struct_functions<W: Write>(
    def: &IRStruct,
    contract: &IRContract,
    writer: &mut W,
    ctx: &mut EmitContext,
) -> WriteResult {
    let name = &def.name;
    EmitHelper::write_block(writer, ctx, &format!("function {}(): usize", alloc_fn(name)), |w, c| {
        EmitHelper::write_line(w, c, &format!("return malloc({});", def.size.max(WORD_SIZE)))
    })?;

    for field in &def.fields {
        let Some(repr) = field_repr(field, contract) else {
            let message = unsupported_field(def, field);
            EmitHelper::write_error(writer, ctx, &message)?;
            ctx.report(message);
            continue;
        };
        let at = format!("ptr + {}", field.offset);
        let ty = target_type(&field.ty);
        let (get, set) = match repr {
            FieldRepr::Primitive(StoragePrimitive::Word) => (
                format!("return {};", at),
                format!("memory.copy({}, value, 32);", at),
            ),
            FieldRepr::Primitive(StoragePrimitive::PackedBool) => (
                format!("return load<u8>({}) != 0;", at),
                format!("store<u8>({}, value ? 1 : 0);", at),
            ),
            FieldRepr::Primitive(StoragePrimitive::Str) => (
                format!("return load<usize>({});", at),
                format!("store<usize>({}, value);", at),
            ),
            FieldRepr::Nested(inner) => (
                format!("return {};", at),
                format!("memory.copy({}, value, {});", at, inner.size),
            ),
        };
        EmitHelper::write_block(
            writer,
            ctx,
            &format!("function {}(ptr: usize): {}", memory_getter(name, &field.name), ty),
            |w, c| EmitHelper::write_line(w, c, &get),
        )?;
        EmitHelper::write_block(
            writer,
            ctx,
            &format!(
                "function {}(ptr: usize, value: {}): void",
                memory_setter(name, &field.name),
                ty
            ),
            |w, c| EmitHelper::write_line(w, c, &set),
        )?;
    }

    let supported: Vec<(&IRStructField, FieldRepr)> = def
        .fields
        .iter()
        .filter_map(|field| field_repr(field, contract).map(|repr| (field, repr)))
        .collect();

    EmitHelper::write_block(
        writer,
        ctx,
        &format!("function {}(base: u64): usize", load_fn(name)),
        |w, c| {
            EmitHelper::write_line(w, c, &format!("const ptr = {}();", alloc_fn(name)))?;
            for (index, (field, repr)) in supported.iter().enumerate() {
                let key = slot_at("base", field.word_index());
                let at = format!("ptr + {}", field.offset);
                let lines = match repr {
                    FieldRepr::Primitive(StoragePrimitive::Word) => {
                        vec![format!("storage_load_bytes32({}, {});", key, at)]
                    }
                    FieldRepr::Primitive(StoragePrimitive::PackedBool) => vec![
                        format!("const f{} = malloc(32);", index),
                        format!("storage_load_bytes32({}, f{});", key, index),
                        format!("store<u8>({}, load<u8>(f{} + 31));", at, index),
                    ],
                    FieldRepr::Primitive(StoragePrimitive::Str) => {
                        vec![format!("store<usize>({}, Str.load({}));", at, key)]
                    }
                    FieldRepr::Nested(inner) => vec![format!(
                        "memory.copy({}, {}(base + {}), {});",
                        at,
                        load_fn(&inner.name),
                        field.word_index(),
                        inner.size
                    )],
                };
                EmitHelper::write_lines(w, c, &lines)?;
            }
            EmitHelper::write_line(w, c, "return ptr;")
        },
    )?;

    EmitHelper::write_block(
        writer,
        ctx,
        &format!("function {}(base: u64, ptr: usize): void", store_fn(name)),
        |w, c| {
            for (index, (field, repr)) in supported.iter().enumerate() {
                let key = slot_at("base", field.word_index());
                let at = format!("ptr + {}", field.offset);
                let lines = match repr {
                    FieldRepr::Primitive(StoragePrimitive::Word) => {
                        vec![format!("storage_cache_bytes32({}, {});", key, at)]
                    }
                    FieldRepr::Primitive(StoragePrimitive::PackedBool) => vec![
                        format!("const f{} = malloc(32);", index),
                        format!("store<u8>(f{} + 31, load<u8>({}));", index, at),
                        format!("storage_cache_bytes32({}, f{});", key, index),
                    ],
                    FieldRepr::Primitive(StoragePrimitive::Str) => {
                        vec![format!("Str.store({}, load<usize>({}));", key, at)]
                    }
                    FieldRepr::Nested(inner) => vec![format!(
                        "{}(base + {}, {});",
                        store_fn(&inner.name),
                        field.word_index(),
                        at
                    )],
                };
                EmitHelper::write_lines(w, c, &lines)?;
            }
            EmitHelper::write_line(w, c, FLUSH)
        },
    )
}

/// Field accessors bound to one storage variable of struct type.
pub fn write_storage_accessors<W: Write>(
    def: &IRStruct,
    prefix: &str,
    entry: &StorageEntry,
    contract: &IRContract,
    writer: &mut W,
    ctx: &mut EmitContext,
) -> WriteResult {
    let var = &entry.variable;
    let base = &entry.constant;

    EmitHelper::write_block(writer, ctx, &format!("function load_{}(): usize", var.name), |w, c| {
        EmitHelper::write_line(w, c, &format!("return {}({});", load_fn(&def.name), base))
    })?;
    EmitHelper::write_block(
        writer,
        ctx,
        &format!("function store_{}(value: usize): void", var.name),
        |w, c| EmitHelper::write_line(w, c, &format!("{}({}, value);", store_fn(&def.name), base)),
    )?;

    for field in &def.fields {
        let Some(repr) = field_repr(field, contract) else {
            // already reported with the struct's own functions
            continue;
        };
        let ty = target_type(&field.ty);
        let getter = format!("function {}(): {}", storage_getter(prefix, &field.name), ty);
        let setter = format!(
            "function {}(value: {}): void",
            storage_setter(prefix, &field.name),
            ty
        );
        match repr {
            FieldRepr::Primitive(primitive) => {
                let key = slot_at(base, field.word_index());
                EmitHelper::write_block(writer, ctx, &getter, |w, c| {
                    EmitHelper::write_lines(w, c, &primitive.load_into(&key, "value"))?;
                    EmitHelper::write_line(w, c, "return value;")
                })?;
                EmitHelper::write_block(writer, ctx, &setter, |w, c| {
                    EmitHelper::write_lines(w, c, &primitive.store(&key, "value", "word"))
                })?;
            }
            FieldRepr::Nested(inner) => {
                let nested_base = format!("{} + {}", base, field.word_index());
                EmitHelper::write_block(writer, ctx, &getter, |w, c| {
                    EmitHelper::write_line(
                        w,
                        c,
                        &format!("return {}({});", load_fn(&inner.name), nested_base),
                    )
                })?;
                EmitHelper::write_block(writer, ctx, &setter, |w, c| {
                    EmitHelper::write_line(
                        w,
                        c,
                        &format!("{}({}, value);", store_fn(&inner.name), nested_base),
                    )
                })?;
            }
        }
    }
    Ok(())
}

/// True when `ty` is a struct whose layout the contract knows.
pub fn is_known_struct(ty: &Type, contract: &IRContract) -> bool {
    ty.struct_name()
        .is_some_and(|name| contract.struct_def(name).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageLayout;
    use sluice_core::{IRVariable, VariableKind};

    fn info() -> IRStruct {
        IRStruct {
            name: "Info".into(),
            fields: vec![
                IRStructField {
                    name: "a".into(),
                    ty: Type::Uint256,
                    offset: 0,
                },
                IRStructField {
                    name: "b".into(),
                    ty: Type::Bool,
                    offset: 32,
                },
            ],
            size: 64,
        }
    }

    fn contract() -> IRContract {
        let mut contract = IRContract::new("Vault");
        contract.structs.push(info());
        contract.storage.push(IRVariable {
            name: "info".into(),
            ty: Type::Struct("Info".into()),
            kind: VariableKind::Struct,
            slot: 1,
            slot_count: 2,
            length: None,
            original_struct_name: Some("Info".into()),
        });
        contract
    }

    #[test]
    fn test_storage_accessors_address_base_slot() {
        let contract = contract();
        let layout = StorageLayout::new(&contract);
        let entry = layout.entry("info").unwrap();
        let mut buffer = Vec::new();
        let mut ctx = EmitContext::new();

        write_storage_accessors(&info(), "Info", entry, &contract, &mut buffer, &mut ctx).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert!(output.contains("function Info_get_a(): usize {"));
        assert!(output.contains("storage_load_bytes32(slot_at(__SLOT01, 0), value);"));
        assert!(output.contains("function Info_get_b(): bool {"));
        assert!(output.contains("storage_load_bytes32(slot_at(__SLOT01, 1), value_word);"));
        assert!(output.contains("function Info_set_b(value: bool): void {"));
        assert!(output.contains("return Info_load(__SLOT01);"));
    }

    #[test]
    fn test_memory_functions() {
        let contract = contract();
        let mut buffer = Vec::new();
        let mut ctx = EmitContext::new();

        write_struct_functions(&info(), &contract, &mut buffer, &mut ctx).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert!(output.contains("function Info_alloc(): usize {\n  return malloc(64);\n}"));
        assert!(output.contains("function Info_memory_get_b(ptr: usize): bool {\n  return load<u8>(ptr + 32) != 0;\n}"));
        assert!(output.contains("function Info_memory_set_a(ptr: usize, value: usize): void {\n  memory.copy(ptr + 0, value, 32);\n}"));
        assert!(output.contains("function Info_store(base: u64, ptr: usize): void {"));
        assert!(ctx.diagnostics().is_empty());
    }

    #[test]
    fn test_mapping_field_is_reported() {
        let mut def = info();
        def.fields.push(IRStructField {
            name: "allowances".into(),
            ty: Type::Mapping {
                key: Box::new(Type::Address),
                value: Box::new(Type::Uint256),
            },
            offset: 64,
        });
        let mut buffer = Vec::new();
        let mut ctx = EmitContext::new();

        write_struct_functions(&def, &contract(), &mut buffer, &mut ctx).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert!(output.contains("// ERROR: field `Info.allowances`"));
        assert_eq!(ctx.diagnostics().len(), 1);
    }
}

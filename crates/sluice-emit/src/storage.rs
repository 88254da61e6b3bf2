/*! Storage layout lookup and persistent-field accessors.
 *
 * Every storage field gets a `__SLOTxx` constant naming its base slot. Scalars get a
 * `load_<field>` / `store_<field>` pair, arrays get indexed accessors, struct fields
 * delegate to the per-struct functions in [`crate::structs`]. Mappings have no accessors:
 * call sites hash their keys into a slot and use the primitives here directly.
 */

use crate::emitter::{EmitContext, EmitHelper, WriteResult};
use crate::structs;
use indexmap::IndexMap;
use sluice_core::{IRContract, IRVariable, Type, VariableKind};
use std::io::Write;
use tracing::debug;

pub const FLUSH: &str = "storage_flush_cache(0);";

/// Name of the constant holding a slot number: `__SLOT00`, `__SLOT1F`, `__SLOT100`.
pub fn slot_constant(slot: u64) -> String {
    format!("__SLOT{:02X}", slot)
}

pub fn slot_key(constant: &str) -> String {
    format!("slot_key({})", constant)
}

pub fn slot_at(base: &str, word: u64) -> String {
    format!("slot_at({}, {})", base, word)
}

/// Type written in generated signatures. Word-sized values and strings travel as pointers.
pub fn target_type(ty: &Type) -> &'static str {
    match ty {
        Type::Bool => "bool",
        Type::Void => "void",
        _ => "usize",
    }
}

/// How one value of a semantic type is kept in a storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoragePrimitive {
    /// 32-byte big-endian word: integers and addresses.
    Word,
    /// Length-prefixed string starting at the slot.
    Str,
    /// Single byte at the low end of the word.
    PackedBool,
}

impl StoragePrimitive {
    pub fn for_type(ty: &Type) -> Option<StoragePrimitive> {
        match ty {
            Type::Uint256 | Type::Int256 | Type::Address => Some(StoragePrimitive::Word),
            Type::String => Some(StoragePrimitive::Str),
            Type::Bool => Some(StoragePrimitive::PackedBool),
            _ => None,
        }
    }

    /// Lines binding the value stored under `key` to a new constant `dest`.
    pub fn load_into(self, key: &str, dest: &str) -> Vec<String> {
        match self {
            StoragePrimitive::Word => vec![
                format!("const {} = malloc(32);", dest),
                format!("storage_load_bytes32({}, {});", key, dest),
            ],
            StoragePrimitive::Str => vec![format!("const {} = Str.load({});", dest, key)],
            StoragePrimitive::PackedBool => vec![
                format!("const {}_word = malloc(32);", dest),
                format!("storage_load_bytes32({}, {}_word);", key, dest),
                format!("const {} = load<u8>({}_word + 31) != 0;", dest, dest),
            ],
        }
    }

    /// Lines writing `value` under `key`. The last line always flushes the cache.
    pub fn store(self, key: &str, value: &str, scratch: &str) -> Vec<String> {
        let mut lines = match self {
            StoragePrimitive::Word => {
                vec![format!("storage_cache_bytes32({}, {});", key, value)]
            }
            StoragePrimitive::Str => vec![format!("Str.store({}, {});", key, value)],
            StoragePrimitive::PackedBool => vec![
                format!("const {} = malloc(32);", scratch),
                format!("store<u8>({} + 31, {} ? 1 : 0);", scratch, value),
                format!("storage_cache_bytes32({}, {});", key, scratch),
            ],
        };
        lines.push(FLUSH.to_string());
        lines
    }
}

#[derive(Debug, Clone)]
pub struct StorageEntry {
    pub variable: IRVariable,
    pub constant: String,
    /// Prefix of the struct field accessors bound to this variable.
    pub accessor_prefix: Option<String>,
}

/// Storage fields of one contract keyed by name, in slot order.
#[derive(Debug, Clone, Default)]
pub struct StorageLayout {
    entries: IndexMap<String, StorageEntry>,
}

impl StorageLayout {
    pub fn new(contract: &IRContract) -> Self {
        let mut uses: IndexMap<&str, usize> = IndexMap::new();
        for var in &contract.storage {
            if let Some(name) = var.ty.struct_name() {
                *uses.entry(name).or_default() += 1;
            }
        }

        let mut storage: Vec<&IRVariable> = contract.storage.iter().collect();
        storage.sort_by_key(|var| var.slot);

        let entries = storage
            .into_iter()
            .map(|var| {
                let accessor_prefix = var.ty.struct_name().map(|name| {
                    let shared = uses.get(name).copied().unwrap_or(0) > 1;
                    structs::accessor_prefix(name, &var.name, shared)
                });
                let entry = StorageEntry {
                    variable: var.clone(),
                    constant: slot_constant(var.slot),
                    accessor_prefix,
                };
                (var.name.clone(), entry)
            })
            .collect();
        Self { entries }
    }

    pub fn entry(&self, name: &str) -> Option<&StorageEntry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &StorageEntry> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn write_slot_constants<W: Write>(
    layout: &StorageLayout,
    writer: &mut W,
    ctx: &EmitContext,
) -> WriteResult {
    for entry in layout.entries() {
        let var = &entry.variable;
        let mut line = format!("const {}: u64 = {};", entry.constant, var.slot);
        if ctx.emit_comments {
            line.push_str(&format!(" // {}: {}", var.name, var.ty));
        }
        EmitHelper::write_line(writer, ctx, &line)?;
    }
    Ok(())
}

/// Writes the accessor functions of every storage field.
pub fn write_accessors<W: Write>(
    layout: &StorageLayout,
    contract: &IRContract,
    writer: &mut W,
    ctx: &mut EmitContext,
) -> WriteResult {
    for entry in layout.entries() {
        let var = &entry.variable;
        debug!(field = %var.name, slot = var.slot, kind = ?var.kind, "emitting storage accessors");
        match var.kind {
            VariableKind::Simple => write_scalar_accessors(entry, writer, ctx)?,
            VariableKind::Struct => {
                let def = var.ty.struct_name().and_then(|name| contract.struct_def(name));
                match (def, entry.accessor_prefix.as_deref()) {
                    (Some(def), Some(prefix)) => {
                        structs::write_storage_accessors(def, prefix, entry, contract, writer, ctx)?
                    }
                    _ => {
                        let message = format!("struct layout of `{}` is unknown", var.name);
                        EmitHelper::write_error(writer, ctx, &message)?;
                        ctx.report(message);
                    }
                }
            }
            VariableKind::ArrayStatic | VariableKind::ArrayDynamic => {
                write_array_accessors(entry, writer, ctx)?
            }
            VariableKind::Mapping | VariableKind::MappingNested => {
                EmitHelper::write_comment(
                    writer,
                    ctx,
                    &format!("{} is addressed through mapping_slot({}, ..)", var.name, entry.constant),
                )?;
            }
        }
    }
    Ok(())
}

fn write_scalar_accessors<W: Write>(
    entry: &StorageEntry,
    writer: &mut W,
    ctx: &mut EmitContext,
) -> WriteResult {
    let var = &entry.variable;
    let Some(primitive) = StoragePrimitive::for_type(&var.ty) else {
        let message = format!("no storage primitive for `{}` of type {}", var.name, var.ty);
        EmitHelper::write_error(writer, ctx, &message)?;
        ctx.report(message);
        return Ok(());
    };
    let key = slot_key(&entry.constant);
    let ty = target_type(&var.ty);

    EmitHelper::write_block(writer, ctx, &format!("function load_{}(): {}", var.name, ty), |w, c| {
        EmitHelper::write_lines(w, c, &primitive.load_into(&key, "value"))?;
        EmitHelper::write_line(w, c, "return value;")
    })?;
    EmitHelper::write_block(
        writer,
        ctx,
        &format!("function store_{}(value: {}): void", var.name, ty),
        |w, c| EmitHelper::write_lines(w, c, &primitive.store(&key, "value", "word")),
    )
}

fn write_array_accessors<W: Write>(
    entry: &StorageEntry,
    writer: &mut W,
    ctx: &mut EmitContext,
) -> WriteResult {
    let var = &entry.variable;
    let Some((element, primitive)) = var
        .ty
        .array_element()
        .and_then(|element| StoragePrimitive::for_type(element).map(|p| (element, p)))
    else {
        let message = format!("array `{}` of type {} has no storage accessors", var.name, var.ty);
        EmitHelper::write_error(writer, ctx, &message)?;
        ctx.report(message);
        return Ok(());
    };
    let name = &var.name;
    let constant = &entry.constant;
    let ty = target_type(element);
    let element_key = match var.length {
        Some(_) => format!("slot_at({}, index)", constant),
        None => format!("array_slot({}, index)", constant),
    };

    EmitHelper::write_block(writer, ctx, &format!("function length_{}(): usize", name), |w, c| {
        match var.length {
            Some(n) => EmitHelper::write_line(w, c, &format!("return U256.fromU64({});", n)),
            None => {
                EmitHelper::write_lines(w, c, &StoragePrimitive::Word.load_into(&slot_key(constant), "len"))?;
                EmitHelper::write_line(w, c, "return len;")
            }
        }
    })?;
    EmitHelper::write_block(
        writer,
        ctx,
        &format!("function load_{}(index: u64): {}", name, ty),
        |w, c| {
            EmitHelper::write_lines(w, c, &primitive.load_into(&element_key, "value"))?;
            EmitHelper::write_line(w, c, "return value;")
        },
    )?;
    EmitHelper::write_block(
        writer,
        ctx,
        &format!("function store_{}(index: u64, value: {}): void", name, ty),
        |w, c| EmitHelper::write_lines(w, c, &primitive.store(&element_key, "value", "word")),
    )?;

    if var.length.is_some() {
        return Ok(());
    }
    EmitHelper::write_block(
        writer,
        ctx,
        &format!("function push_{}(value: {}): void", name, ty),
        |w, c| {
            EmitHelper::write_line(w, c, &format!("const len = length_{}();", name))?;
            EmitHelper::write_line(w, c, &format!("store_{}(U256.toU64(len), value);", name))?;
            EmitHelper::write_lines(
                w,
                c,
                &StoragePrimitive::Word.store(&slot_key(constant), "U256.add(len, U256.fromU64(1))", ""),
            )
        },
    )?;
    EmitHelper::write_block(writer, ctx, &format!("function pop_{}(): {}", name, ty), |w, c| {
        EmitHelper::write_line(w, c, &format!("const len = U256.sub(length_{}(), U256.fromU64(1));", name))?;
        EmitHelper::write_line(w, c, &format!("const value = load_{}(U256.toU64(len));", name))?;
        EmitHelper::write_lines(w, c, &StoragePrimitive::Word.store(&slot_key(constant), "len", ""))?;
        EmitHelper::write_line(w, c, "return value;")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn variable(name: &str, ty: Type, slot: u64) -> IRVariable {
        IRVariable {
            name: name.into(),
            kind: VariableKind::of(&ty),
            slot,
            slot_count: 1,
            length: None,
            original_struct_name: ty.struct_name().map(str::to_string),
            ty,
        }
    }

    fn render(contract: &IRContract) -> String {
        let layout = StorageLayout::new(contract);
        let mut buffer = Vec::new();
        let mut ctx = EmitContext::new();
        write_accessors(&layout, contract, &mut buffer, &mut ctx).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_slot_constant_names() {
        assert_eq!(slot_constant(0), "__SLOT00");
        assert_eq!(slot_constant(31), "__SLOT1F");
        assert_eq!(slot_constant(256), "__SLOT100");
    }

    #[test]
    fn test_every_store_ends_with_flush() {
        for primitive in [
            StoragePrimitive::Word,
            StoragePrimitive::Str,
            StoragePrimitive::PackedBool,
        ] {
            let lines = primitive.store("slot_key(__SLOT00)", "v", "w");
            assert_eq!(lines.last().map(String::as_str), Some(FLUSH));
        }
    }

    #[test]
    fn test_scalar_accessors() {
        let mut contract = IRContract::new("Vault");
        contract.storage.push(variable("balance", Type::Uint256, 0));
        contract.storage.push(variable("open", Type::Bool, 1));

        let output = render(&contract);
        let expected = "\
function load_balance(): usize {
  const value = malloc(32);
  storage_load_bytes32(slot_key(__SLOT00), value);
  return value;
}
function store_balance(value: usize): void {
  storage_cache_bytes32(slot_key(__SLOT00), value);
  storage_flush_cache(0);
}
function load_open(): bool {
  const value_word = malloc(32);
  storage_load_bytes32(slot_key(__SLOT01), value_word);
  const value = load<u8>(value_word + 31) != 0;
  return value;
}
function store_open(value: bool): void {
  const word = malloc(32);
  store<u8>(word + 31, value ? 1 : 0);
  storage_cache_bytes32(slot_key(__SLOT01), word);
  storage_flush_cache(0);
}
";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_dynamic_array_accessors() {
        let mut contract = IRContract::new("List");
        contract.storage.push(variable(
            "items",
            Type::Array {
                element: Box::new(Type::Address),
                length: None,
            },
            3,
        ));

        let output = render(&contract);
        assert!(output.contains("function load_items(index: u64): usize {"));
        assert!(output.contains("storage_load_bytes32(array_slot(__SLOT03, index), value);"));
        assert!(output.contains("function push_items(value: usize): void {"));
        assert!(output.contains("function pop_items(): usize {"));
    }

    #[test]
    fn test_layout_is_in_slot_order_and_names_shared_struct_accessors() {
        let mut contract = IRContract::new("Pair");
        contract.storage.push(variable("right", Type::Struct("Side".into()), 2));
        contract.storage.push(variable("left", Type::Struct("Side".into()), 0));
        contract.storage.push(variable("meta", Type::Struct("Meta".into()), 4));

        let layout = StorageLayout::new(&contract);
        let names: Vec<&str> = layout.entries().map(|e| e.variable.name.as_str()).collect();
        assert_eq!(names, vec!["left", "right", "meta"]);
        assert_eq!(
            layout.entry("left").unwrap().accessor_prefix.as_deref(),
            Some("Side_left")
        );
        assert_eq!(
            layout.entry("meta").unwrap().accessor_prefix.as_deref(),
            Some("Meta")
        );
    }
}

/*! Error payload constructors and event emitters.
 *
 * Each declared error gets a `__revert_<Name>` function that writes the 4-byte selector and
 * the ABI-encoded fields before reverting. Each event gets a `__emit_<Name>` function whose
 * log starts with the signature hash as topic 0, followed by the indexed fields as extra
 * topics and the remaining fields ABI-encoded as data. Strings are encoded as a head offset
 * plus a length-prefixed tail; an indexed string becomes the keccak hash of its bytes.
 */

use crate::emitter::{EmitContext, EmitHelper, WriteResult};
use crate::error::{EmitError, EmitOutcome};
use crate::selector::{canonical_signature, event_topic, hex, selector, selector_writer};
use crate::storage::target_type;
use sluice_core::{IRContract, IRError, IREvent, Type};
use std::io::Write;
use tracing::debug;

/// Topics a log can carry besides the signature hash.
pub const MAX_INDEXED: usize = 3;

pub fn revert_fn(error: &str) -> String {
    format!("__revert_{}", error)
}

pub fn emit_fn(event: &str) -> String {
    format!("__emit_{}", event)
}

fn topic_const(event: &str) -> String {
    format!("__TOPIC_{}", event)
}

fn check_field(owner: &str, field: &str, ty: &Type) -> EmitOutcome<()> {
    match ty {
        Type::Uint256 | Type::Int256 | Type::Address | Type::Bool | Type::String => Ok(()),
        other => Err(EmitError::Unsupported(format!(
            "field `{}.{}` of type {} in an ABI payload",
            owner, field, other
        ))),
    }
}

fn len_var(name: &str) -> String {
    format!("__len_{}", name)
}

/// Byte length of a string tail: the length word plus the data rounded up to whole words.
fn tail_size(name: &str) -> String {
    format!("32 + (({} + 31) & ~31)", len_var(name))
}

/// Lines placing field `name` as a 32-byte word at `buffer + offset`.
fn word_lines(buffer: &str, offset: usize, name: &str, ty: &Type) -> Vec<String> {
    match ty {
        Type::Bool => vec![format!(
            "store<u8>({} + {}, {} ? 1 : 0);",
            buffer,
            offset + 31,
            name
        )],
        _ => vec![format!("memory.copy({} + {}, {}, 32);", buffer, offset, name)],
    }
}

/// A big-endian integer in the low 8 bytes of the word at `at`. The rest stays zero.
fn store_be(at: &str, value: &str) -> String {
    format!("store<u64>({} + 24, bswap<u64>(<u64>{}));", at, value)
}

fn string_fields<'a>(fields: &[(&'a str, &Type)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, ty)| *ty == &Type::String)
        .map(|(name, _)| *name)
        .collect()
}

/// Lines computing the length of every string field, then the total buffer size.
///
/// Returns the lines and the expression to use for the size: the constant `fixed` when no
/// field is dynamic, `__size` otherwise.
fn size_lines(fixed: usize, strings: &[&str], encoded: &[&str]) -> (Vec<String>, String) {
    if strings.is_empty() {
        return (Vec::new(), fixed.to_string());
    }
    let mut lines: Vec<String> = strings
        .iter()
        .map(|name| format!("const {} = <usize>Str.length({});", len_var(name), name))
        .collect();
    if encoded.is_empty() {
        return (lines, fixed.to_string());
    }
    let tails = encoded
        .iter()
        .map(|name| tail_size(name))
        .collect::<Vec<_>>()
        .join(" + ");
    lines.push(format!("const __size = {} + {};", fixed, tails));
    (lines, "__size".to_string())
}

/// Head/tail encoding of `fields` starting at `buffer + base`.
///
/// Word-sized fields sit inline in the head. A string puts the offset of its tail (relative to
/// `base`) in the head; the tail holds the length word followed by the zero-padded bytes.
fn encode_lines(buffer: &str, base: usize, fields: &[(&str, &Type)]) -> Vec<String> {
    let mut lines = Vec::new();
    let dynamic: Vec<usize> = fields
        .iter()
        .enumerate()
        .filter(|(_, (_, ty))| *ty == &Type::String)
        .map(|(index, _)| index)
        .collect();
    if let Some(last) = dynamic.last().copied() {
        lines.push(format!("let __tail: usize = {};", 32 * fields.len()));
        for (index, (name, ty)) in fields.iter().enumerate() {
            let head = base + 32 * index;
            if *ty != &Type::String {
                lines.extend(word_lines(buffer, head, name, ty));
                continue;
            }
            let tail = format!("{} + {} + __tail", buffer, base);
            lines.push(store_be(&format!("{} + {}", buffer, head), "__tail"));
            lines.push(store_be(&tail, &len_var(name)));
            lines.push(format!(
                "memory.copy({} + 32, Str.data({}), {});",
                tail,
                name,
                len_var(name)
            ));
            if index != last {
                lines.push(format!("__tail += {};", tail_size(name)));
            }
        }
    } else {
        for (index, (name, ty)) in fields.iter().enumerate() {
            lines.extend(word_lines(buffer, base + 32 * index, name, ty));
        }
    }
    lines
}

pub fn check_error(error: &IRError) -> EmitOutcome<()> {
    error
        .fields
        .iter()
        .try_for_each(|field| check_field(&error.name, &field.name, &field.ty))
}

pub fn check_event(event: &IREvent) -> EmitOutcome<()> {
    event
        .fields
        .iter()
        .try_for_each(|field| check_field(&event.name, &field.name, &field.ty))?;
    let indexed = event.fields.iter().filter(|field| field.indexed).count();
    if indexed > MAX_INDEXED {
        return Err(EmitError::Unsupported(format!(
            "event `{}` with {} indexed fields",
            event.name, indexed
        )));
    }
    Ok(())
}

fn params<'a>(fields: impl Iterator<Item = (&'a str, &'a Type)>) -> String {
    fields
        .map(|(name, ty)| format!("{}: {}", name, target_type(ty)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn write_error_helpers<W: Write>(
    contract: &IRContract,
    writer: &mut W,
    ctx: &mut EmitContext,
) -> WriteResult {
    for error in &contract.errors {
        let signature = check_error(error).and_then(|_| {
            canonical_signature(
                &error.name,
                error.fields.iter().map(|field| &field.ty),
                &contract.symbol_table,
            )
        });
        let signature = match signature {
            Ok(signature) => signature,
            Err(err) => {
                let message = format!("error `{}`: {}", error.name, err);
                EmitHelper::write_error(writer, ctx, &message)?;
                ctx.report(message);
                continue;
            }
        };
        let selector = selector(&signature);
        let fields: Vec<(&str, &Type)> = error
            .fields
            .iter()
            .map(|field| (field.name.as_str(), &field.ty))
            .collect();
        let strings = string_fields(&fields);
        let (sizing, length) = size_lines(4 + 32 * fields.len(), &strings, &strings);
        debug!(error = %error.name, %signature, "emitting revert helper");

        EmitHelper::write_comment(writer, ctx, &format!("{} => 0x{}", signature, hex(&selector)))?;
        let header = format!(
            "function {}({}): void",
            revert_fn(&error.name),
            params(fields.iter().copied())
        );
        EmitHelper::write_block(writer, ctx, &header, |w, c| {
            EmitHelper::write_lines(w, c, &sizing)?;
            EmitHelper::write_line(w, c, &format!("const payload = malloc({});", length))?;
            EmitHelper::write_lines(w, c, &selector_writer("payload", selector))?;
            EmitHelper::write_lines(w, c, &encode_lines("payload", 4, &fields))?;
            EmitHelper::write_line(w, c, &format!("revert(payload, {});", length))
        })?;
    }
    Ok(())
}

pub fn write_event_helpers<W: Write>(
    contract: &IRContract,
    writer: &mut W,
    ctx: &mut EmitContext,
) -> WriteResult {
    for event in &contract.events {
        let signature = check_event(event).and_then(|_| {
            canonical_signature(
                &event.name,
                event.fields.iter().map(|field| &field.ty),
                &contract.symbol_table,
            )
        });
        let signature = match signature {
            Ok(signature) => signature,
            Err(err) => {
                let message = format!("event `{}`: {}", event.name, err);
                EmitHelper::write_error(writer, ctx, &message)?;
                ctx.report(message);
                continue;
            }
        };
        let topic = event_topic(&signature);
        let indexed: Vec<(&str, &Type)> = event
            .fields
            .iter()
            .filter(|field| field.indexed)
            .map(|field| (field.name.as_str(), &field.ty))
            .collect();
        let data: Vec<(&str, &Type)> = event
            .fields
            .iter()
            .filter(|field| !field.indexed)
            .map(|field| (field.name.as_str(), &field.ty))
            .collect();
        let encoded = string_fields(&data);
        let mut all_strings = string_fields(&indexed);
        all_strings.extend(encoded.iter().copied());
        let topics = 1 + indexed.len();
        let data_base = 32 * topics;
        let (sizing, length) = size_lines(data_base + 32 * data.len(), &all_strings, &encoded);
        debug!(event = %event.name, %signature, topics, "emitting event helper");

        let bytes = topic
            .iter()
            .map(|byte| format!("0x{:02x}", byte))
            .collect::<Vec<_>>()
            .join(", ");
        EmitHelper::write_comment(writer, ctx, &signature)?;
        EmitHelper::write_line(
            writer,
            ctx,
            &format!("const {}: StaticArray<u8> = [{}];", topic_const(&event.name), bytes),
        )?;

        let header = format!(
            "function {}({}): void",
            emit_fn(&event.name),
            params(event.fields.iter().map(|field| (field.name.as_str(), &field.ty)))
        );
        EmitHelper::write_block(writer, ctx, &header, |w, c| {
            EmitHelper::write_lines(w, c, &sizing)?;
            EmitHelper::write_line(w, c, &format!("const log = malloc({});", length))?;
            EmitHelper::write_line(
                w,
                c,
                &format!("memory.copy(log, changetype<usize>({}), 32);", topic_const(&event.name)),
            )?;
            for (index, (name, ty)) in indexed.iter().enumerate() {
                let offset = 32 * (index + 1);
                let lines = match ty {
                    // indexed strings are logged as the hash of their bytes
                    Type::String => vec![format!(
                        "native_keccak256(Str.data({}), {}, log + {});",
                        name,
                        len_var(name),
                        offset
                    )],
                    _ => word_lines("log", offset, name, ty),
                };
                EmitHelper::write_lines(w, c, &lines)?;
            }
            EmitHelper::write_lines(w, c, &encode_lines("log", data_base, &data))?;
            EmitHelper::write_line(w, c, &format!("emit_log(log, {}, {});", length, topics))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sluice_core::{IRErrorField, IREventField};

    fn render(contract: &IRContract) -> (String, EmitContext) {
        let mut buffer = Vec::new();
        let mut ctx = EmitContext::new();
        write_error_helpers(contract, &mut buffer, &mut ctx).unwrap();
        write_event_helpers(contract, &mut buffer, &mut ctx).unwrap();
        (String::from_utf8(buffer).unwrap(), ctx)
    }

    #[test]
    fn test_error_payload_is_selector_then_words() {
        let mut contract = IRContract::new("Bank");
        contract.errors.push(IRError {
            name: "InsufficientBalance".into(),
            fields: vec![
                IRErrorField {
                    name: "needed".into(),
                    ty: Type::Uint256,
                },
                IRErrorField {
                    name: "strict".into(),
                    ty: Type::Bool,
                },
            ],
        });

        let (output, _) = render(&contract);
        let sig = selector("InsufficientBalance(uint256,bool)");
        let mut expected = vec![
            format!("// InsufficientBalance(uint256,bool) => 0x{}", hex(&sig)),
            "function __revert_InsufficientBalance(needed: usize, strict: bool): void {".to_string(),
            "  const payload = malloc(68);".to_string(),
        ];
        expected.extend(selector_writer("payload", sig).into_iter().map(|l| format!("  {}", l)));
        expected.push("  memory.copy(payload + 4, needed, 32);".to_string());
        expected.push("  store<u8>(payload + 67, strict ? 1 : 0);".to_string());
        expected.push("  revert(payload, 68);".to_string());
        expected.push("}".to_string());
        assert_eq!(output.lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_event_indexed_fields_become_topics() {
        let mut contract = IRContract::new("Token");
        contract.events.push(IREvent {
            name: "Transfer".into(),
            fields: vec![
                IREventField {
                    name: "amount".into(),
                    ty: Type::Uint256,
                    indexed: false,
                },
                IREventField {
                    name: "to".into(),
                    ty: Type::Address,
                    indexed: true,
                },
            ],
        });

        let (output, ctx) = render(&contract);
        assert!(ctx.diagnostics().is_empty());
        assert!(output.contains("const __TOPIC_Transfer: StaticArray<u8> = [0x"));
        assert!(output.contains("  memory.copy(log + 32, to, 32);\n  memory.copy(log + 64, amount, 32);"));
        assert!(output.contains("  emit_log(log, 96, 2);"));
    }

    #[test]
    fn test_string_error_fields_use_head_and_tail() {
        let mut contract = IRContract::new("Vault");
        contract.errors.push(IRError {
            name: "Unauthorized".into(),
            fields: vec![
                IRErrorField {
                    name: "who".into(),
                    ty: Type::Address,
                },
                IRErrorField {
                    name: "reason".into(),
                    ty: Type::String,
                },
            ],
        });

        let (output, ctx) = render(&contract);
        assert!(ctx.diagnostics().is_empty());
        let sig = selector("Unauthorized(address,string)");
        let mut expected = vec![
            format!("// Unauthorized(address,string) => 0x{}", hex(&sig)),
            "function __revert_Unauthorized(who: usize, reason: usize): void {".to_string(),
            "  const __len_reason = <usize>Str.length(reason);".to_string(),
            "  const __size = 68 + 32 + ((__len_reason + 31) & ~31);".to_string(),
            "  const payload = malloc(__size);".to_string(),
        ];
        expected.extend(selector_writer("payload", sig).into_iter().map(|l| format!("  {}", l)));
        expected.extend(
            [
                "  let __tail: usize = 64;",
                "  memory.copy(payload + 4, who, 32);",
                "  store<u64>(payload + 36 + 24, bswap<u64>(<u64>__tail));",
                "  store<u64>(payload + 4 + __tail + 24, bswap<u64>(<u64>__len_reason));",
                "  memory.copy(payload + 4 + __tail + 32, Str.data(reason), __len_reason);",
                "  revert(payload, __size);",
                "}",
            ]
            .map(String::from),
        );
        assert_eq!(output.lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_string_event_fields() {
        let mut contract = IRContract::new("Board");
        contract.events.push(IREvent {
            name: "Posted".into(),
            fields: vec![
                IREventField {
                    name: "tag".into(),
                    ty: Type::String,
                    indexed: true,
                },
                IREventField {
                    name: "note".into(),
                    ty: Type::String,
                    indexed: false,
                },
                IREventField {
                    name: "count".into(),
                    ty: Type::Uint256,
                    indexed: false,
                },
            ],
        });

        let (output, ctx) = render(&contract);
        assert!(ctx.diagnostics().is_empty());
        assert!(output.contains("// Posted(string,string,uint256)"));
        let body = [
            "  const __len_tag = <usize>Str.length(tag);",
            "  const __len_note = <usize>Str.length(note);",
            "  const __size = 128 + 32 + ((__len_note + 31) & ~31);",
            "  const log = malloc(__size);",
            "  memory.copy(log, changetype<usize>(__TOPIC_Posted), 32);",
            "  native_keccak256(Str.data(tag), __len_tag, log + 32);",
            "  let __tail: usize = 64;",
            "  store<u64>(log + 64 + 24, bswap<u64>(<u64>__tail));",
            "  store<u64>(log + 64 + __tail + 24, bswap<u64>(<u64>__len_note));",
            "  memory.copy(log + 64 + __tail + 32, Str.data(note), __len_note);",
            "  memory.copy(log + 96, count, 32);",
            "  emit_log(log, __size, 2);",
        ]
        .join("\n");
        assert!(output.contains(&body), "{}", output);
    }

    #[test]
    fn test_struct_fields_degrade_to_diagnostics() {
        let mut contract = IRContract::new("Token");
        contract.errors.push(IRError {
            name: "BadPoint".into(),
            fields: vec![IRErrorField {
                name: "point".into(),
                ty: Type::Struct("Point".into()),
            }],
        });

        let (output, ctx) = render(&contract);
        assert!(output.starts_with("// ERROR: error `BadPoint`"));
        assert_eq!(ctx.diagnostics().len(), 1);
    }
}

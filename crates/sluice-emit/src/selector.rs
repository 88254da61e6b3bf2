use crate::error::{EmitError, EmitOutcome};
use sluice_core::{SymbolTable, Type};
use tiny_keccak::{Hasher, Keccak};

pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];
    keccak.update(bytes);
    keccak.finalize(&mut output);
    output
}

/// `name(t1,t2,...)` with wire-format type names; structs expand to tuples.
pub fn canonical_signature<'a>(
    name: &str,
    params: impl IntoIterator<Item = &'a Type>,
    symbols: &SymbolTable,
) -> EmitOutcome<String> {
    let parts = params
        .into_iter()
        .map(|ty| {
            symbols
                .canonical_type(ty)
                .ok_or_else(|| EmitError::UnresolvedType(ty.to_string()))
        })
        .collect::<EmitOutcome<Vec<_>>>()?;
    Ok(format!("{}({})", name, parts.join(",")))
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn selector_u32(signature: &str) -> u32 {
    u32::from_be_bytes(selector(signature))
}

/// Topic 0 of a non-anonymous event: the full hash of its signature.
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

/// Literal byte stores writing `selector` big-endian at `dest`.
pub fn selector_writer(dest: &str, selector: [u8; 4]) -> Vec<String> {
    selector
        .iter()
        .enumerate()
        .map(|(index, byte)| format!("store<u8>({} + {}, 0x{:02x});", dest, index, byte))
        .collect()
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sluice_core::{IRStruct, IRStructField};

    #[test]
    fn test_well_known_selectors() {
        assert_eq!(selector_u32("transfer(address,uint256)"), 0xa9059cbb);
        assert_eq!(selector_u32("balanceOf(address)"), 0x70a08231);
        assert_eq!(selector_u32("approve(address,uint256)"), 0x095ea7b3);
    }

    #[test]
    fn test_transfer_event_topic() {
        assert_eq!(
            hex(&event_topic("Transfer(address,address,uint256)")),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_canonical_signature_expands_structs() {
        let mut symbols = SymbolTable::new();
        symbols.declare_struct(IRStruct {
            name: "Point".into(),
            fields: vec![
                IRStructField {
                    name: "x".into(),
                    ty: Type::Uint256,
                    offset: 0,
                },
                IRStructField {
                    name: "ok".into(),
                    ty: Type::Bool,
                    offset: 32,
                },
            ],
            size: 64,
        });
        let params = [
            Type::Struct("Point".into()),
            Type::Array {
                element: Box::new(Type::Address),
                length: Some(3),
            },
            Type::String,
        ];

        let signature = canonical_signature("move", &params, &symbols).unwrap();
        assert_eq!(signature, "move((uint256,bool),address[3],string)");
    }

    #[test]
    fn test_mapping_parameter_has_no_signature() {
        let params = [Type::Mapping {
            key: Box::new(Type::Address),
            value: Box::new(Type::Uint256),
        }];
        assert!(matches!(
            canonical_signature("bad", &params, &SymbolTable::new()),
            Err(EmitError::UnresolvedType(_))
        ));
    }

    #[test]
    fn test_selector_writer_is_big_endian() {
        let lines = selector_writer("buf", selector("transfer(address,uint256)"));
        assert_eq!(
            lines,
            vec![
                "store<u8>(buf + 0, 0xa9);",
                "store<u8>(buf + 1, 0x05);",
                "store<u8>(buf + 2, 0x9c);",
                "store<u8>(buf + 3, 0xbb);",
            ]
        );
    }
}

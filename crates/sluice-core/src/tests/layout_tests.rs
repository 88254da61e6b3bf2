use pretty_assertions::assert_eq;
use crate::contract::{IRStruct, IRStructField, IRVariable, VariableKind};
use crate::slot_manager::{SlotManager, SlotRequest};
use crate::types::Type;

fn struct_of_words(name: &str, words: u32) -> IRStruct {
    IRStruct {
        name: name.to_string(),
        fields: (0..words)
            .map(|i| IRStructField {
                name: format!("f{}", i),
                ty: Type::Uint256,
                offset: i * 32,
            })
            .collect(),
        size: words * 32,
    }
}

fn allocate_all(declarations: &[(&str, Type)], templates: &[IRStruct]) -> Vec<IRVariable> {
    let mut slots = SlotManager::new();
    declarations
        .iter()
        .map(|(name, ty)| {
            let (slot, count) = match ty {
                Type::Struct(struct_name) => {
                    let template = templates
                        .iter()
                        .find(|t| &t.name == struct_name)
                        .expect("template");
                    (
                        slots.allocate_struct_slots(name, ty, template).unwrap(),
                        template.slot_count(),
                    )
                }
                _ => {
                    let request = SlotRequest::new(ty);
                    (slots.allocate_slot(name, request).unwrap(), request.slot_count())
                }
            };
            IRVariable {
                name: name.to_string(),
                ty: ty.clone(),
                kind: VariableKind::of(ty),
                slot,
                slot_count: count,
                length: None,
                original_struct_name: ty.struct_name().map(str::to_string),
            }
        })
        .collect()
}

#[test]
fn test_occupied_slots_are_pairwise_disjoint() {
    let templates = vec![struct_of_words("Pair", 2), struct_of_words("Big", 5)];
    let declarations = vec![
        ("a", Type::Uint256),
        ("pair", Type::Struct("Pair".into())),
        ("balances", Type::parse("Mapping<Address, U256>").unwrap()),
        ("fixed", Type::parse("StaticArray<U256, 4>").unwrap()),
        ("big", Type::Struct("Big".into())),
        ("flag", Type::Bool),
    ];

    let vars = allocate_all(&declarations, &templates);

    for (i, left) in vars.iter().enumerate() {
        for right in vars.iter().skip(i + 1) {
            let overlap = left
                .occupied_slots()
                .any(|slot| right.occupied_slots().any(|other| other == slot));
            assert!(!overlap, "{} and {} overlap", left.name, right.name);
        }
    }

    let big = vars.iter().find(|v| v.name == "big").unwrap();
    assert_eq!(big.slot_count, 5);
    let pair = vars.iter().find(|v| v.name == "pair").unwrap();
    assert_eq!(pair.occupied_slots(), 1..3);
}

#[test]
fn test_layout_is_deterministic() {
    let templates = vec![struct_of_words("Pair", 2)];
    let declarations = vec![
        ("x", Type::Uint256),
        ("p", Type::Struct("Pair".into())),
        ("y", Type::Address),
    ];

    let first = allocate_all(&declarations, &templates);
    let second = allocate_all(&declarations, &templates);
    assert_eq!(first, second);
    assert_eq!(
        first.iter().map(|v| v.slot).collect::<Vec<_>>(),
        vec![0, 1, 3]
    );
}

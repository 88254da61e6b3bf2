/*! JSON ABI descriptors for a compiled contract.
 *
 * Entries follow the usual Ethereum shape so existing tooling can call the contract: the
 * constructor first, then public functions in declaration order, then events and errors.
 * Events and errors whose helpers cannot be generated are left out.
 */

use crate::error::{EmitError, EmitOutcome};
use crate::interface::{check_error, check_event};
use serde::{Deserialize, Serialize};
use sluice_core::{IRContract, IRMethod, SymbolTable, Type};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AbiEntry {
    Constructor {
        inputs: Vec<AbiParam>,
        #[serde(rename = "stateMutability")]
        state_mutability: String,
    },
    Function {
        name: String,
        inputs: Vec<AbiParam>,
        outputs: Vec<AbiParam>,
        #[serde(rename = "stateMutability")]
        state_mutability: String,
    },
    Event {
        name: String,
        inputs: Vec<AbiParam>,
        anonymous: bool,
    },
    Error {
        name: String,
        inputs: Vec<AbiParam>,
    },
}

/// Describes `ty` as an ABI parameter. Structs become tuples whose components carry the
/// member names; arrays of structs keep the `tuple[]` suffix.
pub fn abi_param(name: &str, ty: &Type, symbols: &SymbolTable) -> EmitOutcome<AbiParam> {
    let unresolved = || EmitError::UnresolvedType(ty.to_string());
    let (wire, components) = match ty {
        Type::Struct(struct_name) => {
            let def = symbols.struct_def(struct_name).ok_or_else(unresolved)?;
            let components = def
                .fields
                .iter()
                .map(|field| abi_param(&field.name, &field.ty, symbols))
                .collect::<EmitOutcome<Vec<_>>>()?;
            ("tuple".to_string(), components)
        }
        Type::Array { element, length } => {
            let inner = abi_param("", element, symbols)?;
            let suffix = match length {
                Some(n) => format!("[{}]", n),
                None => "[]".to_string(),
            };
            (format!("{}{}", inner.ty, suffix), inner.components)
        }
        other => (other.abi_name().ok_or_else(unresolved)?, Vec::new()),
    };
    Ok(AbiParam {
        name: name.to_string(),
        ty: wire,
        components,
        indexed: None,
    })
}

fn function_entry(method: &IRMethod, symbols: &SymbolTable) -> EmitOutcome<AbiEntry> {
    let inputs = method
        .inputs
        .iter()
        .map(|input| abi_param(&input.name, &input.ty, symbols))
        .collect::<EmitOutcome<Vec<_>>>()?;
    let outputs = match method.output_type {
        Type::Void => Vec::new(),
        ref ty => vec![abi_param("", ty, symbols)?],
    };
    Ok(AbiEntry::Function {
        name: method.name.clone(),
        inputs,
        outputs,
        state_mutability: method.state_mutability.as_str().to_string(),
    })
}

pub fn build_abi(contract: &IRContract) -> EmitOutcome<Vec<AbiEntry>> {
    let symbols = &contract.symbol_table;
    let mut entries = Vec::new();

    if let Some(ctor) = &contract.constructor {
        let inputs = ctor
            .inputs
            .iter()
            .map(|input| abi_param(&input.name, &input.ty, symbols))
            .collect::<EmitOutcome<Vec<_>>>()?;
        entries.push(AbiEntry::Constructor {
            inputs,
            state_mutability: ctor.state_mutability.as_str().to_string(),
        });
    }

    for method in contract.public_methods() {
        entries.push(function_entry(method, symbols)?);
    }

    for event in &contract.events {
        if let Err(err) = check_event(event) {
            warn!(event = %event.name, %err, "event left out of the ABI");
            continue;
        }
        let inputs = event
            .fields
            .iter()
            .map(|field| {
                abi_param(&field.name, &field.ty, symbols).map(|param| AbiParam {
                    indexed: Some(field.indexed),
                    ..param
                })
            })
            .collect::<EmitOutcome<Vec<_>>>()?;
        entries.push(AbiEntry::Event {
            name: event.name.clone(),
            inputs,
            anonymous: false,
        });
    }

    for error in &contract.errors {
        if let Err(err) = check_error(error) {
            warn!(error = %error.name, %err, "error left out of the ABI");
            continue;
        }
        let inputs = error
            .fields
            .iter()
            .map(|field| abi_param(&field.name, &field.ty, symbols))
            .collect::<EmitOutcome<Vec<_>>>()?;
        entries.push(AbiEntry::Error {
            name: error.name.clone(),
            inputs,
        });
    }
    Ok(entries)
}

pub fn abi_json(entries: &[AbiEntry], pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(entries)
    } else {
        serde_json::to_string(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use sluice_core::{
        IRError, IRErrorField, IREvent, IREventField, IRStruct, IRStructField, Parameter,
        StateMutability, Visibility,
    };

    fn method(name: &str, visibility: Visibility, inputs: Vec<Parameter>, output: Type) -> IRMethod {
        IRMethod {
            name: name.into(),
            visibility,
            state_mutability: StateMutability::View,
            inputs,
            output_type: output,
            body: vec![],
        }
    }

    #[test]
    fn test_functions_events_and_internal_methods() {
        let mut contract = IRContract::new("Token");
        contract.methods.push(method(
            "balanceOf",
            Visibility::Public,
            vec![Parameter::new("who", Type::Address)],
            Type::Uint256,
        ));
        contract
            .methods
            .push(method("helper", Visibility::Internal, vec![], Type::Void));
        contract.events.push(IREvent {
            name: "Transfer".into(),
            fields: vec![
                IREventField {
                    name: "from".into(),
                    ty: Type::Address,
                    indexed: true,
                },
                IREventField {
                    name: "amount".into(),
                    ty: Type::Uint256,
                    indexed: false,
                },
            ],
        });

        let abi = build_abi(&contract).unwrap();
        let value = serde_json::to_value(&abi).unwrap();
        assert_eq!(
            value,
            json!([
                {
                    "type": "function",
                    "name": "balanceOf",
                    "inputs": [{"name": "who", "type": "address"}],
                    "outputs": [{"name": "", "type": "uint256"}],
                    "stateMutability": "view"
                },
                {
                    "type": "event",
                    "name": "Transfer",
                    "inputs": [
                        {"name": "from", "type": "address", "indexed": true},
                        {"name": "amount", "type": "uint256", "indexed": false}
                    ],
                    "anonymous": false
                }
            ])
        );
    }

    #[test]
    fn test_struct_arrays_become_tuple_arrays() {
        let mut symbols = SymbolTable::new();
        symbols.declare_struct(IRStruct {
            name: "Entry".into(),
            fields: vec![IRStructField {
                name: "id".into(),
                ty: Type::Uint256,
                offset: 0,
            }],
            size: 32,
        });
        let ty = Type::Array {
            element: Box::new(Type::Struct("Entry".into())),
            length: None,
        };

        let param = abi_param("entries", &ty, &symbols).unwrap();
        assert_eq!(param.ty, "tuple[]");
        assert_eq!(param.components.len(), 1);
        assert_eq!(param.components[0].ty, "uint256");
    }

    #[test]
    fn test_abi_round_trips_through_json() {
        let entries = vec![AbiEntry::Error {
            name: "Denied".into(),
            inputs: vec![],
        }];
        let text = abi_json(&entries, false).unwrap();
        assert_eq!(text, r#"[{"type":"error","name":"Denied","inputs":[]}]"#);
        let parsed: Vec<AbiEntry> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn test_payload_entries_match_generated_helpers() {
        let mut contract = IRContract::new("Board");
        contract.events.push(IREvent {
            name: "Posted".into(),
            fields: vec![IREventField {
                name: "note".into(),
                ty: Type::String,
                indexed: false,
            }],
        });
        contract.errors.push(IRError {
            name: "BadEntries".into(),
            fields: vec![IRErrorField {
                name: "ids".into(),
                ty: Type::Array {
                    element: Box::new(Type::Uint256),
                    length: None,
                },
            }],
        });

        let names: Vec<String> = build_abi(&contract)
            .unwrap()
            .into_iter()
            .map(|entry| match entry {
                AbiEntry::Event { name, inputs, .. } => {
                    assert_eq!(inputs[0].ty, "string");
                    name
                }
                other => panic!("unexpected entry {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["Posted"]);
    }
}

use pretty_assertions::assert_eq;
use crate::contract::{IRContract, IRMethod, StateMutability, Visibility};
use crate::ir::{Callee, IRExpression, IRStatement, Scope};
use crate::types::{Factory, Type};

#[test]
fn test_contract_dump_is_tagged_json() {
    let mut contract = IRContract::new("Counter");
    contract.methods.push(IRMethod {
        name: "get".into(),
        visibility: Visibility::External,
        state_mutability: StateMutability::View,
        inputs: vec![],
        output_type: Type::Uint256,
        body: vec![IRStatement::Return {
            value: Some(IRExpression::storage("count", Type::Uint256)),
        }],
    });

    let json = serde_json::to_value(&contract).unwrap();
    assert_eq!(json["name"], "Counter");
    assert_eq!(json["methods"][0]["state_mutability"], "view");
    assert_eq!(json["methods"][0]["body"][0]["kind"], "return");
    assert_eq!(json["methods"][0]["body"][0]["value"]["kind"], "var");
    assert_eq!(json["methods"][0]["body"][0]["value"]["scope"], "Storage");

    let back: IRContract = serde_json::from_value(json).unwrap();
    assert_eq!(back, contract);
}

#[test]
fn test_factory_call_dump() {
    let call = IRExpression::Call {
        callee: Callee::Factory {
            factory: Factory::U256,
            method: "fromString".into(),
        },
        receiver: None,
        args: vec![IRExpression::string("2")],
        return_type: Type::Uint256,
        scope: Scope::Memory,
    };
    let json = serde_json::to_value(&call).unwrap();
    assert_eq!(json["kind"], "call");
    assert_eq!(json["callee"]["Factory"]["factory"], "U256");
    assert_eq!(json["return_type"], "Uint256");
}

use crate::ir::IRStatement;
use crate::symbols::SymbolTable;
use crate::types::{Type, WORD_SIZE};
use serde::{Deserialize, Serialize};

/// One compiled contract. Built once per compile and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IRContract {
    pub name: String,
    pub parent_names: Vec<String>,
    pub constructor: Option<IRMethod>,
    pub methods: Vec<IRMethod>,
    pub storage: Vec<IRVariable>,
    pub structs: Vec<IRStruct>,
    pub events: Vec<IREvent>,
    pub errors: Vec<IRError>,
    pub symbol_table: SymbolTable,
}

impl IRContract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_names: Vec::new(),
            constructor: None,
            methods: Vec::new(),
            storage: Vec::new(),
            structs: Vec::new(),
            events: Vec::new(),
            errors: Vec::new(),
            symbol_table: SymbolTable::new(),
        }
    }

    pub fn storage_variable(&self, name: &str) -> Option<&IRVariable> {
        self.storage.iter().find(|var| var.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&IRMethod> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn struct_def(&self, name: &str) -> Option<&IRStruct> {
        self.structs.iter().find(|def| def.name == name)
    }

    /// Methods reachable from outside the contract, in declaration order.
    pub fn public_methods(&self) -> impl Iterator<Item = &IRMethod> {
        self.methods
            .iter()
            .filter(|method| method.visibility != Visibility::Internal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Simple,
    ArrayStatic,
    ArrayDynamic,
    Mapping,
    MappingNested,
    Struct,
}

impl VariableKind {
    pub fn of(ty: &Type) -> VariableKind {
        match ty {
            Type::Array {
                length: Some(_), ..
            } => VariableKind::ArrayStatic,
            Type::Array { length: None, .. } => VariableKind::ArrayDynamic,
            Type::Mapping { .. } => VariableKind::Mapping,
            Type::MappingNested { .. } => VariableKind::MappingNested,
            Type::Struct(_) => VariableKind::Struct,
            _ => VariableKind::Simple,
        }
    }
}

/// A persistent storage field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IRVariable {
    pub name: String,
    pub ty: Type,
    pub kind: VariableKind,
    pub slot: u64,
    pub slot_count: u64,
    pub length: Option<u32>,
    pub original_struct_name: Option<String>,
}

impl IRVariable {
    pub fn occupied_slots(&self) -> std::ops::Range<u64> {
        self.slot..self.slot + self.slot_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IRStructField {
    pub name: String,
    pub ty: Type,
    pub offset: u32,
}

impl IRStructField {
    /// Word index of the field relative to the struct's base slot.
    pub fn word_index(&self) -> u64 {
        u64::from(self.offset / WORD_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IRStruct {
    pub name: String,
    pub fields: Vec<IRStructField>,
    pub size: u32,
}

impl IRStruct {
    pub fn field(&self, name: &str) -> Option<&IRStructField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn slot_count(&self) -> u64 {
        u64::from(self.size.div_ceil(WORD_SIZE)).max(1)
    }

    pub fn field_types(&self) -> Vec<Type> {
        self.fields.iter().map(|field| field.ty.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IREventField {
    pub name: String,
    pub ty: Type,
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IREvent {
    pub name: String,
    pub fields: Vec<IREventField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IRErrorField {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IRError {
    pub name: String,
    pub fields: Vec<IRErrorField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    External,
    Public,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMutability {
    Pure,
    View,
    Nonpayable,
    Payable,
}

impl StateMutability {
    pub fn as_str(self) -> &'static str {
        match self {
            StateMutability::Pure => "pure",
            StateMutability::View => "view",
            StateMutability::Nonpayable => "nonpayable",
            StateMutability::Payable => "payable",
        }
    }

    pub fn is_read_only(self) -> bool {
        matches!(self, StateMutability::Pure | StateMutability::View)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IRMethod {
    pub name: String,
    pub visibility: Visibility,
    pub state_mutability: StateMutability,
    pub inputs: Vec<Parameter>,
    pub output_type: Type,
    pub body: Vec<IRStatement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_slot_count() {
        let info = IRStruct {
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
        };
        assert_eq!(info.slot_count(), 2);
        assert_eq!(info.field("b").map(IRStructField::word_index), Some(1));

        let empty = IRStruct {
            name: "Empty".into(),
            fields: vec![],
            size: 0,
        };
        assert_eq!(empty.slot_count(), 1);
    }

    #[test]
    fn test_variable_kind() {
        assert_eq!(VariableKind::of(&Type::Uint256), VariableKind::Simple);
        assert_eq!(
            VariableKind::of(&Type::parse("StaticArray<U256, 2>").unwrap()),
            VariableKind::ArrayStatic
        );
        assert_eq!(
            VariableKind::of(&Type::parse("MappingNested<Address, Address, U256>").unwrap()),
            VariableKind::MappingNested
        );
    }
}

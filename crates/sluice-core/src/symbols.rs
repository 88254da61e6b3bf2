use crate::contract::{IRError, IREvent, IRStruct, StateMutability, Visibility};
use crate::types::Type;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
    pub visibility: Visibility,
    pub mutability: StateMutability,
}

/// Registry of everything declared in a contract, in declaration order.
///
/// Populated during the declaration pass and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    variables: IndexMap<String, Type>,
    structs: IndexMap<String, IRStruct>,
    functions: IndexMap<String, FunctionSignature>,
    events: IndexMap<String, IREvent>,
    errors: IndexMap<String, IRError>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous type when the name was already registered.
    pub fn declare_variable(&mut self, name: impl Into<String>, ty: Type) -> Option<Type> {
        self.variables.insert(name.into(), ty)
    }

    pub fn variable(&self, name: &str) -> Option<&Type> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &Type)> {
        self.variables.iter()
    }

    pub fn declare_struct(&mut self, def: IRStruct) {
        self.structs.insert(def.name.clone(), def);
    }

    pub fn struct_def(&self, name: &str) -> Option<&IRStruct> {
        self.structs.get(name)
    }

    pub fn has_struct(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    pub fn structs(&self) -> impl Iterator<Item = &IRStruct> {
        self.structs.values()
    }

    pub fn declare_function(&mut self, signature: FunctionSignature) -> Option<FunctionSignature> {
        self.functions.insert(signature.name.clone(), signature)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.values()
    }

    pub fn declare_event(&mut self, event: IREvent) {
        self.events.insert(event.name.clone(), event);
    }

    pub fn event(&self, name: &str) -> Option<&IREvent> {
        self.events.get(name)
    }

    pub fn declare_error(&mut self, error: IRError) {
        self.errors.insert(error.name.clone(), error);
    }

    pub fn error(&self, name: &str) -> Option<&IRError> {
        self.errors.get(name)
    }

    /// Member types of a struct, used to expand structs into wire-format tuples.
    pub fn struct_member_types(&self, name: &str) -> Option<Vec<Type>> {
        self.struct_def(name).map(IRStruct::field_types)
    }

    /// Canonical wire-format name of `ty` with structs expanded.
    pub fn canonical_type(&self, ty: &Type) -> Option<String> {
        ty.canonical_with(&|name| self.struct_member_types(name))
    }

    pub fn clear(&mut self) {
        self.variables.clear();
        self.structs.clear();
        self.functions.clear();
        self.events.clear();
        self.errors.clear();
    }
}

/// A lexical scope for method locals and parameters.
#[derive(Debug, Default)]
pub struct Scope {
    symbols: HashMap<String, Type>,
    parent: Option<Box<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Scope) -> Self {
        Self {
            symbols: HashMap::new(),
            parent: Some(Box::new(parent)),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: Type) {
        self.symbols.insert(name.into(), ty);
    }

    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.symbols
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.lookup(name)))
    }

    pub fn into_parent(self) -> Option<Scope> {
        self.parent.map(|parent| *parent)
    }
}

/// Stack of nested scopes for one method body.
#[derive(Debug)]
pub struct ScopeStack {
    current: Scope,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            current: Scope::new(),
        }
    }

    pub fn push(&mut self) {
        let parent = std::mem::take(&mut self.current);
        self.current = Scope::with_parent(parent);
    }

    pub fn pop(&mut self) {
        let current = std::mem::take(&mut self.current);
        self.current = current.into_parent().unwrap_or_default();
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: Type) {
        self.current.insert(name, ty);
    }

    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.current.lookup(name)
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_shadowing() {
        let mut scopes = ScopeStack::new();
        scopes.insert("x", Type::Uint256);
        scopes.push();
        scopes.insert("x", Type::Bool);
        scopes.insert("y", Type::Address);
        assert_eq!(scopes.lookup("x"), Some(&Type::Bool));
        scopes.pop();
        assert_eq!(scopes.lookup("x"), Some(&Type::Uint256));
        assert_eq!(scopes.lookup("y"), None);

        scopes.pop();
        assert_eq!(scopes.lookup("x"), None);
    }

    #[test]
    fn test_declaration_order_is_kept() {
        let mut table = SymbolTable::new();
        table.declare_variable("b", Type::Bool);
        table.declare_variable("a", Type::Uint256);
        let names: Vec<_> = table.variables().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(table.declare_variable("a", Type::Address), Some(Type::Uint256));
    }
}

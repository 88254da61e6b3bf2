use super::errors::TransformError;
use sluice_core::{
    symbols::ScopeStack, ErrorManager, Location, SlotManager, SymbolTable, Type,
};

/// Everything a method body needs while it is lowered.
///
/// The registry and the slot layout are complete by the time bodies are built, so both are
/// borrowed read-only. Only the diagnostics sink and the local scopes change.
pub struct BodyContext<'a> {
    pub symbols: &'a SymbolTable,
    pub slots: &'a SlotManager,
    pub errors: &'a mut ErrorManager,
    pub location: Location,
    scopes: ScopeStack,
}

impl<'a> BodyContext<'a> {
    pub fn new(
        symbols: &'a SymbolTable,
        slots: &'a SlotManager,
        errors: &'a mut ErrorManager,
        location: Location,
    ) -> Self {
        Self {
            symbols,
            slots,
            errors,
            location,
            scopes: ScopeStack::new(),
        }
    }

    pub fn declare_local(&mut self, name: impl Into<String>, ty: Type) {
        self.scopes.insert(name, ty);
    }

    pub fn local(&self, name: &str) -> Option<&Type> {
        self.scopes.lookup(name)
    }

    pub fn storage_type(&self, name: &str) -> Option<&Type> {
        self.symbols.variable(name)
    }

    pub fn push_scope(&mut self) {
        self.scopes.push();
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn report(&mut self, err: TransformError) {
        self.errors.report(err.into_diagnostic(self.location.clone()));
    }
}

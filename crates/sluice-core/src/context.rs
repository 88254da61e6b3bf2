use crate::diagnostics::ErrorManager;
use crate::slot_manager::SlotManager;
use crate::symbols::{FunctionSignature, SymbolTable};
use indexmap::IndexMap;
use tracing::debug;

/// Interface of an already-analyzed contract class, reused by contracts extending it.
#[derive(Debug, Clone, Default)]
pub struct ContractInterface {
    pub name: String,
    pub functions: Vec<FunctionSignature>,
    pub slots: SlotManager,
    pub symbols: SymbolTable,
}

#[derive(Debug, Default)]
pub struct InterfaceCache {
    interfaces: IndexMap<String, ContractInterface>,
}

impl InterfaceCache {
    pub fn get(&self, name: &str) -> Option<&ContractInterface> {
        self.interfaces.get(name)
    }

    pub fn insert(&mut self, interface: ContractInterface) {
        self.interfaces.insert(interface.name.clone(), interface);
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn clear(&mut self) {
        self.interfaces.clear();
    }
}

/// All mutable state of one compile invocation.
///
/// Built fresh (or [`reset`](CompileContext::reset)) for every run; nothing here outlives a
/// compile, so repeated builds in one process cannot see each other's state.
#[derive(Debug)]
pub struct CompileContext {
    pub symbols: SymbolTable,
    pub slots: SlotManager,
    pub errors: ErrorManager,
    pub interfaces: InterfaceCache,
    start_slot: u64,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::with_start_slot(0)
    }

    pub fn with_start_slot(start_slot: u64) -> Self {
        Self {
            symbols: SymbolTable::new(),
            slots: SlotManager::starting_at(start_slot),
            errors: ErrorManager::new(),
            interfaces: InterfaceCache::default(),
            start_slot,
        }
    }

    pub fn start_slot(&self) -> u64 {
        self.start_slot
    }

    /// Clears the per-contract registry and allocator, keeping diagnostics and the
    /// interface cache of the current run.
    pub fn begin_contract(&mut self) {
        self.symbols.clear();
        self.slots.reset(self.start_slot);
    }

    pub fn reset(&mut self) {
        debug!(start_slot = self.start_slot, "resetting compile context");
        self.symbols.clear();
        self.slots.reset(self.start_slot);
        self.errors.clear();
        self.interfaces.clear();
    }
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{ErrorCode, Location};
    use crate::slot_manager::SlotRequest;
    use crate::types::Type;

    #[test]
    fn test_reset_clears_everything() {
        let mut ctx = CompileContext::with_start_slot(4);
        ctx.symbols.declare_variable("x", Type::Uint256);
        ctx.slots
            .allocate_slot("x", SlotRequest::new(&Type::Uint256))
            .unwrap();
        ctx.errors
            .error(ErrorCode::UnknownType, "bad", Location::class("C"));
        ctx.interfaces.insert(ContractInterface {
            name: "Base".into(),
            ..Default::default()
        });

        ctx.reset();

        assert!(ctx.symbols.variable("x").is_none());
        assert!(!ctx.errors.has_errors());
        assert!(ctx.interfaces.is_empty());
        assert_eq!(
            ctx.slots
                .allocate_slot("x", SlotRequest::new(&Type::Uint256))
                .unwrap(),
            4
        );
    }
}

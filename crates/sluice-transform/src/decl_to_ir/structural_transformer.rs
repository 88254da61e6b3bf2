use super::declarations::DeclarationBuilder;
use super::validation::{validate_contract, validate_data_class};
use super::IRTransformer;
use sluice_core::{
    ClassDecl, CompileContext, ContractInterface, DeclRole, ErrorCode, IRContract, IRError,
    IREvent, IRMethod, Location, MethodDecl, SluiceError, SlotManager, SourceUnit, SymbolTable,
};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// Builds one [`IRContract`] per leaf contract class of a source unit.
///
/// Struct, event and error classes are global to the unit and declared first, in source order.
/// Contract classes are then analyzed root-first along their `extends` chain; each analyzed
/// class leaves a [`ContractInterface`] in the compile context so a parent shared by several
/// children is only validated and laid out once.
#[derive(Default)]
pub struct StructuralTransformer {
    globals: SymbolTable,
    events: Vec<IREvent>,
    errors: Vec<IRError>,
}

impl StructuralTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    fn declare_globals(&mut self, unit: &SourceUnit, ctx: &mut CompileContext) {
        for class in &unit.classes {
            let location = Location::class(&class.name);
            if class.has_role(DeclRole::Struct) {
                validate_data_class(class, &mut ctx.errors);
                match DeclarationBuilder::build_struct(class, &self.globals) {
                    Ok(def) => self.globals.declare_struct(def),
                    Err(err) => ctx.errors.report(err.into_diagnostic(location)),
                }
            } else if class.has_role(DeclRole::Event) {
                validate_data_class(class, &mut ctx.errors);
                match DeclarationBuilder::build_event(class, &self.globals) {
                    Ok(event) => {
                        self.globals.declare_event(event.clone());
                        self.events.push(event);
                    }
                    Err(err) => ctx.errors.report(err.into_diagnostic(location)),
                }
            } else if class.has_role(DeclRole::Error) {
                validate_data_class(class, &mut ctx.errors);
                match DeclarationBuilder::build_error(class, &self.globals) {
                    Ok(error) => {
                        self.globals.declare_error(error.clone());
                        self.errors.push(error);
                    }
                    Err(err) => ctx.errors.report(err.into_diagnostic(location)),
                }
            } else if !class.has_role(DeclRole::Contract) {
                debug!(class = %class.name, "skipping undecorated class");
            }
        }
    }

    fn parent_of<'u>(
        unit: &'u SourceUnit,
        class: &ClassDecl,
        ctx: &mut CompileContext,
    ) -> Option<&'u ClassDecl> {
        let name = class.extends.as_deref()?;
        let parent = unit
            .class(name)
            .filter(|parent| parent.has_role(DeclRole::Contract));
        if parent.is_none() {
            ctx.errors.error(
                ErrorCode::UnknownType,
                format!("base contract `{}` is not declared", name),
                Location::class(&class.name),
            );
        }
        parent
    }

    /// Reports every `extends` cycle once and returns the names of the classes on a cycle.
    fn report_cycles<'u>(
        unit: &'u SourceUnit,
        contract_classes: &[&'u ClassDecl],
        ctx: &mut CompileContext,
    ) -> HashSet<String> {
        let mut reported: HashSet<BTreeSet<&'u str>> = HashSet::new();
        let mut cyclic = HashSet::new();
        for &class in contract_classes {
            let mut path: Vec<&'u ClassDecl> = vec![class];
            let mut current = class.extends.as_deref().and_then(|name| unit.class(name));
            while let Some(parent) = current.filter(|parent| parent.has_role(DeclRole::Contract)) {
                if let Some(start) = path.iter().position(|seen| seen.name == parent.name) {
                    let cycle = &path[start..];
                    let members: BTreeSet<&'u str> =
                        cycle.iter().copied().map(|class| class.name.as_str()).collect();
                    if reported.insert(members) {
                        let chain: Vec<&str> = cycle
                            .iter()
                            .copied()
                            .map(|class| class.name.as_str())
                            .chain(std::iter::once(parent.name.as_str()))
                            .collect();
                        ctx.errors.error(
                            ErrorCode::InheritanceCycle,
                            format!("inheritance cycle: {}", chain.join(" -> ")),
                            Location::class(&parent.name),
                        );
                        cyclic.extend(cycle.iter().map(|class| class.name.clone()));
                    }
                    break;
                }
                path.push(parent);
                current = parent.extends.as_deref().and_then(|name| unit.class(name));
            }
        }
        cyclic
    }

    /// Ancestors of `class`, nearest first.
    fn ancestors<'u>(unit: &'u SourceUnit, class: &ClassDecl) -> Vec<&'u ClassDecl> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([class.name.clone()]);
        let mut current = class.extends.as_deref().and_then(|name| unit.class(name));
        while let Some(parent) = current.filter(|parent| parent.has_role(DeclRole::Contract)) {
            if !seen.insert(parent.name.clone()) {
                break;
            }
            chain.push(parent);
            current = parent.extends.as_deref().and_then(|name| unit.class(name));
        }
        chain
    }

    /// Validated storage layout and signatures of a contract class and everything it extends.
    fn interface_for(
        &self,
        unit: &SourceUnit,
        class: &ClassDecl,
        ctx: &mut CompileContext,
        visiting: &mut Vec<String>,
    ) -> sluice_core::Result<ContractInterface> {
        if let Some(cached) = ctx.interfaces.get(&class.name) {
            return Ok(cached.clone());
        }

        let mut slots = SlotManager::starting_at(ctx.start_slot());
        let mut symbols = self.globals.clone();
        let mut functions = Vec::new();

        visiting.push(class.name.clone());
        if let Some(parent) = Self::parent_of(unit, class, ctx) {
            if visiting.contains(&parent.name) {
                // reported up front by report_cycles
                debug!(class = %class.name, parent = %parent.name, "stopping at inheritance cycle");
            } else {
                let inherited = self.interface_for(unit, parent, ctx, visiting)?;
                slots.merge(&inherited.slots)?;
                for (name, ty) in inherited.symbols.variables() {
                    symbols.declare_variable(name.clone(), ty.clone());
                }
                for signature in &inherited.functions {
                    symbols.declare_function(signature.clone());
                }
                functions = inherited.functions;
            }
        }
        visiting.pop();

        validate_contract(class, &mut ctx.errors);
        DeclarationBuilder::build_storage(class, &mut slots, &mut symbols, &mut ctx.errors)?;

        let mut own = HashSet::new();
        for method in class.methods() {
            if !own.insert(method.name.as_str()) {
                continue;
            }
            match DeclarationBuilder::build_signature(method, &symbols) {
                Ok(signature) => {
                    symbols.declare_function(signature.clone());
                    match functions.iter_mut().find(|f| f.name == signature.name) {
                        Some(existing) => *existing = signature,
                        None => functions.push(signature),
                    }
                }
                Err(err) => ctx
                    .errors
                    .report(err.into_diagnostic(Location::member(&class.name, &method.name))),
            }
        }

        let interface = ContractInterface {
            name: class.name.clone(),
            functions,
            slots,
            symbols,
        };
        ctx.interfaces.insert(interface.clone());
        Ok(interface)
    }

    /// Methods visible in `class`: inherited ones not overridden (root-first), then its own.
    fn effective_methods<'u>(
        class: &'u ClassDecl,
        ancestors: &[&'u ClassDecl],
    ) -> Vec<(&'u ClassDecl, &'u MethodDecl)> {
        let mut seen = HashSet::new();
        let mut groups = Vec::new();
        for owner in std::iter::once(class).chain(ancestors.iter().copied()) {
            let group: Vec<_> = owner
                .methods()
                .filter(|method| seen.insert(method.name.as_str()))
                .map(|method| (owner, method))
                .collect();
            groups.push(group);
        }
        groups.into_iter().rev().flatten().collect()
    }

    fn build_constructor(
        class: &ClassDecl,
        ancestors: &[&ClassDecl],
        ctx: &mut CompileContext,
    ) -> Option<IRMethod> {
        let (owner, ctor) = std::iter::once(class)
            .chain(ancestors.iter().copied())
            .find_map(|owner| owner.constructors().next().map(|ctor| (owner, ctor)))?;

        match DeclarationBuilder::build_constructor_signature(ctor, &ctx.symbols) {
            Ok(signature) => Some(DeclarationBuilder::build_method(
                &owner.name,
                ctor,
                &signature,
                &ctx.symbols,
                &ctx.slots,
                &mut ctx.errors,
            )),
            Err(err) => {
                ctx.errors
                    .report(err.into_diagnostic(Location::member(&owner.name, "constructor")));
                None
            }
        }
    }

    fn build_contract(
        &self,
        unit: &SourceUnit,
        class: &ClassDecl,
        ctx: &mut CompileContext,
    ) -> sluice_core::Result<IRContract> {
        info!(contract = %class.name, "building contract");

        let interface = self.interface_for(unit, class, ctx, &mut Vec::new())?;
        let ancestors = Self::ancestors(unit, class);

        ctx.begin_contract();
        ctx.slots = interface.slots;
        ctx.symbols = interface.symbols;

        let mut contract = IRContract::new(&class.name);
        contract.parent_names = ancestors.iter().map(|parent| parent.name.clone()).collect();

        contract.storage = ctx
            .slots
            .allocations()
            .filter_map(|(name, range)| {
                ctx.symbols
                    .variable(name)
                    .map(|ty| DeclarationBuilder::variable(name, ty.clone(), range))
            })
            .collect();
        contract.structs = ctx.symbols.structs().cloned().collect();
        contract.events = self.events.clone();
        contract.errors = self.errors.clone();

        contract.constructor = Self::build_constructor(class, &ancestors, ctx);

        for (owner, method) in Self::effective_methods(class, &ancestors) {
            // signature defects were reported while building the interface
            let Ok(signature) = DeclarationBuilder::build_signature(method, &ctx.symbols) else {
                continue;
            };
            contract.methods.push(DeclarationBuilder::build_method(
                &owner.name,
                method,
                &signature,
                &ctx.symbols,
                &ctx.slots,
                &mut ctx.errors,
            ));
        }

        contract.symbol_table = ctx.symbols.clone();
        debug!(
            contract = %contract.name,
            storage = contract.storage.len(),
            methods = contract.methods.len(),
            "contract built"
        );
        Ok(contract)
    }
}

impl IRTransformer for StructuralTransformer {
    fn name(&self) -> &str {
        "structural"
    }

    fn transform(
        &mut self,
        unit: &SourceUnit,
        ctx: &mut CompileContext,
        contracts: &mut Vec<IRContract>,
    ) -> sluice_core::Result<()> {
        let contract_classes: Vec<&ClassDecl> = unit
            .classes
            .iter()
            .filter(|class| class.has_role(DeclRole::Contract))
            .collect();
        if contract_classes.is_empty() {
            return Err(SluiceError::NoContractClassFound);
        }

        self.declare_globals(unit, ctx);
        let cyclic = Self::report_cycles(unit, &contract_classes, ctx);

        let extended: HashSet<&str> = contract_classes
            .iter()
            .filter(|class| !cyclic.contains(&class.name))
            .filter_map(|class| class.extends.as_deref())
            .collect();
        let leaves: Vec<&ClassDecl> = contract_classes
            .iter()
            .copied()
            .filter(|class| {
                !cyclic.contains(&class.name) && !extended.contains(class.name.as_str())
            })
            .collect();
        if leaves.is_empty() {
            warn!("every contract class is part of an inheritance cycle, nothing to build");
        }

        for class in leaves {
            contracts.push(self.build_contract(unit, class, ctx)?);
        }
        Ok(())
    }
}

use crate::config::EmitterConfig;
use crate::dispatch::{ExprEmitter, TransformerRegistry};
use crate::emitter::{CodegenDiagnostic, EmitContext, EmitHelper, Emitter, WriteResult};
use crate::entrypoint::write_entrypoint;
use crate::interface::{write_error_helpers, write_event_helpers};
use crate::statements::lower_block;
use crate::storage::{target_type, write_accessors, write_slot_constants, StorageLayout};
use crate::structs::write_struct_functions;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use sluice_core::{IRContract, IRMethod, Parameter, Visibility};
use std::io::Write;
use tracing::{debug, info};

const RUNTIME_IMPORTS: &[&str] = &[
    "import { U256, I256, Address, Str, Bool, Array } from \"./runtime\";",
    "import { slot_key, slot_at, array_slot, mapping_slot, mapping_slot2 } from \"./runtime\";",
    "import { malloc, read_args, write_result, revert, emit_log, native_keccak256 } from \"./hostio\";",
    "import { storage_load_bytes32, storage_cache_bytes32, storage_flush_cache } from \"./hostio\";",
    "import { msg_sender, msg_value, block_timestamp, block_number, contract_address } from \"./hostio\";",
];

/// Generated source of one contract plus the constructs that could not be lowered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedModule {
    pub contract: String,
    pub source: String,
    pub diagnostics: Vec<CodegenDiagnostic>,
}

/// Emits a whole contract module: slot constants, struct and storage helpers, error and event
/// helpers, the lowered methods and the calldata router.
pub struct ContractEmitter {
    config: EmitterConfig,
    registry: TransformerRegistry,
}

impl Default for ContractEmitter {
    fn default() -> Self {
        Self::new(EmitterConfig::default())
    }
}

impl ContractEmitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self::with_registry(config, TransformerRegistry::default())
    }

    pub fn with_registry(config: EmitterConfig, registry: TransformerRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn registry(&self) -> &TransformerRegistry {
        &self.registry
    }

    pub fn emit_module(&self, contract: &IRContract) -> Result<EmittedModule> {
        let mut buffer = Vec::new();
        let mut ctx = EmitContext::with_config(&self.config);
        self.emit(contract, &mut buffer, &mut ctx)?;
        Ok(EmittedModule {
            contract: contract.name.clone(),
            source: String::from_utf8(buffer)?,
            diagnostics: ctx.take_diagnostics(),
        })
    }

    fn write_method<W: Write>(
        &self,
        contract: &IRContract,
        layout: &StorageLayout,
        method: &IRMethod,
        header: &str,
        writer: &mut W,
        ctx: &mut EmitContext,
    ) -> WriteResult {
        ctx.begin_member(&method.name);
        let lines = {
            let mut emitter = ExprEmitter::new(&self.registry, contract, layout, ctx);
            lower_block(&method.body, &mut emitter)
        };
        debug!(method = %method.name, lines = lines.len(), "method lowered");
        EmitHelper::write_block(writer, ctx, header, |w, c| EmitHelper::write_lines(w, c, &lines))?;
        ctx.end_member();
        Ok(())
    }
}

fn params(inputs: &[Parameter]) -> String {
    inputs
        .iter()
        .map(|param| format!("{}: {}", param.name, target_type(&param.ty)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn visibility_name(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::External => "external",
        Visibility::Public => "public",
        Visibility::Internal => "internal",
    }
}

impl Emitter for ContractEmitter {
    type Item = IRContract;

    fn emit<W: Write>(
        &self,
        contract: &IRContract,
        writer: &mut W,
        ctx: &mut EmitContext,
    ) -> WriteResult {
        info!(contract = %contract.name, methods = contract.methods.len(), "emitting contract module");
        ctx.begin_contract(&contract.name);
        let layout = StorageLayout::new(contract);

        EmitHelper::write_comment(
            writer,
            ctx,
            &format!("Generated by sluice from contract {}. Do not edit.", contract.name),
        )?;
        for import in RUNTIME_IMPORTS {
            EmitHelper::write_line(writer, ctx, import)?;
        }

        if !layout.is_empty() {
            EmitHelper::write_section(writer, ctx, "Storage layout")?;
            write_slot_constants(&layout, writer, ctx)?;
        }

        if !contract.structs.is_empty() {
            EmitHelper::write_section(writer, ctx, "Structs")?;
            for def in &contract.structs {
                write_struct_functions(def, contract, writer, ctx)?;
            }
        }

        if !layout.is_empty() {
            EmitHelper::write_section(writer, ctx, "Storage accessors")?;
            write_accessors(&layout, contract, writer, ctx)?;
        }

        if !contract.errors.is_empty() {
            EmitHelper::write_section(writer, ctx, "Errors")?;
            write_error_helpers(contract, writer, ctx)?;
        }

        if !contract.events.is_empty() {
            EmitHelper::write_section(writer, ctx, "Events")?;
            write_event_helpers(contract, writer, ctx)?;
        }

        if let Some(ctor) = &contract.constructor {
            EmitHelper::write_section(writer, ctx, "Constructor")?;
            let header = format!("export function __constructor({}): void", params(&ctor.inputs));
            self.write_method(contract, &layout, ctor, &header, writer, ctx)?;
        }

        if !contract.methods.is_empty() {
            EmitHelper::write_section(writer, ctx, "Methods")?;
        }
        for method in &contract.methods {
            EmitHelper::write_comment(
                writer,
                ctx,
                &format!(
                    "{} {}",
                    visibility_name(method.visibility),
                    method.state_mutability.as_str()
                ),
            )?;
            let header = format!(
                "function {}({}): {}",
                method.name,
                params(&method.inputs),
                target_type(&method.output_type)
            );
            self.write_method(contract, &layout, method, &header, writer, ctx)?;
        }

        if self.config.emit_entrypoint {
            EmitHelper::write_section(writer, ctx, "Entrypoint")?;
            write_entrypoint(contract, writer, ctx)?;
        }

        info!(
            contract = %contract.name,
            diagnostics = ctx.diagnostics().len(),
            "contract module emitted"
        );
        Ok(())
    }

    fn emit_to_string(&self, contract: &IRContract) -> Result<String> {
        Ok(self.emit_module(contract)?.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndentStyle;
    use sluice_core::{IRStatement, StateMutability, Type};

    fn counter() -> IRContract {
        let mut contract = IRContract::new("Counter");
        contract.methods.push(IRMethod {
            name: "ping".into(),
            visibility: Visibility::External,
            state_mutability: StateMutability::Pure,
            inputs: vec![Parameter::new("flag", Type::Bool)],
            output_type: Type::Bool,
            body: vec![IRStatement::Return {
                value: Some(sluice_core::IRExpression::local("flag", Type::Bool)),
            }],
        });
        contract
    }

    #[test]
    fn test_method_layout_and_router() {
        let module = ContractEmitter::default().emit_module(&counter()).unwrap();
        assert!(module.source.starts_with("// Generated by sluice from contract Counter."));
        assert!(module.source.contains("// external pure\nfunction ping(flag: bool): bool {\n  return flag;\n}\n"));
        assert!(module.source.contains("export function user_entrypoint(len: i32): i32 {"));
        assert!(module.diagnostics.is_empty());
    }

    #[test]
    fn test_config_disables_comments_and_router() {
        let config = EmitterConfig {
            indent_style: IndentStyle::Tabs,
            emit_comments: false,
            emit_entrypoint: false,
        };
        let source = ContractEmitter::new(config).emit_to_string(&counter()).unwrap();
        assert!(!source.contains("//"));
        assert!(!source.contains("user_entrypoint"));
        assert!(source.contains("function ping(flag: bool): bool {\n\treturn flag;\n}\n"));
    }
}

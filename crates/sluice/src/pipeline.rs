use crate::config::{CompilerConfig, DiagnosticsConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sluice_core::{CompileContext, Diagnostic, IRContract, SourceUnit};
use sluice_emit::{abi_json, build_abi, CodegenDiagnostic, ContractEmitter};
use sluice_transform::transform_to_ir;
use tracing::{debug, info};

/// One storage field as it was laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub slot: u64,
    pub slot_count: u64,
}

/// Everything produced for a single contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractArtifacts {
    pub name: String,
    pub source: String,
    pub abi: String,
    /// Hex sha256 of `source`. Identical inputs always give identical fingerprints.
    pub fingerprint: String,
    pub layout: Vec<SlotAssignment>,
    pub codegen_diagnostics: Vec<CodegenDiagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOutput {
    pub contracts: Vec<ContractArtifacts>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    /// True when the source had errors or some construct could not be lowered.
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
            || self
                .contracts
                .iter()
                .any(|contract| !contract.codegen_diagnostics.is_empty())
    }

    pub fn contract(&self, name: &str) -> Option<&ContractArtifacts> {
        self.contracts.iter().find(|contract| contract.name == name)
    }

    /// Source diagnostics, one per line, followed by codegen failures.
    pub fn render_diagnostics(&self, config: &DiagnosticsConfig) -> String {
        let mut lines: Vec<String> = self
            .diagnostics
            .iter()
            .map(|diagnostic| diagnostic.render(config.use_colors))
            .collect();
        for contract in &self.contracts {
            for diagnostic in &contract.codegen_diagnostics {
                let place = match &diagnostic.member {
                    Some(member) => format!("{}.{}", diagnostic.contract, member),
                    None => diagnostic.contract.clone(),
                };
                lines.push(format!("codegen [{}]: {}", place, diagnostic.message));
            }
        }
        lines.join("\n")
    }
}

pub fn fingerprint(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}

fn layout_report(contract: &IRContract) -> Vec<SlotAssignment> {
    contract
        .storage
        .iter()
        .map(|var| SlotAssignment {
            name: var.name.clone(),
            ty: var.ty.to_string(),
            slot: var.slot,
            slot_count: var.slot_count,
        })
        .collect()
}

/// Runs the whole pipeline over one source unit: declarations to IR, then IR to modules,
/// ABIs and layout reports. Source defects come back as diagnostics; only faults that leave
/// nothing to compile are errors.
pub fn compile(unit: &SourceUnit, config: &CompilerConfig) -> Result<CompileOutput> {
    let mut ctx = CompileContext::with_start_slot(config.storage.start_slot);
    let contracts = transform_to_ir(unit, &mut ctx)?;
    info!(
        file = unit.file.as_deref().unwrap_or("<memory>"),
        contracts = contracts.len(),
        "declarations lowered"
    );

    let emitter = ContractEmitter::new(config.emitter.clone());
    let mut artifacts = Vec::with_capacity(contracts.len());
    for contract in &contracts {
        let module = emitter
            .emit_module(contract)
            .with_context(|| format!("failed to emit contract {}", contract.name))?;
        let abi = build_abi(contract)
            .with_context(|| format!("failed to build the ABI of {}", contract.name))?;
        let abi = abi_json(&abi, config.abi.pretty)?;
        let fingerprint = fingerprint(&module.source);
        debug!(contract = %contract.name, %fingerprint, "artifacts ready");
        artifacts.push(ContractArtifacts {
            name: contract.name.clone(),
            abi,
            fingerprint,
            layout: layout_report(contract),
            source: module.source,
            codegen_diagnostics: module.diagnostics,
        });
    }

    Ok(CompileOutput {
        contracts: artifacts,
        diagnostics: ctx.errors.take(),
    })
}

/// Parses a JSON source unit and compiles it.
pub fn compile_json(json: &str, config: &CompilerConfig) -> Result<CompileOutput> {
    let unit = SourceUnit::from_json(json).context("invalid source unit")?;
    compile(&unit, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(fingerprint("a").len(), 64);
    }
}

/*! Compile decorated contract declarations into storage-backed source modules.
 *
 * One call takes a parsed source unit through the whole pipeline: contract discovery, type
 * resolution, storage layout, IR lowering and code generation. Each contract comes back with
 * its generated source, JSON ABI, slot layout and a fingerprint of the source.
 *
 * ```
 * use sluice::{compile_json, CompilerConfig};
 *
 * let json = r#"{ "classes": [ { "name": "Empty", "roles": ["Contract"] } ] }"#;
 * let output = compile_json(json, &CompilerConfig::default()).unwrap();
 * assert_eq!(output.contracts[0].name, "Empty");
 * ```
 */

pub mod config;
pub mod pipeline;

pub use sluice_core as core;
pub use sluice_emit as emit;
pub use sluice_transform as transform;

pub use config::{AbiConfig, CompilerConfig, DiagnosticsConfig, StorageConfig};
pub use pipeline::{compile, compile_json, fingerprint, CompileOutput, ContractArtifacts, SlotAssignment};

pub use sluice_core::{Diagnostic, ErrorCode, IRContract, SluiceError, SourceUnit, Type};
pub use sluice_emit::{AbiEntry, CodegenDiagnostic, ContractEmitter, EmitterConfig};

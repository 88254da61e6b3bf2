/*! Code generation for sluice IR.
 *
 * A contract comes out as one source module for a 32-byte-word storage machine. Expressions
 * are lowered by type-directed handlers registered in a [`TransformerRegistry`]; storage,
 * struct, error and event helpers are generated from the contract's layout; selectors and the
 * JSON ABI are derived from canonical signatures.
 */

pub mod abi;
pub mod config;
pub mod dispatch;
pub mod emitter;
pub mod entrypoint;
pub mod error;
pub mod handlers;
pub mod interface;
pub mod module;
pub mod result;
pub mod selector;
pub mod statements;
pub mod storage;
pub mod structs;

pub use abi::{abi_json, build_abi, AbiEntry, AbiParam};
pub use config::{EmitterConfig, IndentStyle};
pub use dispatch::{ExprEmitter, ExpressionHandler, TransformerRegistry, TypeTransformer};
pub use emitter::{CodegenDiagnostic, EmitContext, EmitHelper, Emitter};
pub use error::{EmitError, EmitOutcome};
pub use module::{ContractEmitter, EmittedModule};
pub use result::EmitResult;
pub use selector::{canonical_signature, event_topic, selector, selector_u32};
pub use storage::{StorageEntry, StorageLayout};

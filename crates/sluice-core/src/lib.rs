/*! Core data model for the sluice contract compiler.
 *
 * Decorated contract classes come in as a declaration tree, get resolved into semantic types,
 * laid out over 32-byte storage slots, and lowered into an IR that code generation consumes.
 * This crate holds all of those shapes plus the per-compile state that ties them together.
 */

pub mod context;
pub mod contract;
pub mod decl;
pub mod diagnostics;
pub mod ir;
pub mod slot_manager;
pub mod symbols;
pub mod types;

pub use context::{CompileContext, ContractInterface, InterfaceCache};
pub use contract::{
    IRContract, IRError, IRErrorField, IREvent, IREventField, IRMethod, IRStruct, IRStructField,
    IRVariable, Parameter, StateMutability, VariableKind, Visibility,
};
pub use decl::{ClassDecl, ClassMember, DeclRole, Expr, MethodDecl, Modifier, SourceUnit, Stmt};
pub use diagnostics::{Diagnostic, ErrorCode, ErrorKind, ErrorManager, Location};
pub use ir::{BinaryOp, Builtin, Callee, IRExpression, IRStatement, Literal, Scope, UnaryOp};
pub use slot_manager::{SlotManager, SlotRange, SlotRequest};
pub use symbols::{FunctionSignature, SymbolTable};
pub use types::{Factory, Type};

use thiserror::Error;

/// Faults that abort a compile. Recoverable source defects are [`Diagnostic`]s instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SluiceError {
    #[error("No contract class found in source")]
    NoContractClassFound,
    #[error("Slot collision: `{name}` already occupies slot {slot}")]
    SlotCollision { name: String, slot: u64 },
    #[error("Variable `{0}` has no allocated slot")]
    UnallocatedVariable(String),
    #[error("Cannot merge storage layouts: `{name}` sits at slot {left} and at slot {right}")]
    MergeConflict { name: String, left: u64, right: u64 },
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SluiceError>;

#[cfg(test)]
mod tests;

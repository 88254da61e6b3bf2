/*! Transform contract declarations into sluice IR.
 *
 * Decorated classes describe storage, methods, events, errors and structs with high-level
 * types. This crate validates them, assigns storage slots, and lowers method bodies into IR
 * where every call carries an explicit operation and a resolved return type.
 */

pub mod decl_to_ir;

pub use decl_to_ir::{
    transform_to_ir, IRTransformer, MutabilityCheck, TransformError, TransformationPipeline,
};

/*! Lower contract declarations to sluice IR.
 *
 * The front-end hands over classes with decorator roles and untyped-looking expression trees.
 * This pipeline resolves every type name, lays out storage, and turns method bodies into IR
 * where each call knows what it invokes and what it returns. Code generation never has to
 * guess after this point.
 */

mod chained_call;
mod context;
mod declarations;
mod errors;
mod expression_transformer;
mod statement_transformer;
mod structural_transformer;
mod type_resolver;
mod validation;

use sluice_core::{
    CompileContext, ErrorCode, IRContract, IRStatement, Location, Result, SourceUnit,
};
use tracing::{debug, warn};

pub use chained_call::{ChainedCallResolver, ReceiverKind};
pub use context::BodyContext;
pub use declarations::DeclarationBuilder;
pub use errors::TransformError;
pub use expression_transformer::ExpressionTransformer;
pub use statement_transformer::StatementTransformer;
pub use structural_transformer::StructuralTransformer;
pub use type_resolver::TypeResolver;

/// One pass over the source unit and the contracts built so far.
pub trait IRTransformer {
    fn name(&self) -> &str;

    fn transform(
        &mut self,
        unit: &SourceUnit,
        ctx: &mut CompileContext,
        contracts: &mut Vec<IRContract>,
    ) -> Result<()>;

    fn check_prerequisites(&self, _contracts: &[IRContract]) -> Result<()> {
        Ok(())
    }
}

/// Rejects `@View` / `@Pure` methods whose bodies write storage.
#[derive(Default)]
pub struct MutabilityCheck;

impl IRTransformer for MutabilityCheck {
    fn name(&self) -> &str {
        "mutability"
    }

    fn transform(
        &mut self,
        _unit: &SourceUnit,
        ctx: &mut CompileContext,
        contracts: &mut Vec<IRContract>,
    ) -> Result<()> {
        for contract in contracts.iter() {
            for method in &contract.methods {
                if !method.state_mutability.is_read_only()
                    || !method.body.iter().any(IRStatement::writes_storage)
                {
                    continue;
                }
                let target = statement_transformer::storage_write_target(&method.body)
                    .map(|name| format!(" (`{}`)", name))
                    .unwrap_or_default();
                ctx.errors.error(
                    ErrorCode::ReadOnlyMethodWritesStorage,
                    format!(
                        "method is declared {} but writes storage{}",
                        method.state_mutability.as_str(),
                        target
                    ),
                    Location::member(&contract.name, &method.name),
                );
            }
        }
        Ok(())
    }
}

pub struct TransformationPipeline {
    transformers: Vec<Box<dyn IRTransformer>>,
}

impl Default for TransformationPipeline {
    fn default() -> Self {
        Self::new()
            .with_transformer(Box::new(StructuralTransformer::new()))
            .with_transformer(Box::new(MutabilityCheck))
    }
}

impl TransformationPipeline {
    pub fn new() -> Self {
        Self {
            transformers: vec![],
        }
    }

    pub fn with_transformer(mut self, transformer: Box<dyn IRTransformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    pub fn transform(mut self, unit: &SourceUnit, ctx: &mut CompileContext) -> Result<Vec<IRContract>> {
        let mut contracts = Vec::new();
        for transformer in &mut self.transformers {
            debug!(pass = transformer.name(), "running transformation pass");
            transformer.check_prerequisites(&contracts)?;
            transformer.transform(unit, ctx, &mut contracts)?;
        }

        if ctx.errors.has_errors() {
            warn!(
                diagnostics = ctx.errors.diagnostics().len(),
                "declarations lowered with diagnostics"
            );
        }
        Ok(contracts)
    }
}

/// Builds the IR for every leaf contract in `unit` with the default passes.
pub fn transform_to_ir(unit: &SourceUnit, ctx: &mut CompileContext) -> Result<Vec<IRContract>> {
    TransformationPipeline::default().transform(unit, ctx)
}

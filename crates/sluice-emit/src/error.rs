use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("no handler for {kind} expression of type {ty}")]
    NoHandler { kind: &'static str, ty: String },

    #[error("unsupported {0}")]
    Unsupported(String),

    #[error("no storage accessor for `{0}`")]
    UnresolvedAccessor(String),

    #[error("call to undeclared function `{0}`")]
    UnknownFunction(String),

    #[error("type {0} has no wire-format name")]
    UnresolvedType(String),
}

pub type EmitOutcome<T> = std::result::Result<T, EmitError>;

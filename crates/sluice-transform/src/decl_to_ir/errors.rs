use sluice_core::{Diagnostic, ErrorCode, Location};
use thiserror::Error;

/// Failure while lowering one declaration or statement.
///
/// These never abort a build: the contract builder turns them into diagnostics and moves on
/// to the next statement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("Invalid assignment target: {0}")]
    InvalidAssignmentTarget(String),

    #[error("Missing type annotation for `{0}`")]
    MissingTypeAnnotation(String),

    #[error("Cannot resolve return type of `{0}`")]
    UnresolvableReturnType(String),

    #[error("Layout of `{0}` does not fit in 2^32 bytes")]
    LayoutOverflow(String),

    #[error("Literal {0} does not fit in 256 bits")]
    LiteralOutOfRange(String),
}

impl TransformError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TransformError::UnknownIdentifier(_) => ErrorCode::UnknownIdentifier,
            TransformError::UnknownType(_) => ErrorCode::UnknownType,
            TransformError::UnsupportedExpression(_) => ErrorCode::UnsupportedExpression,
            TransformError::InvalidAssignmentTarget(_) => ErrorCode::InvalidAssignmentTarget,
            TransformError::MissingTypeAnnotation(_) => ErrorCode::MissingTypeAnnotation,
            TransformError::UnresolvableReturnType(_) => ErrorCode::UnresolvableReturnType,
            TransformError::LayoutOverflow(_) => ErrorCode::LayoutOverflow,
            TransformError::LiteralOutOfRange(_) => ErrorCode::LiteralOutOfRange,
        }
    }

    pub fn into_diagnostic(self, location: Location) -> Diagnostic {
        Diagnostic::new(self.code(), self.to_string()).at(location)
    }
}

impl From<sluice_core::SluiceError> for TransformError {
    fn from(err: sluice_core::SluiceError) -> Self {
        match err {
            sluice_core::SluiceError::UnknownType(name) => TransformError::UnknownType(name),
            sluice_core::SluiceError::UnallocatedVariable(name) => {
                TransformError::UnknownIdentifier(name)
            }
            other => TransformError::UnsupportedExpression(other.to_string()),
        }
    }
}

/*! Recoverable source defects.
 *
 * The declaration pass reports every defect it finds instead of stopping at the first one.
 * Each diagnostic carries a stable code so tooling and tests can match on it.
 */

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Syntax,
    Semantic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    MultipleConstructors,
    MissingTypeAnnotation,
    InvalidDecoratorTarget,
    UnsupportedExpression,
    ConstructorNotPublic,
    DuplicateMethod,
    ConflictingVisibility,
    MissingVisibility,
    ConflictingMutability,
    UnresolvableReturnType,
    UnknownType,
    DuplicateStorageField,
    UnknownIdentifier,
    ReadOnlyMethodWritesStorage,
    InvalidAssignmentTarget,
    InheritanceCycle,
    LayoutOverflow,
    LiteralOutOfRange,
}

impl ErrorCode {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCode::MultipleConstructors => "S001",
            ErrorCode::MissingTypeAnnotation => "S002",
            ErrorCode::InvalidDecoratorTarget => "S003",
            ErrorCode::UnsupportedExpression => "S004",
            ErrorCode::ConstructorNotPublic => "E001",
            ErrorCode::DuplicateMethod => "E002",
            ErrorCode::ConflictingVisibility => "E003",
            ErrorCode::MissingVisibility => "E004",
            ErrorCode::ConflictingMutability => "E005",
            ErrorCode::UnresolvableReturnType => "E006",
            ErrorCode::UnknownType => "E007",
            ErrorCode::DuplicateStorageField => "E008",
            ErrorCode::UnknownIdentifier => "E009",
            ErrorCode::ReadOnlyMethodWritesStorage => "E010",
            ErrorCode::InvalidAssignmentTarget => "E011",
            ErrorCode::InheritanceCycle => "E012",
            ErrorCode::LayoutOverflow => "E013",
            ErrorCode::LiteralOutOfRange => "E014",
        }
    }

    pub fn kind(self) -> ErrorKind {
        match self {
            ErrorCode::MultipleConstructors
            | ErrorCode::MissingTypeAnnotation
            | ErrorCode::InvalidDecoratorTarget
            | ErrorCode::UnsupportedExpression => ErrorKind::Syntax,
            _ => ErrorKind::Semantic,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Declaration the diagnostic points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub class: String,
    pub member: Option<String>,
}

impl Location {
    pub fn class(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            member: None,
        }
    }

    pub fn member(class: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            member: Some(member.into()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{}.{}", self.class, member),
            None => write!(f, "{}", self.class),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: code.kind(),
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn render(&self, use_colors: bool) -> String {
        let label = match self.kind {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Semantic => "semantic error",
        };
        let head = format!("{}[{}]", label, self.code);
        let head = if use_colors {
            head.red().bold().to_string()
        } else {
            head
        };
        match &self.location {
            Some(location) => {
                let location = if use_colors {
                    location.to_string().cyan().to_string()
                } else {
                    location.to_string()
                };
                format!("{}: {} ({})", head, self.message, location)
            }
            None => format!("{}: {}", head, self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorManager {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(code = diagnostic.code.code(), "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, code: ErrorCode, message: impl Into<String>, location: Location) {
        self.report(Diagnostic::new(code, message).at(location));
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.diagnostics.iter().map(|d| d.code.code()).collect()
    }

    pub fn of_kind(&self, kind: ErrorKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    pub fn render(&self, use_colors: bool) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.render(use_colors))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorCode::MultipleConstructors.code(), "S001");
        assert_eq!(ErrorCode::ConstructorNotPublic.code(), "E001");
        assert_eq!(ErrorCode::DuplicateMethod.code(), "E002");
        assert_eq!(ErrorCode::InheritanceCycle.code(), "E012");
        assert_eq!(ErrorCode::LiteralOutOfRange.code(), "E014");
        assert_eq!(ErrorCode::MultipleConstructors.kind(), ErrorKind::Syntax);
        assert_eq!(ErrorCode::DuplicateMethod.kind(), ErrorKind::Semantic);
    }

    #[test]
    fn test_manager_batches_errors() {
        let mut errors = ErrorManager::new();
        errors.error(
            ErrorCode::ConstructorNotPublic,
            "constructor must be public",
            Location::member("Token", "constructor"),
        );
        errors.error(
            ErrorCode::DuplicateMethod,
            "method `mint` is declared twice",
            Location::member("Token", "mint"),
        );
        assert_eq!(errors.codes(), vec!["E001", "E002"]);
        assert_eq!(errors.of_kind(ErrorKind::Syntax).count(), 0);
    }

    #[test]
    fn test_plain_rendering() {
        let diagnostic = Diagnostic::new(ErrorCode::MultipleConstructors, "found 2 constructors")
            .at(Location::class("Token"));
        assert_eq!(
            diagnostic.to_string(),
            "syntax error[S001]: found 2 constructors (Token)"
        );
    }
}

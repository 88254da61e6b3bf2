use sluice_core::Type;

/// Output of lowering one expression.
///
/// `setup_lines` must run, in order, before `value_expr` is evaluated. `value_expr` itself
/// never has side effects, so it may be dropped or repeated freely. Expressions that only
/// make sense as statements (storage writes, logs, reverts) carry `statement_lines` and an
/// empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitResult {
    pub setup_lines: Vec<String>,
    pub value_expr: String,
    pub value_type: Type,
    pub statement_lines: Option<Vec<String>>,
}

impl EmitResult {
    pub fn value(expr: impl Into<String>, ty: Type) -> Self {
        Self {
            setup_lines: Vec::new(),
            value_expr: expr.into(),
            value_type: ty,
            statement_lines: None,
        }
    }

    pub fn statement(setup_lines: Vec<String>, lines: Vec<String>) -> Self {
        Self {
            setup_lines,
            value_expr: String::new(),
            value_type: Type::Void,
            statement_lines: Some(lines),
        }
    }

    pub fn with_setup(mut self, setup_lines: Vec<String>) -> Self {
        self.setup_lines = setup_lines;
        self
    }

    pub fn is_statement(&self) -> bool {
        self.statement_lines.is_some()
    }

    /// Lines for an expression used as a statement. A pure value is dropped.
    pub fn into_statement_lines(self) -> Vec<String> {
        let mut lines = self.setup_lines;
        lines.extend(self.statement_lines.unwrap_or_default());
        lines
    }
}

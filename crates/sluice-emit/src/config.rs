use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    pub indent_style: IndentStyle,
    /// Section banners and per-method provenance comments.
    pub emit_comments: bool,
    /// Generate the `user_entrypoint` selector router.
    pub emit_entrypoint: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            indent_style: IndentStyle::Spaces(2),
            emit_comments: true,
            emit_entrypoint: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndentStyle {
    Spaces(usize),
    Tabs,
}

impl IndentStyle {
    pub fn unit(&self) -> String {
        match self {
            IndentStyle::Spaces(n) => " ".repeat(*n),
            IndentStyle::Tabs => "\t".to_string(),
        }
    }
}

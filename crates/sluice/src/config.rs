use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sluice_emit::EmitterConfig;
use std::path::Path;

/// Settings for one compile run. Every section falls back to its defaults when omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub emitter: EmitterConfig,
    pub abi: AbiConfig,
    pub storage: StorageConfig,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbiConfig {
    pub pretty: bool,
}

impl Default for AbiConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// First slot handed out by the allocator.
    pub start_slot: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub use_colors: bool,
}

impl CompilerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid compiler configuration")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sluice_emit::IndentStyle;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CompilerConfig::from_json(
            r#"{ "storage": { "start_slot": 4 }, "emitter": { "indent_style": "Tabs" } }"#,
        )
        .unwrap();
        assert_eq!(config.storage.start_slot, 4);
        assert_eq!(config.emitter.indent_style, IndentStyle::Tabs);
        assert!(config.emitter.emit_entrypoint);
        assert!(config.abi.pretty);
        assert!(!config.diagnostics.use_colors);
    }

    #[test]
    fn test_malformed_config_is_reported() {
        let err = CompilerConfig::from_json(r#"{ "storage": { "start_slot": "x" } }"#).unwrap_err();
        assert_eq!(err.to_string(), "invalid compiler configuration");
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = CompilerConfig::from_file("/nonexistent/sluice.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sluice.json"));
    }
}

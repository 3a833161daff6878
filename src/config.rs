//! Assembler configuration, loadable from TOML and overridable from the CLI.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::block_id::IdScheme;
use crate::error::{AssemblerError, Result};

/// Default agent streaming endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/agent/stream";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssemblerConfig {
    /// The only fenced-code language that gets a collapsible block.
    pub special_language: String,
    /// Delay between the terminal frame and the collapse reconciliation.
    pub collapse_debounce_ms: u64,
    pub id_scheme: IdScheme,
    /// Text shown between logic blocks.
    pub divider: String,
    pub endpoint: String,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            special_language: "python".to_string(),
            collapse_debounce_ms: 300,
            id_scheme: IdScheme::default(),
            divider: "---".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl AssemblerConfig {
    /// Parse a TOML document. Missing keys fall back to their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: AssemblerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let lang = self.special_language.trim();
        if lang.is_empty() {
            return Err(AssemblerError::Config(
                "special_language must not be empty".to_string(),
            ));
        }
        if !lang.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(AssemblerError::Config(format!(
                "special_language must be a single word, got '{lang}'"
            )));
        }
        Ok(())
    }

    pub fn collapse_debounce(&self) -> Duration {
        Duration::from_millis(self.collapse_debounce_ms)
    }

}

/// Whether a fence language names the special language. Case and
/// surrounding blanks are ignored on both sides.
pub fn language_matches(language: &str, special_language: &str) -> bool {
    language.trim().eq_ignore_ascii_case(special_language.trim())
}

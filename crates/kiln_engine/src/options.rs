//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directories the engine operates in.
///
/// Constructed directly by embedders, or parsed from a `[build]` table in a
/// TOML document via [`BuildOptions::from_toml_str`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Directory holding the persisted state snapshot.
    pub state_dir: PathBuf,

    /// Root directory artifact destination paths are resolved against.
    pub output_dir: PathBuf,
}

/// Wrapper matching the on-disk TOML layout.
#[derive(Debug, Deserialize)]
struct OptionsFile {
    build: BuildOptions,
}

impl BuildOptions {
    /// Creates options from explicit directories.
    pub fn new(state_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Parses and validates options from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, OptionsError> {
        let file: OptionsFile =
            toml::from_str(content).map_err(|e| OptionsError::Parse(e.to_string()))?;
        let options = file.build;
        options.validate()?;
        Ok(options)
    }

    /// Validates that required fields are non-empty.
    fn validate(&self) -> Result<(), OptionsError> {
        if self.state_dir.as_os_str().is_empty() {
            return Err(OptionsError::MissingField("build.state_dir".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(OptionsError::MissingField("build.output_dir".to_string()));
        }
        Ok(())
    }
}

/// Errors that can occur when loading or validating build options.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// The TOML content could not be parsed.
    #[error("failed to parse options: {0}")]
    Parse(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),
}

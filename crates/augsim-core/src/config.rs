//! Run configuration files
//!
//! A run can be described on the command line or in a JSON file:
//!
//! ```json
//! {
//!   "inputs": ["DOSP2019.dbf", "DOSP2020.dbf"],
//!   "pattern": null,
//!   "output": "augmented.csv",
//!   "format": "csv",
//!   "augment": { "combine": { "rule": "concatenate" }, "derive_sim_columns": true }
//! }
//! ```

use crate::augment::AugmentConfig;
use crate::error::{classify_write_error, Error, Result};
use crate::format::FormatRegistry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Format used when neither the request nor the output path names one
pub const DEFAULT_OUTPUT_FORMAT: &str = "csv";

/// What to read and where to write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Chosen input files or directories
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    /// Glob pattern selecting or filtering inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Output file
    pub output: PathBuf,
    /// Output format id; inferred from the output path when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl RunRequest {
    /// Create a request for the given inputs and output
    pub fn new(inputs: Vec<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            inputs,
            pattern: None,
            output: output.into(),
            format: None,
        }
    }

    /// Set the selection pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set the output format
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// The output format id
    ///
    /// An explicit format wins. Otherwise the output extension decides: a
    /// registered extension maps to its format, an unknown one is used as is
    /// (and rejected by the writer), and no extension means CSV.
    pub fn output_format(&self, registry: &FormatRegistry) -> String {
        if let Some(format) = self.format.as_deref().map(str::trim) {
            if !format.is_empty() {
                return format.to_ascii_lowercase();
            }
        }
        if let Some(format) = registry.for_path(&self.output) {
            return format.id().to_string();
        }
        self.output
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_OUTPUT_FORMAT.to_string())
    }
}

/// A run request plus the augmentation settings, as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(flatten)]
    pub request: RunRequest,
    #[serde(default)]
    pub augment: AugmentConfig,
}

impl RunConfig {
    /// A starting point for a new configuration file
    pub fn template() -> Self {
        Self {
            request: RunRequest {
                inputs: vec![PathBuf::from("DOSP2020.dbf")],
                pattern: None,
                output: PathBuf::from("augmented.csv"),
                format: Some(DEFAULT_OUTPUT_FORMAT.to_string()),
            },
            augment: AugmentConfig::default(),
        }
    }

    /// Load a configuration from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::ReadIo {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save the configuration as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, content).map_err(|e| classify_write_error(e, path))
    }
}

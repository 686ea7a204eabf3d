//! Store configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use cabinet_core::RuleSetKind;
use serde::{Deserialize, Serialize};

use crate::telemetry::LoggingConfig;

/// File name used when a file backend is requested without a path.
pub const DEFAULT_FILE_NAME: &str = "cabinet-records.db";

/// Which backend holds the records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendKind {
    /// Records live in memory and are lost on exit.
    #[default]
    Memory,
    /// Records persist to a slot file.
    File {
        #[serde(default = "default_file_path")]
        path: PathBuf,
    },
}

fn default_file_path() -> PathBuf {
    PathBuf::from(DEFAULT_FILE_NAME)
}

impl BackendKind {
    /// File backend at [`DEFAULT_FILE_NAME`] in the working directory.
    #[must_use]
    pub fn default_file() -> Self {
        Self::File {
            path: default_file_path(),
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File { .. } => "file",
        }
    }
}

/// Settings for building a record service.
///
/// The default is an in-memory backend with the default rule set and no
/// wrappers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Which rule set of the validation rules to enforce.
    pub rule_set: RuleSetKind,
    /// Wrap the service so every call is timed.
    pub use_stopwatch: bool,
    /// Wrap the service so every call is logged with its arguments.
    pub use_logger: bool,
    pub logging: LoggingConfig,
}

impl StoreConfig {
    /// Reads a JSON configuration file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid configuration JSON.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

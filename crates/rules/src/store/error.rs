//! Error types and load result structures for rule definition stores.

use std::path::PathBuf;

/// Errors raised by a [`RuleDefinitionStore`](super::RuleDefinitionStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/serialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Record validation error (empty or unsafe id, duplicate id).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("rule definition '{0}' not found")]
    NotFound(String),

    #[error("rule definition '{0}' already exists")]
    AlreadyExists(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcome of loading a single rule definition file.
#[derive(Debug)]
pub struct LoadResult {
    /// Path to the file that was loaded.
    pub path: PathBuf,
    /// Status of the load attempt.
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    /// Definition was successfully loaded.
    Loaded { rule_id: String },
    /// File was skipped (dotfile, non-YAML, etc.).
    Skipped { reason: String },
    /// Parse or validation error occurred.
    Failed { error: String },
}

impl LoadStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, LoadStatus::Failed { .. })
    }
}

//! Error types for the policy crate.

use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Unexpected faults raised by the catalog, detector or fix engine.
///
/// Findings and failed fixes are ordinary results, not errors.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Issue catalog is corrupt: {0}")]
    CatalogCorrupt(String),

    #[error("Rule evaluation failed: {rule} - {message}")]
    RuleEvaluationFailed { rule: String, message: String },

    #[error("Invalid rule pack: {0}")]
    InvalidRulePack(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Why a single fix strategy could not be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FixError {
    #[error("precondition not met: {0}")]
    Precondition(String),

    #[error("{0}")]
    Failed(String),

    #[error("strategy panicked: {0}")]
    Panicked(String),
}

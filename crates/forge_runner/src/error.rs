//! Error types for the runner module.

use forge_core::CoreError;
use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while running commands.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid output pattern: {0}")]
    InvalidPattern(String),

    #[error("Failed to materialize project: {0}")]
    Materialize(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

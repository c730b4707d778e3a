//! Error types for the pipeline module.

use forge_core::{CoreError, Phase};
use forge_policy::PolicyError;
use forge_runner::RunnerError;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while configuring or running the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Phase '{phase}' panicked: {message}")]
    PhasePanicked { phase: Phase, message: String },

    #[error("Phase '{phase}' was aborted: {message}")]
    PhaseAborted { phase: Phase, message: String },

    #[error("Validation run aborted: {0}")]
    RunAborted(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

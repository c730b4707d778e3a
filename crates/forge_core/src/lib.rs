//! # forge_core
//!
//! Project tree and validation data model for PWA Forge.
//!
//! This crate holds the types every pipeline phase exchanges: the in-memory
//! project tree and its metadata, findings, applied fixes, build test results
//! and the terminal `ValidationResult` consumed by presentation layers.
//!
//! # Architecture
//!
//! - **Tree**: relative path -> content map, loadable from and writable to disk
//! - **Findings**: detected issues with severity derived from their category
//! - **Results**: applied fixes, build stages, terminal status and summary
//! - **Phases**: ordered pipeline phases and their progress events

pub mod context;
pub mod error;
pub mod finding;
pub mod phase;
pub mod result;
pub mod tree;

// Re-export main types for convenience
pub use context::{Feature, Framework, ProjectMetadata};
pub use error::{CoreError, CoreResult};
pub use finding::{sort_findings, Finding, FindingCategory, Severity};
pub use phase::{Phase, PhaseEvent, PhaseEventKind, PhaseTiming, RunState};
pub use result::{
    Aggregation, AppliedFix, BuildStage, BuildTestResult, FinalStatus, StageReport, StageStatus,
    ValidationResult, ValidationSummary,
};
pub use tree::ProjectTree;

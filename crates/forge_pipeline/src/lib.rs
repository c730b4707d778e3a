//! # forge_pipeline
//!
//! Validation pipeline for generated Progressive Web Apps.
//!
//! The [`ValidationCoordinator`] runs four phases in order:
//!
//! 1. **Prevention**: always-safe normalizations of the tree
//! 2. **Detection**: catalog rules produce findings
//! 3. **Auto-fix**: strategies repair what they can, then re-detect
//! 4. **Final**: optional install/build/dev-server verification
//!
//! Each run yields a [`ValidationRun`] holding the remediated tree, phase
//! timings and the aggregated [`forge_core::ValidationResult`]. A fault in
//! any phase ends the run with status `ERROR` but keeps the partial results.
//!
//! # Example
//!
//! ```rust,no_run
//! use forge_core::{Framework, ProjectMetadata, ProjectTree};
//! use forge_pipeline::{ValidateOptions, ValidationCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tree = ProjectTree::load(std::path::Path::new("./my-pwa"))?;
//!     let metadata = ProjectMetadata::new("My PWA", Framework::React);
//!
//!     let coordinator = ValidationCoordinator::standard()?;
//!     let run = coordinator.validate(tree, metadata, &ValidateOptions::default()).await;
//!
//!     println!("{}", run.result.report());
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod error;

pub use cancel::CancelToken;
pub use config::{ForgeConfig, RulesConfig, ValidateOptions, CONFIG_FILE};
pub use coordinator::{RunObserver, ValidationCoordinator, ValidationHandle, ValidationRun};
pub use error::{PipelineError, PipelineResult};

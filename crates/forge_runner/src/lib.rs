//! # forge_runner
//!
//! Command execution and build verification for PWA Forge.
//!
//! A [`BuildVerifier`] writes a project tree to a working directory and runs
//! three stages through a [`CommandRunner`]: install, build, and a dev
//! server that must report readiness. Stages are fail-fast and bounded by a
//! single deadline.
//!
//! # Features
//!
//! - **Shell Runner**: `sh -c` / `cmd /C` via `tokio::process`; each command
//!   runs in its own process group, which is killed when the call ends
//! - **Dry-Run Mode**: log commands without executing them
//! - **Package Managers**: npm, pnpm, yarn and bun detected from the lockfile
//! - **Mock Runner**: scripted responses for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use forge_core::ProjectTree;
//! use forge_runner::{BuildVerifier, ShellRunner, VerifierConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tree = ProjectTree::load(std::path::Path::new("./my-pwa"))?;
//!     let verifier = BuildVerifier::new(Arc::new(ShellRunner::new()), VerifierConfig::default())?;
//!
//!     let result = verifier.verify(&tree, Some(Duration::from_secs(300))).await?;
//!     println!("install: {}, build: {}", result.install_success, result.build_success);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod runner;
pub mod shell;
pub mod verifier;

pub use config::{
    BuildCommands, PackageManager, VerifierConfig, DEFAULT_READINESS_PATTERN, DEFAULT_WARNING_PATTERNS,
};
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockBehavior, MockResponse, MockRunner};
pub use runner::{CommandRunner, ExecutionResult, OutputLog, Readiness, ServiceOutcome};
pub use shell::ShellRunner;
pub use verifier::BuildVerifier;

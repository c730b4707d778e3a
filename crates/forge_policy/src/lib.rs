//! # forge_policy
//!
//! Issue catalog, prevention, detection and auto-fix for PWA Forge.
//!
//! # Architecture
//!
//! - **Catalog**: registry of detection rules and fix strategies, built-in or
//!   loaded from YAML rule packs
//! - **Prevention**: always-safe normalizations applied before detection
//! - **Detection**: parallel, deterministic evaluation of catalog rules
//! - **Auto-fix**: bounded multi-pass remediation with re-detection
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use forge_policy::{AutoFixEngine, IssueCatalog, IssueDetector, PreventionScanner};
//!
//! let catalog = Arc::new(IssueCatalog::standard()?);
//! PreventionScanner::standard().scan(&mut tree, &metadata);
//!
//! let findings = IssueDetector::new(catalog.clone()).detect(&tree, &metadata)?;
//! let outcome = AutoFixEngine::new(catalog).remediate(&mut tree, findings, &metadata)?;
//! println!("{} fixes applied", outcome.applied_fixes.len());
//! ```

pub mod autofix;
pub mod catalog;
pub mod detector;
pub mod error;
pub mod pack;
pub mod prevention;
pub mod pwa;
pub mod rules;
pub mod strategies;

pub use autofix::{AutoFixEngine, FixFailure, RemediationFault, RemediationOutcome, DEFAULT_MAX_PASSES};
pub use catalog::{
    DetectContext, FixContext, FixStrategy, Issue, IssueCatalog, IssueRule, RuleScope, SourceFile,
};
pub use detector::{default_concurrency, IssueDetector};
pub use error::{FixError, PolicyError, PolicyResult};
pub use pack::{PackRule, PackRuleKind, RulePack};
pub use prevention::{PreventionReport, PreventionRule, PreventionScanner};

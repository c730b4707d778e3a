//! CLI command definitions.
//!
//! Each subcommand loads a project tree from disk and drives one part of the
//! validation pipeline over it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use forge_core::{Feature, Framework, ProjectMetadata, ProjectTree};
use forge_pipeline::ForgeConfig;

pub mod catalog;
pub mod detect;
pub mod validate;

/// PWA Forge - validate and auto-remediate generated Progressive Web Apps
#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about = "PWA Forge - validate and auto-remediate generated Progressive Web Apps")]
#[command(long_about = r#"
PWA Forge checks a generated Progressive Web App, repairs what it can with
confidence-scored fixes, and optionally verifies that the result installs,
builds and serves.

COMMANDS:
  validate  → Prevention, detection, auto-fix and build verification
  detect    → Report findings without changing anything
  catalog   → List rules and fix strategies

EXIT CODES:
  0 - Ready to use
  1 - General error
  2 - Invalid arguments
  3 - Needs attention
  4 - Pipeline error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a project and fix what can be fixed
    Validate(validate::ValidateArgs),

    /// Detect issues without fixing them
    Detect(detect::DetectArgs),

    /// List the rule catalog
    Catalog(catalog::CatalogArgs),
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Project selection shared by `validate` and `detect`.
#[derive(clap::Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root directory
    pub path: PathBuf,

    /// Framework (react, vue, svelte, angular, vanilla); inferred from package.json when omitted
    #[arg(long)]
    pub framework: Option<String>,

    /// Selected feature (offline, push-notifications, install-prompt, background-sync, typescript)
    #[arg(long = "feature", value_delimiter = ',')]
    pub features: Vec<String>,

    /// Application display name; defaults to the package.json name
    #[arg(long)]
    pub name: Option<String>,

    /// Config file; defaults to forge.yaml in the project root
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Additional rule pack
    #[arg(long = "rules")]
    pub rule_packs: Vec<PathBuf>,
}

impl ProjectArgs {
    pub fn load_tree(&self) -> Result<ProjectTree> {
        ProjectTree::load(&self.path)
            .with_context(|| format!("Failed to load project from {}", self.path.display()))
    }

    /// Metadata inferred from the tree, overridden by flags.
    pub fn metadata(&self, tree: &ProjectTree) -> ProjectMetadata {
        let mut metadata = ProjectMetadata::infer(tree);
        if let Some(framework) = &self.framework {
            metadata.framework = Framework::from_str(framework);
        }
        if let Some(name) = &self.name {
            metadata.name = name.clone();
        }
        for feature in &self.features {
            metadata = metadata.with_feature(Feature::from_str(feature.trim()));
        }
        metadata
    }

    /// The explicit config file, or `forge.yaml` in the project root.
    pub fn load_config(&self) -> Result<ForgeConfig> {
        match &self.config {
            Some(path) => ForgeConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display())),
            None => ForgeConfig::discover(&self.path).context("Failed to load forge.yaml"),
        }
    }

    /// Directory relative rule pack paths in the config resolve against.
    pub fn config_base(&self) -> &Path {
        self.config
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(&self.path)
    }
}

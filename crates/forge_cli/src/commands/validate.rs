//! Validate command - run the full pipeline on a project.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use forge_core::{FinalStatus, RunState};
use forge_pipeline::{ValidationCoordinator, ValidationRun};
use forge_runner::ShellRunner;
use tracing::info;

use super::{OutputFormat, ProjectArgs};
use crate::ExitCodes;

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Verify that the remediated project installs, builds and serves
    #[arg(long)]
    pub build: bool,

    /// Bound on build verification in milliseconds (0 = none)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Files fixed in parallel
    #[arg(long)]
    pub max_fix_concurrency: Option<usize>,

    /// Write the remediated tree back to the project directory
    #[arg(long)]
    pub write: bool,

    /// Log build commands and file writes without performing them
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub async fn execute(args: ValidateArgs) -> Result<u8> {
    let tree = args.project.load_tree()?;
    let metadata = args.project.metadata(&tree);
    let config = args.project.load_config()?;

    let mut options = config.validation.clone();
    if args.build {
        options.run_build_test = true;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        options.timeout_ms = timeout_ms;
    }
    if let Some(max) = args.max_fix_concurrency {
        options.max_fix_concurrency = max.max(1);
    }

    let runner = if args.dry_run {
        ShellRunner::new().dry_run()
    } else {
        ShellRunner::new()
    };
    let coordinator = ValidationCoordinator::from_config(
        &config,
        args.project.config_base(),
        &args.project.rule_packs,
        Arc::new(runner),
    )
    .context("Failed to set up the validation pipeline")?;

    info!(
        "Validating {} as {} ({} files)",
        args.project.path.display(),
        metadata.framework,
        tree.len()
    );
    let original = tree.clone();
    let run = coordinator.validate(tree, metadata, &options).await;

    match args.format {
        OutputFormat::Text => print_text(&run),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run)?),
    }

    if args.write && run.state != RunState::Error {
        let changed = changed_paths(&original, &run);
        if changed.is_empty() {
            info!("No files changed");
        } else if args.dry_run {
            for path in &changed {
                info!("[DRY-RUN] Would write {}", path);
            }
        } else {
            run.tree
                .write_to(&args.project.path)
                .with_context(|| format!("Failed to write {}", args.project.path.display()))?;
            info!("Wrote {} changed files", changed.len());
        }
    }

    Ok(ExitCodes::for_status(run.result.final_status))
}

/// Paths whose content differs after the run (new or modified).
fn changed_paths<'a>(original: &forge_core::ProjectTree, run: &'a ValidationRun) -> Vec<&'a str> {
    run.tree
        .iter()
        .filter(|(path, content)| original.get(path) != Some(*content))
        .map(|(path, _)| path)
        .collect()
}

fn print_text(run: &ValidationRun) {
    if !run.prevention.fired.is_empty() {
        println!("🛡️  Prevention: {}", run.prevention.fired.join(", "));
    }
    print!("{}", run.result.report());

    if !run.fix_failures.is_empty() {
        println!("\nFailed fixes:");
        for failure in &run.fix_failures {
            println!("  ✗ {} - {}", failure.finding_id, failure.reason);
        }
    }

    println!();
    match run.result.final_status {
        FinalStatus::ReadyToUse => println!("✅ Project is ready to use"),
        FinalStatus::NeedsAttention => println!("⚠️  Some issues need attention. See above."),
        FinalStatus::Processing => println!("⏳ Validation did not complete"),
        FinalStatus::Error => println!("❌ Validation pipeline failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use clap::Parser;
    use forge_core::{Framework, ProjectMetadata, ProjectTree};
    use forge_pipeline::ValidateOptions;

    #[tokio::test]
    async fn test_changed_paths_lists_new_and_modified_files() {
        let original = ProjectTree::from_files([
            ("index.html", "<html><head></head><body></body></html>"),
            ("src/main.js", "export {};\n"),
        ]);
        let coordinator = ValidationCoordinator::standard().unwrap();

        let run = coordinator
            .validate(
                original.clone(),
                ProjectMetadata::new("app", Framework::Vanilla),
                &ValidateOptions::default(),
            )
            .await;
        let changed = changed_paths(&original, &run);

        assert!(changed.contains(&"index.html"));
        assert!(changed.contains(&"public/manifest.json"));
        assert!(!changed.contains(&"src/main.js"));
    }

    #[tokio::test]
    async fn test_execute_writes_remediated_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("index.html"),
            "<html><head><title>x</title></head><body></body></html>",
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "forge",
            "validate",
            dir.path().to_str().unwrap(),
            "--framework",
            "vanilla",
            "--write",
        ])
        .unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };

        execute(args).await.unwrap();

        assert!(dir.path().join("public/manifest.json").exists());
        assert!(dir.path().join(".gitignore").exists());
        let html = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert!(html.contains("rel=\"manifest\""));
    }
}

//! Detect command - report findings without changing the project.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use forge_core::{Finding, Severity};
use forge_policy::IssueDetector;
use tracing::info;

use super::{OutputFormat, ProjectArgs};
use crate::ExitCodes;

#[derive(Args)]
pub struct DetectArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub async fn execute(args: DetectArgs) -> Result<u8> {
    let tree = args.project.load_tree()?;
    let metadata = args.project.metadata(&tree);
    let config = args.project.load_config()?;
    let catalog = config
        .build_catalog(args.project.config_base(), &args.project.rule_packs)
        .context("Failed to build the rule catalog")?;

    info!("Detecting issues in {} ({})", args.project.path.display(), metadata.framework);
    let detector = IssueDetector::new(Arc::new(catalog)).with_concurrency(config.validation.max_detect_concurrency);
    let findings = detector.detect(&tree, &metadata)?;

    match args.format {
        OutputFormat::Text => print_findings(&findings),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&findings)?),
    }

    if findings.iter().any(Finding::is_error) {
        Ok(ExitCodes::NEEDS_ATTENTION)
    } else {
        Ok(ExitCodes::SUCCESS)
    }
}

fn print_findings(findings: &[Finding]) {
    if findings.is_empty() {
        println!("✅ No issues found");
        return;
    }

    for finding in findings {
        let icon = match finding.severity {
            Severity::Error => "❌",
            Severity::Warning => "⚠️ ",
        };
        let location = match finding.line {
            Some(line) => format!("{}:{}", finding.file, line),
            None => finding.file.clone(),
        };
        let fixable = if finding.auto_fixable { " (auto-fixable)" } else { "" };
        println!("{} {} [{}] {}{}", icon, location, finding.kind, finding.message, fixable);
    }

    let errors = findings.iter().filter(|f| f.is_error()).count();
    println!("\n{} errors, {} warnings", errors, findings.len() - errors);
}

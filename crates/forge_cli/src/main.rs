//! PWA Forge CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Ready to use
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Needs attention
//! - 4: Pipeline error

use std::process::ExitCode;

use clap::Parser;
use forge_core::{CoreError, FinalStatus};
use forge_pipeline::PipelineError;
use forge_policy::PolicyError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const NEEDS_ATTENTION: u8 = 3;
    pub const PIPELINE_ERROR: u8 = 4;

    /// Exit code for the terminal status of a run.
    pub fn for_status(status: FinalStatus) -> u8 {
        match status {
            FinalStatus::ReadyToUse => Self::SUCCESS,
            FinalStatus::NeedsAttention => Self::NEEDS_ATTENTION,
            FinalStatus::Processing | FinalStatus::Error => Self::PIPELINE_ERROR,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Detect(args) => commands::detect::execute(args).await,
        Commands::Catalog(args) => commands::catalog::execute(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "forge=debug,info"
    } else if quiet {
        "warn"
    } else {
        "forge=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Logs go to stderr so JSON output on stdout stays parseable.
    // A subscriber installed earlier (tests) wins.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(PipelineError::Config(_)) = cause.downcast_ref::<PipelineError>() {
            return ExitCodes::INVALID_ARGS;
        }
        if let Some(CoreError::ProjectNotFound(_)) = cause.downcast_ref::<CoreError>() {
            return ExitCodes::INVALID_ARGS;
        }
        if let Some(PolicyError::InvalidRulePack(_)) = cause.downcast_ref::<PolicyError>() {
            return ExitCodes::INVALID_ARGS;
        }
    }
    ExitCodes::GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_exit_codes() {
        assert_eq!(ExitCodes::for_status(FinalStatus::ReadyToUse), 0);
        assert_eq!(ExitCodes::for_status(FinalStatus::NeedsAttention), 3);
        assert_eq!(ExitCodes::for_status(FinalStatus::Error), 4);
    }

    #[test]
    fn test_categorize_error() {
        let missing = anyhow::Error::new(CoreError::ProjectNotFound(PathBuf::from("nope")))
            .context("Failed to load project");
        assert_eq!(categorize_error(&missing), ExitCodes::INVALID_ARGS);

        let other = anyhow::anyhow!("disk on fire");
        assert_eq!(categorize_error(&other), ExitCodes::GENERAL_ERROR);
    }
}

//! Command runner trait and types.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};

/// Result of a command run to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub command: String,
    /// Exit code; -1 when the process was killed by a signal
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Check if execution was successful (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// When a long-running service counts as up.
#[derive(Debug, Clone)]
pub struct Readiness {
    pattern: Regex,
    grace: Duration,
}

impl Readiness {
    pub fn new(pattern: &str, grace: Duration) -> RunnerResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| RunnerError::InvalidPattern(e.to_string()))?;
        Ok(Self { pattern, grace })
    }

    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    /// A service still running after this long is considered ready.
    pub fn grace(&self) -> Duration {
        self.grace
    }
}

/// Outcome of starting a service and waiting for readiness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOutcome {
    pub command: String,
    pub ready: bool,
    /// Set when the service exited on its own before becoming ready
    pub exit_code: Option<i64>,
    /// Output lines seen before the service was stopped
    pub output: Vec<String>,
    pub duration_ms: u64,
}

/// Output lines of a running command, readable while it runs.
///
/// Clones share the same buffer, so a caller that abandons a call (on a
/// timeout, say) still sees everything printed up to that point.
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        self.lines.lock().push(line.into());
    }

    /// Snapshot of the lines so far, stdout and stderr interleaved.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

/// Runs shell commands in a working directory.
///
/// Dropping a pending call must stop the command and everything it started.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Run a command to completion, appending its output lines to `log`.
    async fn run_logged(&self, command: &str, workdir: &Path, log: &OutputLog) -> RunnerResult<ExecutionResult>;

    /// Start a service, wait until it is ready or exits, then stop it.
    /// Output lines are appended to `log` as they arrive.
    async fn start_service_logged(
        &self,
        command: &str,
        workdir: &Path,
        readiness: &Readiness,
        log: &OutputLog,
    ) -> RunnerResult<ServiceOutcome>;

    /// Run a command to completion.
    async fn run(&self, command: &str, workdir: &Path) -> RunnerResult<ExecutionResult> {
        self.run_logged(command, workdir, &OutputLog::new()).await
    }

    async fn start_service(
        &self,
        command: &str,
        workdir: &Path,
        readiness: &Readiness,
    ) -> RunnerResult<ServiceOutcome> {
        self.start_service_logged(command, workdir, readiness, &OutputLog::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output() {
        let now = Utc::now();
        let mut result = ExecutionResult {
            command: "npm run build".to_string(),
            exit_code: 0,
            stdout: "built".to_string(),
            stderr: String::new(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        };
        assert_eq!(result.combined_output(), "built");

        result.stderr = "warn".to_string();
        assert_eq!(result.combined_output(), "built\nwarn");
        assert!(result.success());
    }

    #[test]
    fn test_readiness_pattern() {
        let readiness = Readiness::new(r"ready in \d+", Duration::from_millis(10)).unwrap();
        assert!(readiness.matches("  VITE v5.0.0  ready in 312 ms"));
        assert!(!readiness.matches("building..."));

        assert!(matches!(
            Readiness::new("(", Duration::ZERO),
            Err(RunnerError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_output_log_clones_share_lines() {
        let log = OutputLog::new();
        let writer = log.clone();

        writer.push("npm WARN deprecated glob@7");
        writer.push("building...");

        assert_eq!(log.len(), 2);
        assert_eq!(log.lines(), vec!["npm WARN deprecated glob@7", "building..."]);
    }
}

//! Build verification: install, build, then dev-server.
//!
//! The tree is written to a working directory and the three stages run in
//! order. A stage only runs if the previous one passed; the rest are
//! reported as skipped. Stage failures and runner errors end up in
//! `BuildTestResult::errors`. Only materialization errors are returned as
//! `Err`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use forge_core::{BuildStage, BuildTestResult, ProjectTree, StageReport, StageStatus};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{BuildCommands, VerifierConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, OutputLog, Readiness};

/// What one stage produced.
struct StageRun {
    status: StageStatus,
    exit_code: Option<i64>,
    output: Vec<String>,
    error: Option<String>,
}

/// Verifies that a project tree installs, builds and serves.
pub struct BuildVerifier {
    runner: Arc<dyn CommandRunner>,
    config: VerifierConfig,
    readiness: Readiness,
    warning_patterns: Vec<Regex>,
}

impl std::fmt::Debug for BuildVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildVerifier")
            .field("runner", &self.runner.name())
            .field("config", &self.config)
            .finish()
    }
}

impl BuildVerifier {
    /// Create a verifier; fails if a configured pattern is not a valid regex.
    pub fn new(runner: Arc<dyn CommandRunner>, config: VerifierConfig) -> RunnerResult<Self> {
        let readiness = Readiness::new(
            &config.readiness_pattern,
            Duration::from_millis(config.grace_period_ms),
        )?;
        let warning_patterns = config
            .warning_patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| RunnerError::InvalidPattern(e.to_string())))
            .collect::<RunnerResult<Vec<_>>>()?;

        Ok(Self {
            runner,
            config,
            readiness,
            warning_patterns,
        })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify `tree`. `timeout` bounds the whole call; `None` means no limit.
    pub async fn verify(&self, tree: &ProjectTree, timeout: Option<Duration>) -> RunnerResult<BuildTestResult> {
        let start = Instant::now();
        let deadline = timeout.map(|t| start + t);

        // Keep the temp dir alive until every stage has run.
        let (_temp, workdir) = self.materialize(tree)?;
        let commands = self.config.commands_for(tree);
        info!("Verifying build in {} with {}", workdir.display(), self.runner.name());

        let mut result = BuildTestResult::default();
        let mut blocked = false;

        for stage in BuildStage::all() {
            if blocked {
                result.stages.push(StageReport::skipped(stage));
                continue;
            }

            let stage_start = Instant::now();
            let run = self.run_stage_bounded(stage, &commands, &workdir, deadline, timeout).await;
            let duration_ms = stage_start.elapsed().as_millis() as u64;

            self.collect_warnings(&run.output, &mut result.warnings);
            if let Some(error) = run.error {
                warn!("{}", error);
                result.errors.push(error);
            }

            let passed = run.status == StageStatus::Passed;
            match stage {
                BuildStage::Install => result.install_success = passed,
                BuildStage::Build => result.build_success = passed,
                BuildStage::DevServer => result.dev_server_success = passed,
            }
            result.stages.push(StageReport {
                stage,
                status: run.status,
                duration_ms,
                exit_code: run.exit_code,
            });
            debug!("Stage {} finished: {:?} in {}ms", stage, run.status, duration_ms);
            blocked = !passed;
        }

        result.time_taken_ms = start.elapsed().as_millis() as u64;
        info!(
            "Build verification finished in {}ms (install: {}, build: {}, dev-server: {})",
            result.time_taken_ms, result.install_success, result.build_success, result.dev_server_success
        );
        Ok(result)
    }

    fn materialize(&self, tree: &ProjectTree) -> RunnerResult<(Option<tempfile::TempDir>, PathBuf)> {
        match &self.config.workdir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                tree.write_to(dir)?;
                Ok((None, dir.clone()))
            }
            None => {
                let temp = tempfile::Builder::new().prefix("forge-build-").tempdir()?;
                tree.write_to(temp.path())?;
                let path = temp.path().to_path_buf();
                Ok((Some(temp), path))
            }
        }
    }

    async fn run_stage_bounded(
        &self,
        stage: BuildStage,
        commands: &BuildCommands,
        workdir: &Path,
        deadline: Option<Instant>,
        timeout: Option<Duration>,
    ) -> StageRun {
        let log = OutputLog::new();
        let Some(deadline) = deadline else {
            return self.run_stage(stage, commands.command(stage), workdir, &log).await;
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let limit_ms = timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
        match tokio::time::timeout(remaining, self.run_stage(stage, commands.command(stage), workdir, &log)).await {
            Ok(run) => run,
            Err(_) => StageRun {
                status: StageStatus::TimedOut,
                exit_code: None,
                output: log.lines(),
                error: Some(format!("{} timed out after {}ms", stage, limit_ms)),
            },
        }
    }

    async fn run_stage(&self, stage: BuildStage, command: &str, workdir: &Path, log: &OutputLog) -> StageRun {
        debug!("Stage {}: {}", stage, command);

        if stage == BuildStage::DevServer {
            return match self
                .runner
                .start_service_logged(command, workdir, &self.readiness, log)
                .await
            {
                Ok(outcome) if outcome.ready => StageRun {
                    status: StageStatus::Passed,
                    exit_code: None,
                    output: outcome.output,
                    error: None,
                },
                Ok(outcome) => {
                    let exit_code = outcome.exit_code.unwrap_or(-1);
                    let error = self.failure_message(stage, exit_code, &outcome.output);
                    StageRun {
                        status: StageStatus::Failed,
                        exit_code: Some(exit_code),
                        output: outcome.output,
                        error: Some(error),
                    }
                }
                Err(e) => Self::runner_error(stage, e, log),
            };
        }

        match self.runner.run_logged(command, workdir, log).await {
            Ok(execution) => {
                let output: Vec<String> = execution
                    .combined_output()
                    .lines()
                    .map(str::to_string)
                    .collect();
                if execution.success() {
                    StageRun {
                        status: StageStatus::Passed,
                        exit_code: Some(0),
                        output,
                        error: None,
                    }
                } else {
                    let error = self.failure_message(stage, execution.exit_code, &output);
                    StageRun {
                        status: StageStatus::Failed,
                        exit_code: Some(execution.exit_code),
                        output,
                        error: Some(error),
                    }
                }
            }
            Err(e) => Self::runner_error(stage, e, log),
        }
    }

    fn runner_error(stage: BuildStage, error: RunnerError, log: &OutputLog) -> StageRun {
        StageRun {
            status: StageStatus::Failed,
            exit_code: None,
            output: log.lines(),
            error: Some(format!("{} failed: {}", stage, error)),
        }
    }

    /// `"<stage> failed (exit N): <tail>"`.
    fn failure_message(&self, stage: BuildStage, exit_code: i64, output: &[String]) -> String {
        let lines: Vec<&str> = output
            .iter()
            .map(|l| l.trim_end())
            .filter(|l| !l.trim().is_empty())
            .collect();
        let tail_start = lines.len().saturating_sub(self.config.tail_lines.max(1));
        let tail = lines[tail_start..].join("\n");
        let tail = if tail.is_empty() { "no output" } else { tail.as_str() };
        format!("{} failed (exit {}): {}", stage, exit_code, tail)
    }

    fn collect_warnings(&self, output: &[String], warnings: &mut Vec<String>) {
        for line in output {
            let line = line.trim();
            if line.is_empty() || !self.warning_patterns.iter().any(|p| p.is_match(line)) {
                continue;
            }
            if !warnings.iter().any(|w| w == line) {
                warnings.push(line.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockResponse, MockRunner};

    fn tree() -> ProjectTree {
        ProjectTree::from_files([("package.json", r#"{"name":"app"}"#)])
    }

    fn verifier(runner: &MockRunner) -> BuildVerifier {
        BuildVerifier::new(Arc::new(runner.clone()), VerifierConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_all_stages_pass() {
        let runner = MockRunner::new();

        let result = verifier(&runner).verify(&tree(), None).await.unwrap();

        assert!(result.install_success && result.build_success && result.dev_server_success);
        assert!(result.errors.is_empty());
        assert_eq!(runner.commands(), vec!["npm install", "npm run build", "npm run dev"]);
        assert!(result.stages.iter().all(|s| s.passed()));
    }

    #[tokio::test]
    async fn test_build_failure_skips_dev_server() {
        let runner = MockRunner::new().respond_to(
            "run build",
            MockResponse::failure(2, "src/main.ts(3,1): error TS2304\nbuild aborted"),
        );

        let result = verifier(&runner).verify(&tree(), None).await.unwrap();

        assert!(result.install_success);
        assert!(!result.build_success);
        assert!(!result.dev_server_success);
        assert_eq!(
            result.errors,
            vec!["build failed (exit 2): src/main.ts(3,1): error TS2304\nbuild aborted"]
        );
        assert_eq!(result.stage(BuildStage::DevServer).unwrap().status, StageStatus::Skipped);
        assert!(!runner.was_called_with("run dev"));
    }

    #[tokio::test]
    async fn test_failure_message_keeps_output_tail() {
        let noisy: String = (1..=30).map(|i| format!("line {}\n", i)).collect();
        let runner = MockRunner::new().respond_to("install", MockResponse::failure(1, noisy));

        let result = verifier(&runner).verify(&tree(), None).await.unwrap();

        let error = &result.errors[0];
        assert!(error.starts_with("install failed (exit 1): line 21\n"));
        assert!(error.ends_with("line 30"));
        assert!(!error.contains("line 20\n"));
    }

    #[tokio::test]
    async fn test_warnings_are_captured_once() {
        let runner = MockRunner::new()
            .respond_to("install", MockResponse::success("npm WARN deprecated inflight@1.0.6\nadded 3 packages"))
            .respond_to("run build", MockResponse::success("npm WARN deprecated inflight@1.0.6\n(!) Some chunks are larger than 500 kB"));

        let result = verifier(&runner).verify(&tree(), None).await.unwrap();

        assert_eq!(result.warnings, vec!["npm WARN deprecated inflight@1.0.6"]);
    }

    #[tokio::test]
    async fn test_spawn_error_is_a_stage_failure() {
        let runner = MockRunner::new().respond_to("install", MockResponse::spawn_error("npm: not found"));

        let result = verifier(&runner).verify(&tree(), None).await.unwrap();

        assert!(!result.install_success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("install failed: Failed to spawn"));
        assert_eq!(result.stage(BuildStage::Build).unwrap().status, StageStatus::Skipped);
    }

    #[tokio::test]
    async fn test_dev_server_not_ready() {
        let runner = MockRunner::new().respond_to("run dev", MockResponse::failure(1, "Error: port 5173 in use"));

        let result = verifier(&runner).verify(&tree(), None).await.unwrap();

        assert!(result.success());
        assert!(!result.dev_server_success);
        assert_eq!(result.errors, vec!["dev-server failed (exit 1): Error: port 5173 in use"]);
    }

    #[tokio::test]
    async fn test_timeout_is_recorded() {
        let runner = MockRunner::new().respond_to("run build", MockResponse::hang());

        let result = verifier(&runner)
            .verify(&tree(), Some(Duration::from_millis(100)))
            .await
            .unwrap();

        assert!(result.install_success);
        assert!(!result.build_success);
        assert_eq!(result.stage(BuildStage::Build).unwrap().status, StageStatus::TimedOut);
        assert_eq!(result.stage(BuildStage::DevServer).unwrap().status, StageStatus::Skipped);
        assert_eq!(result.errors, vec!["build timed out after 100ms"]);
        assert!(result.time_taken_ms >= 100);
    }

    #[tokio::test]
    async fn test_timed_out_stage_keeps_its_output() {
        let runner = MockRunner::new().respond_to(
            "run build",
            MockResponse::hang().with_stdout("npm WARN deprecated rimraf@3.0.2\nvite v5.0.0 building for production..."),
        );

        let result = verifier(&runner)
            .verify(&tree(), Some(Duration::from_millis(100)))
            .await
            .unwrap();

        assert_eq!(result.stage(BuildStage::Build).unwrap().status, StageStatus::TimedOut);
        assert_eq!(result.warnings, vec!["npm WARN deprecated rimraf@3.0.2"]);
        assert_eq!(result.errors, vec!["build timed out after 100ms"]);
    }

    #[tokio::test]
    async fn test_configured_workdir_receives_tree() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("build");
        let runner = MockRunner::new();
        let config = VerifierConfig::new().with_workdir(&workdir);
        let verifier = BuildVerifier::new(Arc::new(runner.clone()), config).unwrap();

        verifier.verify(&tree(), None).await.unwrap();

        assert!(workdir.join("package.json").exists());
        assert_eq!(runner.get_calls()[0].workdir, workdir.display().to_string());
    }

    #[test]
    fn test_invalid_warning_pattern_is_rejected() {
        let mut config = VerifierConfig::default();
        config.warning_patterns.push("[".to_string());

        let result = BuildVerifier::new(Arc::new(MockRunner::new()), config);

        assert!(matches!(result, Err(RunnerError::InvalidPattern(_))));
    }
}

//! Mock command runner for testing.
//!
//! Responses are scripted either per command (matched by substring) or as a
//! sequential queue, and every call is captured for later assertions.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult, OutputLog, Readiness, ServiceOutcome};

/// What a scripted call does besides returning output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    Complete,
    /// Never returns; only a timeout ends the call
    Hang,
    Panic(String),
    SpawnError(String),
}

/// Predefined mock response for a command.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    /// Real time spent before the response is returned
    pub delay_ms: u64,
    pub behavior: MockBehavior,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            delay_ms: 0,
            behavior: MockBehavior::Complete,
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            delay_ms: 0,
            behavior: MockBehavior::Complete,
        }
    }

    pub fn hang() -> Self {
        Self::success("").with_behavior(MockBehavior::Hang)
    }

    pub fn panic(message: impl Into<String>) -> Self {
        Self::success("").with_behavior(MockBehavior::Panic(message.into()))
    }

    pub fn spawn_error(message: impl Into<String>) -> Self {
        Self::success("").with_behavior(MockBehavior::SpawnError(message.into()))
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    pub command: String,
    pub workdir: String,
}

/// Mock command runner for testing.
#[derive(Clone, Default)]
pub struct MockRunner {
    /// Responses keyed by a command substring, checked in insertion order.
    scripted: Arc<RwLock<Vec<(String, MockResponse)>>>,
    /// Fallback responses, returned round-robin.
    responses: Arc<RwLock<Vec<MockResponse>>>,
    response_index: Arc<AtomicUsize>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to any command containing `fragment`.
    pub fn respond_to(self, fragment: impl Into<String>, response: MockResponse) -> Self {
        self.scripted.write().push((fragment.into(), response));
        self
    }

    /// Add a response for the next unscripted call.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Commands run so far, in call order.
    pub fn commands(&self) -> Vec<String> {
        self.captured_calls.read().iter().map(|c| c.command.clone()).collect()
    }

    pub fn was_called_with(&self, fragment: &str) -> bool {
        self.captured_calls
            .read()
            .iter()
            .any(|c| c.command.contains(fragment))
    }

    fn record_call(&self, method: &str, command: &str, workdir: &Path) {
        self.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            command: command.to_string(),
            workdir: workdir.display().to_string(),
        });
    }

    fn response_for(&self, command: &str) -> MockResponse {
        if let Some((_, response)) = self
            .scripted
            .read()
            .iter()
            .find(|(fragment, _)| command.contains(fragment.as_str()))
        {
            return response.clone();
        }

        let responses = self.responses.read();
        if responses.is_empty() {
            return MockResponse::success("");
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses
            .get(index % responses.len())
            .cloned()
            .unwrap_or_else(|| MockResponse::success(""))
    }

    /// Log the scripted output, then sleep, hang, panic or fail as scripted.
    ///
    /// Output is logged up front so callers that give up on a slow or hung
    /// call still see it.
    async fn play(&self, response: &MockResponse, log: &OutputLog) -> RunnerResult<()> {
        for line in response.stdout.lines().chain(response.stderr.lines()) {
            log.push(line);
        }
        if response.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(response.delay_ms)).await;
        }
        match &response.behavior {
            MockBehavior::Complete => Ok(()),
            MockBehavior::Hang => std::future::pending().await,
            MockBehavior::Panic(message) => panic!("{}", message),
            MockBehavior::SpawnError(message) => Err(RunnerError::SpawnFailed {
                command: "mock".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message.clone()),
            }),
        }
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run_logged(&self, command: &str, workdir: &Path, log: &OutputLog) -> RunnerResult<ExecutionResult> {
        self.record_call("run", command, workdir);
        let response = self.response_for(command);
        let started_at = Utc::now();
        self.play(&response, log).await?;

        Ok(ExecutionResult {
            command: command.to_string(),
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
            started_at,
            finished_at: Utc::now(),
            duration_ms: response.delay_ms,
        })
    }

    async fn start_service_logged(
        &self,
        command: &str,
        workdir: &Path,
        _readiness: &Readiness,
        log: &OutputLog,
    ) -> RunnerResult<ServiceOutcome> {
        self.record_call("start_service", command, workdir);
        let response = self.response_for(command);
        self.play(&response, log).await?;

        let ready = response.exit_code == 0;
        let output = response
            .stdout
            .lines()
            .chain(response.stderr.lines())
            .map(str::to_string)
            .collect();

        Ok(ServiceOutcome {
            command: command.to_string(),
            ready,
            exit_code: (!ready).then_some(response.exit_code),
            output,
            duration_ms: response.delay_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_runner_scripted_by_command() {
        let runner = MockRunner::new()
            .respond_to("install", MockResponse::success("added 120 packages"))
            .respond_to("build", MockResponse::failure(2, "error TS2304"));

        let install = runner.run("npm install", Path::new("/app")).await.unwrap();
        let build = runner.run("npm run build", Path::new("/app")).await.unwrap();

        assert!(install.success());
        assert_eq!(build.exit_code, 2);
        assert_eq!(build.stderr, "error TS2304");
        assert_eq!(runner.commands(), vec!["npm install", "npm run build"]);
    }

    #[tokio::test]
    async fn test_mock_runner_captures_calls() {
        let runner = MockRunner::new();
        let readiness = Readiness::new("ready", Duration::ZERO).unwrap();

        runner.run("npm install", Path::new("/work")).await.unwrap();
        let service = runner
            .start_service("npm run dev", Path::new("/work"), &readiness)
            .await
            .unwrap();

        assert!(service.ready);
        let calls = runner.get_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].method, "start_service");
        assert_eq!(calls[1].workdir, "/work");
    }

    #[tokio::test]
    async fn test_mock_runner_queue_round_robin() {
        let runner = MockRunner::new()
            .add_response(MockResponse::success("one"))
            .add_response(MockResponse::success("two"));

        let mut outputs = Vec::new();
        for _ in 0..3 {
            outputs.push(runner.run("x", Path::new(".")).await.unwrap().stdout);
        }

        assert_eq!(outputs, vec!["one", "two", "one"]);
    }

    #[tokio::test]
    async fn test_mock_runner_spawn_error() {
        let runner = MockRunner::new().respond_to("npm", MockResponse::spawn_error("npm not found"));

        let result = runner.run("npm install", Path::new(".")).await;

        assert!(matches!(result, Err(RunnerError::SpawnFailed { .. })));
    }

    #[tokio::test]
    async fn test_hung_call_leaves_output_in_log() {
        let runner = MockRunner::new().respond_to("build", MockResponse::hang().with_stdout("vite v5.0.0 building"));
        let log = OutputLog::new();

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            runner.run_logged("npm run build", Path::new("."), &log),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(log.lines(), vec!["vite v5.0.0 building"]);
    }
}

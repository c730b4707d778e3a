//! Shell-based command runner.
//!
//! Commands run through `sh -c` (`cmd /C` on Windows) with piped output.
//! On unix every command leads its own process group, and the group is
//! killed when the call ends or is dropped (for instance when an outer
//! `tokio::time::timeout` expires), so package manager and dev server
//! descendants never outlive their stage.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult, OutputLog, Readiness, ServiceOutcome};

/// Runner that executes commands on the host shell.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    dry_run: bool,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log commands instead of executing them; every command succeeds.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn shell_command(command: &str, workdir: &Path) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            cmd
        };
        cmd.arg(command)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    fn spawn(command: &str, workdir: &Path) -> RunnerResult<(Child, ProcessGroup, ChildStdout, ChildStderr)> {
        let mut child = Self::shell_command(command, workdir)
            .spawn()
            .map_err(|source| RunnerError::SpawnFailed {
                command: command.to_string(),
                source,
            })?;
        let group = ProcessGroup::of(&child);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stderr was not captured".to_string()))?;
        Ok((child, group, stdout, stderr))
    }
}

/// The process group led by a spawned command. Dropping it kills the group.
struct ProcessGroup {
    id: Option<u32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self { id: child.id() }
    }

    fn kill(&mut self) {
        if let Some(id) = self.id.take() {
            kill_group(id);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(id: u32) {
    let Ok(pgid) = libc::pid_t::try_from(id) else {
        return;
    };
    // SAFETY: killpg takes plain integers and only sends a signal.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!("Process group {} already exited", pgid);
    }
}

// Windows has no process groups here; `kill_on_drop` stops the direct child.
#[cfg(not(unix))]
fn kill_group(_id: u32) {}

/// Read `reader` to the end, logging each line; returns the joined text.
async fn collect_lines<R: AsyncRead + Unpin>(reader: R, log: OutputLog) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut text = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&line);
        log.push(line);
    }
    text
}

/// Forward lines to both the log and a channel until the stream closes.
fn forward_lines<R>(reader: R, log: OutputLog, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            log.push(line.clone());
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

enum ServiceState {
    Ready,
    Exited(Option<i32>),
}

#[async_trait]
impl CommandRunner for ShellRunner {
    fn name(&self) -> &str {
        "shell"
    }

    async fn run_logged(&self, command: &str, workdir: &Path, log: &OutputLog) -> RunnerResult<ExecutionResult> {
        let started_at = Utc::now();
        let start = Instant::now();

        if self.dry_run {
            info!("[DRY-RUN] {} (in {})", command, workdir.display());
            return Ok(ExecutionResult {
                command: command.to_string(),
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                started_at,
                finished_at: Utc::now(),
                duration_ms: 0,
            });
        }

        debug!("Running: {}", command);
        let (mut child, _group, stdout, stderr) = Self::spawn(command, workdir)?;

        let (status, stdout, stderr) = tokio::join!(
            child.wait(),
            collect_lines(stdout, log.clone()),
            collect_lines(stderr, log.clone()),
        );
        let status = status.map_err(|e| RunnerError::ExecutionFailed(format!("waiting for '{}': {}", command, e)))?;

        let exit_code = status.code().map(i64::from).unwrap_or(-1);
        if exit_code != 0 {
            debug!("{} exited with {}", command, exit_code);
        }

        Ok(ExecutionResult {
            command: command.to_string(),
            exit_code,
            stdout,
            stderr,
            started_at,
            finished_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn start_service_logged(
        &self,
        command: &str,
        workdir: &Path,
        readiness: &Readiness,
        log: &OutputLog,
    ) -> RunnerResult<ServiceOutcome> {
        let start = Instant::now();

        if self.dry_run {
            info!("[DRY-RUN] {} (service, in {})", command, workdir.display());
            return Ok(ServiceOutcome {
                command: command.to_string(),
                ready: true,
                exit_code: None,
                output: Vec::new(),
                duration_ms: 0,
            });
        }

        debug!("Starting service: {}", command);
        let (mut child, mut group, stdout, stderr) = Self::spawn(command, workdir)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        forward_lines(stdout, log.clone(), tx.clone());
        forward_lines(stderr, log.clone(), tx);

        let grace = tokio::time::sleep(readiness.grace());
        tokio::pin!(grace);

        let mut output = Vec::new();
        let state = loop {
            tokio::select! {
                line = rx.recv() => match line {
                    Some(line) => {
                        let hit = readiness.matches(&line);
                        output.push(line);
                        if hit {
                            break ServiceState::Ready;
                        }
                    }
                    None => {
                        // Both streams closed; the service is exiting.
                        tokio::select! {
                            status = child.wait() => {
                                break ServiceState::Exited(status.ok().and_then(|s| s.code()));
                            }
                            _ = &mut grace => break ServiceState::Ready,
                        }
                    }
                },
                _ = &mut grace => break ServiceState::Ready,
            }
        };

        let (ready, exit_code) = match state {
            ServiceState::Ready => {
                group.kill();
                let _ = child.wait().await;
                (true, None)
            }
            ServiceState::Exited(code) => (false, Some(code.map(i64::from).unwrap_or(-1))),
        };

        Ok(ServiceOutcome {
            command: command.to_string(),
            ready,
            exit_code,
            output,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

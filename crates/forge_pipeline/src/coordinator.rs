//! Validation coordinator.
//!
//! Runs prevention, detection, auto-fix and final verification strictly in
//! order and aggregates a [`ValidationResult`]. CPU-bound phases run on the
//! blocking pool; a phase that errors or panics is caught at its join and
//! ends the run in the `error` state with everything collected so far.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use forge_core::{
    Aggregation, BuildTestResult, Finding, Phase, PhaseEvent, PhaseEventKind, PhaseTiming, ProjectMetadata,
    ProjectTree, RunState, ValidationResult,
};
use forge_policy::{
    AutoFixEngine, FixFailure, IssueCatalog, IssueDetector, PreventionReport, PreventionScanner, RemediationOutcome,
};
use forge_runner::{BuildVerifier, CommandRunner};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::config::{ForgeConfig, ValidateOptions};
use crate::error::{PipelineError, PipelineResult};

/// Receives phase events as they happen.
pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &PhaseEvent);
}

impl RunObserver for mpsc::UnboundedSender<PhaseEvent> {
    fn on_event(&self, event: &PhaseEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.send(event.clone());
    }
}

struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_event(&self, _event: &PhaseEvent) {}
}

/// A finished (or stopped) validation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRun {
    pub run_id: Uuid,
    pub state: RunState,
    pub result: ValidationResult,
    /// The tree after prevention and remediation
    #[serde(skip)]
    pub tree: ProjectTree,
    pub phases: Vec<PhaseTiming>,
    pub prevention: PreventionReport,
    pub fix_failures: Vec<FixFailure>,
}

impl ValidationRun {
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Complete
    }
}

/// A validation run executing on the runtime.
#[derive(Debug)]
pub struct ValidationHandle {
    pub run_id: Uuid,
    events: Option<mpsc::UnboundedReceiver<PhaseEvent>>,
    cancel: CancelToken,
    join: JoinHandle<ValidationRun>,
}

impl ValidationHandle {
    /// Take the phase event stream. Returns `None` on the second call.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<PhaseEvent>> {
        self.events.take()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stop the run at the next phase boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) -> PipelineResult<ValidationRun> {
        self.join
            .await
            .map_err(|e| PipelineError::RunAborted(e.to_string()))
    }
}

/// Everything a run has produced so far.
struct Progress {
    run_id: Uuid,
    tree: ProjectTree,
    phases: Vec<PhaseTiming>,
    prevention: PreventionReport,
    detected: Option<Vec<Finding>>,
    outcome: Option<RemediationOutcome>,
    build_test: Option<BuildTestResult>,
}

impl Progress {
    fn new(run_id: Uuid, tree: ProjectTree) -> Self {
        Self {
            run_id,
            tree,
            phases: Vec::new(),
            prevention: PreventionReport::default(),
            detected: None,
            outcome: None,
            build_test: None,
        }
    }

    fn finish(self, state: RunState, fault: Option<String>) -> ValidationRun {
        let detected = self.detected.as_ref().map_or(0, Vec::len);
        let (remaining, applied_fixes, attempted, fix_failures) = match self.outcome {
            Some(outcome) => (outcome.remaining, outcome.applied_fixes, outcome.attempted, outcome.failures),
            None => (self.detected.unwrap_or_default(), Vec::new(), 0, Vec::new()),
        };

        let result = ValidationResult::aggregate(
            self.run_id,
            Aggregation {
                remaining,
                applied_fixes,
                prevented: self.prevention.count(),
                detected,
                attempted,
                build_test: self.build_test,
            },
        );
        let result = match (state, fault) {
            (RunState::Error, Some(fault)) => result.with_fault(fault),
            (RunState::Error, None) => result.with_fault("unknown fault"),
            (RunState::Cancelled, _) => result.into_partial(),
            _ => result,
        };

        ValidationRun {
            run_id: self.run_id,
            state,
            result,
            tree: self.tree,
            phases: self.phases,
            prevention: self.prevention,
            fix_failures,
        }
    }

    fn fault(self, error: PipelineError) -> ValidationRun {
        error!("Validation run {} failed: {}", self.run_id, error);
        self.finish(RunState::Error, Some(error.to_string()))
    }

    fn cancelled(self, next: Phase) -> ValidationRun {
        info!("Validation run {} cancelled before {}", self.run_id, next);
        self.finish(RunState::Cancelled, None)
    }
}

/// An auto-fix fault with the tree and outcome of its completed passes.
struct AutoFixFault {
    error: PipelineError,
    partial: Option<(ProjectTree, RemediationOutcome)>,
}

impl From<PipelineError> for AutoFixFault {
    fn from(error: PipelineError) -> Self {
        Self { error, partial: None }
    }
}

/// Orchestrates the validation phases.
#[derive(Clone)]
pub struct ValidationCoordinator {
    catalog: Arc<IssueCatalog>,
    scanner: Arc<PreventionScanner>,
    verifier: Option<Arc<BuildVerifier>>,
}

impl std::fmt::Debug for ValidationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationCoordinator")
            .field("rules", &self.catalog.len())
            .field("prevention", &self.scanner.rule_ids())
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}

impl ValidationCoordinator {
    /// Coordinator with the standard prevention rules and no build verifier.
    pub fn new(catalog: Arc<IssueCatalog>) -> Self {
        Self {
            catalog,
            scanner: Arc::new(PreventionScanner::standard()),
            verifier: None,
        }
    }

    /// Coordinator over the standard catalog.
    pub fn standard() -> PipelineResult<Self> {
        Ok(Self::new(Arc::new(IssueCatalog::standard()?)))
    }

    /// Build a coordinator from `forge.yaml` settings.
    ///
    /// `base` resolves relative rule pack paths; `extra_packs` are added on
    /// top of the configured ones.
    pub fn from_config(
        config: &ForgeConfig,
        base: &Path,
        extra_packs: &[PathBuf],
        runner: Arc<dyn CommandRunner>,
    ) -> PipelineResult<Self> {
        let catalog = config.build_catalog(base, extra_packs)?;
        let verifier = BuildVerifier::new(runner, config.build.clone())?;
        Ok(Self::new(Arc::new(catalog)).with_verifier(verifier))
    }

    pub fn with_scanner(mut self, scanner: PreventionScanner) -> Self {
        self.scanner = Arc::new(scanner);
        self
    }

    pub fn with_verifier(mut self, verifier: BuildVerifier) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    pub fn catalog(&self) -> &Arc<IssueCatalog> {
        &self.catalog
    }

    /// Validate a tree and wait for the result.
    pub async fn validate(
        &self,
        tree: ProjectTree,
        metadata: ProjectMetadata,
        options: &ValidateOptions,
    ) -> ValidationRun {
        self.run(Uuid::new_v4(), tree, metadata, options, &NoopObserver, &CancelToken::new())
            .await
    }

    /// Validate a tree, reporting phase events to `observer`.
    pub async fn validate_observed(
        &self,
        tree: ProjectTree,
        metadata: ProjectMetadata,
        options: &ValidateOptions,
        observer: &dyn RunObserver,
    ) -> ValidationRun {
        self.run(Uuid::new_v4(), tree, metadata, options, observer, &CancelToken::new())
            .await
    }

    /// Start a validation run in the background.
    pub fn spawn(&self, tree: ProjectTree, metadata: ProjectMetadata, options: ValidateOptions) -> ValidationHandle {
        let run_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();

        let coordinator = self.clone();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            coordinator
                .run(run_id, tree, metadata, &options, &tx, &token)
                .await
        });

        ValidationHandle {
            run_id,
            events: Some(rx),
            cancel,
            join,
        }
    }

    /// Run every phase. Faults and cancellation are reported in the run.
    pub async fn run(
        &self,
        run_id: Uuid,
        tree: ProjectTree,
        metadata: ProjectMetadata,
        options: &ValidateOptions,
        observer: &dyn RunObserver,
        cancel: &CancelToken,
    ) -> ValidationRun {
        info!("Starting validation run {} for '{}' ({})", run_id, metadata.name, metadata.framework);
        let mut progress = Progress::new(run_id, tree);
        let metadata = Arc::new(metadata);

        // Prevention
        if cancel.is_cancelled() {
            return progress.cancelled(Phase::Prevention);
        }
        let scanner = self.scanner.clone();
        let mut tree = progress.tree.clone();
        let meta = metadata.clone();
        let phase: PipelineResult<_> = run_phase(run_id, observer, &mut progress.phases, Phase::Prevention, move || {
            tokio::task::spawn_blocking(move || {
                let report = scanner.scan(&mut tree, &meta);
                Ok::<_, PipelineError>((tree, report))
            })
        })
        .await;
        match phase {
            Ok((tree, report)) => {
                info!("Prevention fired {} rules", report.count());
                progress.tree = tree;
                progress.prevention = report;
            }
            Err(e) => return progress.fault(e),
        }

        // Detection
        if cancel.is_cancelled() {
            return progress.cancelled(Phase::Detection);
        }
        let detector = IssueDetector::new(self.catalog.clone()).with_concurrency(options.max_detect_concurrency);
        let tree = progress.tree.clone();
        let meta = metadata.clone();
        let phase_detector = detector.clone();
        let phase: PipelineResult<_> = run_phase(run_id, observer, &mut progress.phases, Phase::Detection, move || {
            tokio::task::spawn_blocking(move || phase_detector.detect(&tree, &meta))
        })
        .await;
        let findings = match phase {
            Ok(findings) => {
                info!("Detected {} findings", findings.len());
                progress.detected = Some(findings.clone());
                findings
            }
            Err(e) => return progress.fault(e),
        };

        // Auto-fix
        if cancel.is_cancelled() {
            return progress.cancelled(Phase::AutoFix);
        }
        let engine = AutoFixEngine::new(self.catalog.clone())
            .with_detector(detector)
            .with_concurrency(options.max_fix_concurrency)
            .with_max_passes(options.max_fix_passes);
        let mut tree = progress.tree.clone();
        let meta = metadata.clone();
        let phase: Result<_, AutoFixFault> = run_phase(run_id, observer, &mut progress.phases, Phase::AutoFix, move || {
            tokio::task::spawn_blocking(move || match engine.remediate(&mut tree, findings, &meta) {
                Ok(outcome) => Ok((tree, outcome)),
                Err(fault) => Err(AutoFixFault {
                    error: fault.error.into(),
                    partial: Some((tree, *fault.partial)),
                }),
            })
        })
        .await;
        match phase {
            Ok((tree, outcome)) => {
                info!(
                    "Applied {} fixes, {} findings remain",
                    outcome.applied_fixes.len(),
                    outcome.remaining.len()
                );
                progress.tree = tree;
                progress.outcome = Some(outcome);
            }
            Err(AutoFixFault { error, partial }) => {
                if let Some((tree, outcome)) = partial {
                    progress.tree = tree;
                    progress.outcome = Some(outcome);
                }
                return progress.fault(error);
            }
        }

        // Final verification
        if cancel.is_cancelled() {
            return progress.cancelled(Phase::Final);
        }
        let verifier = match (&self.verifier, options.run_build_test) {
            (Some(verifier), true) => Some(verifier.clone()),
            (None, true) => {
                warn!("Build test requested but no build verifier is configured; skipping");
                None
            }
            _ => None,
        };
        let tree = progress.tree.clone();
        let timeout = options.timeout();
        let phase: PipelineResult<_> = run_phase(run_id, observer, &mut progress.phases, Phase::Final, move || {
            tokio::spawn(async move {
                match verifier {
                    Some(verifier) => verifier.verify(&tree, timeout).await.map(Some),
                    None => Ok(None),
                }
            })
        })
        .await;
        match phase {
            Ok(build_test) => progress.build_test = build_test,
            Err(e) => return progress.fault(e),
        }

        let run = progress.finish(RunState::Complete, None);
        info!(
            "Validation run {} complete: {}",
            run_id,
            run.result.final_status.as_str()
        );
        run
    }
}

/// Run one phase task, emitting its events and recording its timing.
async fn run_phase<T, E, R, F>(
    run_id: Uuid,
    observer: &dyn RunObserver,
    timings: &mut Vec<PhaseTiming>,
    phase: Phase,
    start_task: F,
) -> Result<T, R>
where
    F: FnOnce() -> JoinHandle<Result<T, E>>,
    E: Into<R>,
    R: From<PipelineError>,
{
    info!("Phase {} started", phase);
    let started_at = Utc::now();
    let start = Instant::now();
    observer.on_event(&PhaseEvent::new(run_id, phase, PhaseEventKind::Started, 0));

    let result = match start_task().await {
        Ok(result) => result.map_err(Into::into),
        Err(e) => Err(join_error(phase, e).into()),
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;
    let kind = if result.is_ok() {
        PhaseEventKind::Completed
    } else {
        PhaseEventKind::Failed
    };
    observer.on_event(&PhaseEvent::new(run_id, phase, kind, elapsed_ms));
    timings.push(PhaseTiming {
        phase,
        started_at,
        duration_ms: elapsed_ms,
        succeeded: result.is_ok(),
    });
    info!("Phase {} finished in {}ms", phase, elapsed_ms);
    result
}

fn join_error(phase: Phase, error: JoinError) -> PipelineError {
    if error.is_panic() {
        let panic = error.into_panic();
        let message = if let Some(s) = panic.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        PipelineError::PhasePanicked { phase, message }
    } else {
        PipelineError::PhaseAborted {
            phase,
            message: error.to_string(),
        }
    }
}

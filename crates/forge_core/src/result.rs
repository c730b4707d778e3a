//! Terminal records of a validation run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::finding::{Finding, Severity};

/// A fix the auto-fix engine applied and confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFix {
    /// Id of the finding this fix retired
    pub finding_id: String,
    pub kind: String,
    pub file: String,
    pub description: String,
    /// Name of the catalog strategy that was applied
    pub strategy: String,
    /// Declared strategy confidence, 0.0..=1.0
    pub confidence: f64,
}

/// Build verification stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStage {
    Install,
    Build,
    DevServer,
}

impl BuildStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStage::Install => "install",
            BuildStage::Build => "build",
            BuildStage::DevServer => "dev-server",
        }
    }

    pub fn all() -> [BuildStage; 3] {
        [BuildStage::Install, BuildStage::Build, BuildStage::DevServer]
    }
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Passed,
    Failed,
    TimedOut,
    /// Not attempted because an earlier stage failed
    Skipped,
}

/// Outcome of one build stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub stage: BuildStage,
    pub status: StageStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
}

impl StageReport {
    pub fn skipped(stage: BuildStage) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            duration_ms: 0,
            exit_code: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == StageStatus::Passed
    }
}

/// Result of install -> build -> dev-server verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTestResult {
    pub install_success: bool,
    pub build_success: bool,
    pub dev_server_success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub time_taken_ms: u64,
    #[serde(default)]
    pub stages: Vec<StageReport>,
}

impl BuildTestResult {
    /// Install and build both passed.
    pub fn success(&self) -> bool {
        self.install_success && self.build_success
    }

    pub fn stage(&self, stage: BuildStage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// Summary status attached to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStatus {
    ReadyToUse,
    NeedsAttention,
    Processing,
    Error,
}

impl FinalStatus {
    /// Status of a run that reached completion.
    pub fn compute(errors: &[Finding], build_test: Option<&BuildTestResult>) -> Self {
        let build_ok = build_test.map_or(true, |b| b.success());
        if errors.is_empty() && build_ok {
            FinalStatus::ReadyToUse
        } else {
            FinalStatus::NeedsAttention
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::ReadyToUse => "READY_TO_USE",
            FinalStatus::NeedsAttention => "NEEDS_ATTENTION",
            FinalStatus::Processing => "PROCESSING",
            FinalStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metrics every consumer of a run reports the same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// Findings reported by the first detection pass
    pub detected_count: usize,
    /// Findings the auto-fix engine attempted
    pub attempted_count: usize,
    pub auto_fixed_count: usize,
    pub remaining_errors: usize,
    pub remaining_warnings: usize,
    /// fixed / attempted; 1.0 when nothing was attempted
    pub fix_success_rate: f64,
    /// Mean confidence of applied fixes; 0.0 when none
    pub average_confidence: f64,
}

/// Inputs to the terminal aggregation.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub remaining: Vec<Finding>,
    pub applied_fixes: Vec<AppliedFix>,
    pub prevented: usize,
    pub detected: usize,
    pub attempted: usize,
    pub build_test: Option<BuildTestResult>,
}

/// The terminal record of a validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub run_id: Uuid,
    pub is_valid: bool,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub suggestions: Vec<String>,
    pub auto_fixed_count: usize,
    pub prevented_issues_count: usize,
    pub final_status: FinalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_test: Option<BuildTestResult>,
    #[serde(default)]
    pub applied_fixes: Vec<AppliedFix>,
    pub summary: ValidationSummary,
    /// Pipeline fault message when `final_status` is `ERROR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl ValidationResult {
    /// Aggregate a completed run.
    pub fn aggregate(run_id: Uuid, input: Aggregation) -> Self {
        let (errors, warnings): (Vec<Finding>, Vec<Finding>) = input
            .remaining
            .into_iter()
            .partition(|f| f.severity == Severity::Error);

        let mut suggestions: Vec<String> = Vec::new();
        for warning in warnings.iter().filter(|w| !w.auto_fixable) {
            if let Some(fix) = &warning.suggested_fix {
                if !suggestions.contains(fix) {
                    suggestions.push(fix.clone());
                }
            }
        }

        let auto_fixed_count = input.applied_fixes.len();
        let fix_success_rate = if input.attempted == 0 {
            1.0
        } else {
            auto_fixed_count as f64 / input.attempted as f64
        };
        let average_confidence = if auto_fixed_count == 0 {
            0.0
        } else {
            input.applied_fixes.iter().map(|f| f.confidence).sum::<f64>() / auto_fixed_count as f64
        };

        let summary = ValidationSummary {
            detected_count: input.detected,
            attempted_count: input.attempted,
            auto_fixed_count,
            remaining_errors: errors.len(),
            remaining_warnings: warnings.len(),
            fix_success_rate,
            average_confidence,
        };

        let final_status = FinalStatus::compute(&errors, input.build_test.as_ref());

        Self {
            run_id,
            is_valid: errors.is_empty(),
            errors,
            warnings,
            suggestions,
            auto_fixed_count,
            prevented_issues_count: input.prevented,
            final_status,
            build_test: input.build_test,
            applied_fixes: input.applied_fixes,
            summary,
            fault: None,
        }
    }

    /// Mark the result as produced by a faulted run.
    pub fn with_fault(mut self, message: impl Into<String>) -> Self {
        self.final_status = FinalStatus::Error;
        self.fault = Some(message.into());
        self
    }

    /// Mark the result as partial (run stopped before completion).
    pub fn into_partial(mut self) -> Self {
        self.final_status = FinalStatus::Processing;
        self
    }

    /// Generate a human-readable report.
    pub fn report(&self) -> String {
        let mut report = String::new();

        let status = match self.final_status {
            FinalStatus::ReadyToUse => "✅ READY TO USE",
            FinalStatus::NeedsAttention => "⚠️ NEEDS ATTENTION",
            FinalStatus::Processing => "⏳ INCOMPLETE",
            FinalStatus::Error => "❌ PIPELINE ERROR",
        };
        report.push_str(&format!("Run: {}\n", self.run_id));
        report.push_str(&format!("Status: {}\n", status));
        if let Some(fault) = &self.fault {
            report.push_str(&format!("Fault: {}\n", fault));
        }
        report.push_str(&format!(
            "Prevented: {}  Auto-fixed: {}  Fix success: {:.0}%\n",
            self.prevented_issues_count,
            self.auto_fixed_count,
            self.summary.fix_success_rate * 100.0
        ));

        if !self.applied_fixes.is_empty() {
            report.push_str("\nApplied fixes:\n");
            for fix in &self.applied_fixes {
                report.push_str(&format!(
                    "  🔧 {} - {} [{} @ {:.2}]\n",
                    fix.file, fix.description, fix.strategy, fix.confidence
                ));
            }
        }

        if !self.errors.is_empty() {
            report.push_str("\nErrors:\n");
            for error in &self.errors {
                report.push_str(&format!("  ❌ {} ({}): {}\n", error.file, error.kind, error.message));
            }
        }

        if !self.warnings.is_empty() {
            report.push_str("\nWarnings:\n");
            for warning in &self.warnings {
                report.push_str(&format!("  ⚠️ {} ({}): {}\n", warning.file, warning.kind, warning.message));
            }
        }

        if !self.suggestions.is_empty() {
            report.push_str("\nSuggestions:\n");
            for suggestion in &self.suggestions {
                report.push_str(&format!("  💡 {}\n", suggestion));
            }
        }

        if let Some(build) = &self.build_test {
            report.push_str(&format!("\nBuild test ({}ms):\n", build.time_taken_ms));
            for stage in &build.stages {
                let icon = match stage.status {
                    StageStatus::Passed => "✅",
                    StageStatus::Skipped => "⏭️",
                    StageStatus::Failed | StageStatus::TimedOut => "❌",
                };
                report.push_str(&format!("  {} {} ({}ms)\n", icon, stage.stage, stage.duration_ms));
            }
            for error in &build.errors {
                let truncated: String = error.chars().take(500).collect();
                report.push_str(&format!("     {}\n", truncated));
            }
        }

        report
    }
}

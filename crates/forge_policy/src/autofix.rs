//! Auto-fix engine.
//!
//! Fixes run in bounded passes. In each pass the candidate findings are
//! grouped by file; groups run in parallel while the fixes of one group run
//! sequentially against a private copy of the file. Touched files are then
//! re-detected, and a fix only counts as applied if its finding is gone.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use forge_core::{sort_findings, AppliedFix, Finding, ProjectMetadata, ProjectTree};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{check_confidence, FixContext, IssueCatalog};
use crate::detector::{build_pool, default_concurrency, IssueDetector};
use crate::error::{FixError, PolicyError, PolicyResult};

pub const DEFAULT_MAX_PASSES: usize = 3;

/// A fix that was attempted but did not resolve its finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixFailure {
    pub finding_id: String,
    pub kind: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub reason: String,
}

/// Everything the engine did during one remediation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationOutcome {
    pub applied_fixes: Vec<AppliedFix>,
    /// Findings left after the last pass, in detector order
    pub remaining: Vec<Finding>,
    pub failures: Vec<FixFailure>,
    /// Number of distinct findings attempted
    pub attempted: usize,
    pub passes: usize,
    pub touched_files: BTreeSet<String>,
}

/// A remediation stopped by a fault.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RemediationFault {
    pub error: PolicyError,
    /// Work confirmed by the passes completed before the fault
    pub partial: Box<RemediationOutcome>,
}

/// Progress carried between passes.
struct Remediation {
    current: Vec<Finding>,
    attempted: HashSet<String>,
    outcome: RemediationOutcome,
}

impl Remediation {
    fn finish(mut self) -> RemediationOutcome {
        self.outcome.attempted = self.attempted.len();
        self.outcome.remaining = self.current;
        self.outcome
    }

    fn fault(self, error: PolicyError) -> RemediationFault {
        RemediationFault {
            error,
            partial: Box::new(self.finish()),
        }
    }
}

/// A fix committed to the tree, awaiting re-detection.
struct PendingFix {
    finding: Finding,
    strategy: String,
    confidence: f64,
    description: String,
}

/// Result of fixing one file group.
struct GroupOutcome {
    file: String,
    content: Option<String>,
    changed: bool,
    attempted: Vec<String>,
    pending: Vec<PendingFix>,
    failures: Vec<FixFailure>,
}

/// Applies catalog strategies to auto-fixable findings.
#[derive(Debug, Clone)]
pub struct AutoFixEngine {
    catalog: Arc<IssueCatalog>,
    detector: IssueDetector,
    max_concurrency: usize,
    max_passes: usize,
}

impl AutoFixEngine {
    pub fn new(catalog: Arc<IssueCatalog>) -> Self {
        Self {
            detector: IssueDetector::new(catalog.clone()),
            catalog,
            max_concurrency: default_concurrency(),
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    /// Bound the number of file groups fixed in parallel.
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Use a specific detector for re-detection.
    pub fn with_detector(mut self, detector: IssueDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Fix what can be fixed, mutating `tree` in place.
    ///
    /// On a fault the tree is rolled back to the end of the last completed
    /// pass, and the fault carries the outcome as of that pass.
    pub fn remediate(
        &self,
        tree: &mut ProjectTree,
        findings: Vec<Finding>,
        metadata: &ProjectMetadata,
    ) -> Result<RemediationOutcome, RemediationFault> {
        let mut state = Remediation {
            current: findings,
            attempted: HashSet::new(),
            outcome: RemediationOutcome::default(),
        };

        let pool = match build_pool(self.max_concurrency) {
            Ok(pool) => pool,
            Err(error) => return Err(state.fault(error)),
        };

        for pass in 1..=self.max_passes {
            let snapshot = tree.clone();
            match self.run_pass(pass, tree, &snapshot, metadata, &pool, &mut state) {
                Ok(true) => {}
                Ok(false) => break,
                Err(error) => {
                    warn!("Auto-fix pass {} failed: {}", pass, error);
                    *tree = snapshot;
                    return Err(state.fault(error));
                }
            }
        }

        let outcome = state.finish();
        info!(
            "Auto-fix finished: {} applied, {} failed, {} remaining",
            outcome.applied_fixes.len(),
            outcome.failures.len(),
            outcome.remaining.len()
        );
        Ok(outcome)
    }

    /// Run one pass. Returns `false` when nothing was left to fix.
    ///
    /// `state` is only updated once every fallible step of the pass is done.
    fn run_pass(
        &self,
        pass: usize,
        tree: &mut ProjectTree,
        snapshot: &ProjectTree,
        metadata: &ProjectMetadata,
        pool: &rayon::ThreadPool,
        state: &mut Remediation,
    ) -> PolicyResult<bool> {
        let mut groups: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
        for finding in state
            .current
            .iter()
            .filter(|f| f.auto_fixable && !state.attempted.contains(&f.id))
        {
            groups.entry(finding.file.clone()).or_default().push(finding.clone());
        }
        if groups.is_empty() {
            return Ok(false);
        }

        info!(
            "Auto-fix pass {}: {} findings across {} files",
            pass,
            groups.values().map(Vec::len).sum::<usize>(),
            groups.len()
        );

        let ctx = FixContext {
            tree: snapshot,
            metadata,
        };
        let results: Vec<GroupOutcome> = pool.install(|| {
            groups
                .into_par_iter()
                .map(|(file, findings)| self.fix_group(file, findings, &ctx))
                .collect::<PolicyResult<Vec<_>>>()
        })?;

        let mut touched = BTreeSet::new();
        let mut pending = Vec::new();
        let mut attempted = Vec::new();
        let mut failures = Vec::new();
        for group in results {
            attempted.extend(group.attempted);
            failures.extend(group.failures);
            if group.changed {
                match group.content {
                    Some(content) => {
                        tree.insert(group.file.clone(), content);
                    }
                    None => {
                        tree.remove(&group.file);
                    }
                }
                touched.insert(group.file);
            }
            pending.extend(group.pending);
        }

        let mut current = state.current.clone();
        if !touched.is_empty() {
            let redetected = self.detector.detect_files(tree, metadata, &touched)?;
            current.retain(|f| !touched.contains(&f.file));
            current.extend(redetected);
            sort_findings(&mut current);
        }

        let outcome = &mut state.outcome;
        outcome.passes = pass;
        outcome.failures.extend(failures);
        state.attempted.extend(attempted);

        let present: HashSet<&str> = current.iter().map(|f| f.id.as_str()).collect();
        for fix in pending {
            if present.contains(fix.finding.id.as_str()) {
                warn!("Fix '{}' did not resolve {}", fix.strategy, fix.finding.id);
                outcome.failures.push(FixFailure {
                    finding_id: fix.finding.id.clone(),
                    kind: fix.finding.kind.clone(),
                    file: fix.finding.file.clone(),
                    strategy: Some(fix.strategy),
                    reason: "finding still present after fix".to_string(),
                });
            } else {
                debug!("Applied {} to {}", fix.strategy, fix.finding.id);
                outcome.applied_fixes.push(AppliedFix {
                    finding_id: fix.finding.id,
                    kind: fix.finding.kind,
                    file: fix.finding.file,
                    description: fix.description,
                    strategy: fix.strategy,
                    confidence: fix.confidence,
                });
            }
        }
        outcome.touched_files.extend(touched);

        // Surviving attempted findings are never retried.
        state.current = current
            .into_iter()
            .map(|f| {
                if f.auto_fixable && state.attempted.contains(&f.id) {
                    f.with_auto_fixable(false)
                } else {
                    f
                }
            })
            .collect();
        Ok(true)
    }

    /// Run every fix for one file, in order, on a private copy.
    fn fix_group(&self, file: String, findings: Vec<Finding>, ctx: &FixContext<'_>) -> PolicyResult<GroupOutcome> {
        let original = ctx.tree.get(&file).map(str::to_string);
        let mut slot = original.clone();
        let mut group = GroupOutcome {
            file,
            content: None,
            changed: false,
            attempted: Vec::new(),
            pending: Vec::new(),
            failures: Vec::new(),
        };

        for finding in findings {
            group.attempted.push(finding.id.clone());

            let Some(strategy) = self.catalog.best_strategy(&finding, ctx) else {
                group.failures.push(failure(&finding, None, "no applicable strategy".to_string()));
                continue;
            };
            let confidence = check_confidence(strategy.as_ref())?;

            let mut scratch = slot.clone();
            let result = catch_unwind(AssertUnwindSafe(|| strategy.apply(&finding, &mut scratch, ctx)))
                .unwrap_or_else(|panic| Err(FixError::Panicked(panic_message(panic.as_ref()))));

            match result {
                Ok(description) => {
                    slot = scratch;
                    group.pending.push(PendingFix {
                        strategy: strategy.name().to_string(),
                        finding,
                        confidence,
                        description,
                    });
                }
                Err(e) => {
                    warn!("Fix '{}' failed for {}: {}", strategy.name(), finding.id, e);
                    group
                        .failures
                        .push(failure(&finding, Some(strategy.name()), e.to_string()));
                }
            }
        }

        group.changed = slot != original;
        group.content = slot;
        Ok(group)
    }
}

fn failure(finding: &Finding, strategy: Option<&str>, reason: String) -> FixFailure {
    FixFailure {
        finding_id: finding.id.clone(),
        kind: finding.kind.clone(),
        file: finding.file.clone(),
        strategy: strategy.map(str::to_string),
        reason,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DetectContext, FixStrategy, Issue, IssueRule, RuleScope, SourceFile};
    use crate::error::FixError;
    use forge_core::{FindingCategory, Framework};

    fn metadata() -> ProjectMetadata {
        ProjectMetadata::new("Shop", Framework::React)
    }

    fn engine(catalog: IssueCatalog) -> (AutoFixEngine, IssueDetector) {
        let catalog = Arc::new(catalog);
        (AutoFixEngine::new(catalog.clone()), IssueDetector::new(catalog))
    }

    #[test]
    fn test_missing_manifest_is_created_with_full_confidence() {
        let mut tree = ProjectTree::from_files([("package.json", "{}")]);
        let (engine, detector) = engine(IssueCatalog::standard().unwrap());
        let findings: Vec<Finding> = detector
            .detect(&tree, &metadata())
            .unwrap()
            .into_iter()
            .filter(|f| f.kind == "manifest-missing")
            .collect();

        let outcome = engine.remediate(&mut tree, findings, &metadata()).unwrap();

        assert_eq!(outcome.applied_fixes.len(), 1);
        assert_eq!(outcome.applied_fixes[0].confidence, 1.0);
        assert_eq!(outcome.applied_fixes[0].strategy, "create-manifest");
        assert!(tree.contains("public/manifest.json"));
        assert!(outcome.remaining.iter().all(|f| f.kind != "manifest-missing"));
    }

    #[test]
    fn test_non_fixable_findings_pass_through() {
        let mut tree = ProjectTree::from_files([("public/manifest.json", "{ broken")]);
        let (engine, detector) = engine(IssueCatalog::standard().unwrap());
        let findings = detector.detect(&tree, &metadata()).unwrap();
        let syntax = findings.iter().find(|f| f.kind == "manifest-syntax").unwrap().clone();
        assert!(!syntax.auto_fixable);

        let outcome = engine.remediate(&mut tree, vec![syntax.clone()], &metadata()).unwrap();

        assert!(outcome.applied_fixes.is_empty());
        assert_eq!(outcome.remaining, vec![syntax]);
        assert_eq!(outcome.attempted, 0);
        assert_eq!(tree.get("public/manifest.json"), Some("{ broken"));
    }

    #[test]
    fn test_multiple_fixes_to_one_file_compose() {
        let mut tree = ProjectTree::from_files([(
            "package.json",
            r#"{"name":"shop","dependencies":{"react":"^18.2.0","react-dom":"^17.0.0"}}"#,
        )]);
        let (engine, detector) = engine(IssueCatalog::standard().unwrap());
        let findings = detector.detect(&tree, &metadata()).unwrap();

        let outcome = engine.remediate(&mut tree, findings, &metadata()).unwrap();

        let package = crate::pwa::parse_object(tree.get("package.json").unwrap()).unwrap();
        assert_eq!(package["scripts"]["build"], "vite build");
        assert_eq!(package["dependencies"]["react-dom"], "^18.2.0");
        assert_eq!(package["devDependencies"]["vite"], "^5.0.0");
        assert!(outcome
            .remaining
            .iter()
            .all(|f| f.file != "package.json" || !f.is_error()));

        let ids: HashSet<&str> = outcome.applied_fixes.iter().map(|f| f.finding_id.as_str()).collect();
        assert_eq!(ids.len(), outcome.applied_fixes.len());
        for fix in &outcome.applied_fixes {
            assert!((0.0..=1.0).contains(&fix.confidence));
            assert!(outcome.remaining.iter().all(|f| f.id != fix.finding_id));
        }
    }

    struct AlwaysRule;

    impl IssueRule for AlwaysRule {
        fn id(&self) -> &str {
            "always"
        }
        fn name(&self) -> &str {
            "Always"
        }
        fn category(&self) -> FindingCategory {
            FindingCategory::Structural
        }
        fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
            RuleScope::Project
        }
        fn check_project(&self, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
            Ok(vec![Issue::new("a.txt", "always there")])
        }
    }

    enum Behaviour {
        Panic,
        Fail,
        NoOpSuccess,
    }

    struct TestStrategy(Behaviour);

    impl FixStrategy for TestStrategy {
        fn name(&self) -> &str {
            "test-strategy"
        }
        fn rule_id(&self) -> &str {
            "always"
        }
        fn confidence(&self) -> f64 {
            0.5
        }
        fn apply(&self, _f: &Finding, slot: &mut Option<String>, _c: &FixContext<'_>) -> Result<String, FixError> {
            match self.0 {
                Behaviour::Panic => panic!("strategy blew up"),
                Behaviour::Fail => Err(FixError::Failed("cannot".to_string())),
                Behaviour::NoOpSuccess => {
                    *slot = Some("changed".to_string());
                    Ok("touched the file".to_string())
                }
            }
        }
    }

    fn always_catalog(behaviour: Behaviour) -> IssueCatalog {
        let mut catalog = IssueCatalog::new();
        catalog.register_rule(Arc::new(AlwaysRule)).unwrap();
        catalog.register_strategy(Arc::new(TestStrategy(behaviour))).unwrap();
        catalog
    }

    #[test]
    fn test_strategy_failures_are_contained() {
        for behaviour in [Behaviour::Panic, Behaviour::Fail] {
            let mut tree = ProjectTree::from_files([("a.txt", "original")]);
            let (engine, detector) = engine(always_catalog(behaviour));
            let findings = detector.detect(&tree, &metadata()).unwrap();
            assert!(findings[0].auto_fixable);

            let outcome = engine.remediate(&mut tree, findings, &metadata()).unwrap();

            assert!(outcome.applied_fixes.is_empty());
            assert_eq!(outcome.failures.len(), 1);
            assert_eq!(outcome.remaining.len(), 1);
            assert!(!outcome.remaining[0].auto_fixable);
            assert_eq!(tree.get("a.txt"), Some("original"));
        }
    }

    #[test]
    fn test_unresolved_fix_is_not_retried() {
        let mut tree = ProjectTree::from_files([("a.txt", "original")]);
        let (engine, detector) = engine(always_catalog(Behaviour::NoOpSuccess));
        let engine = engine.with_max_passes(5);
        let findings = detector.detect(&tree, &metadata()).unwrap();

        let outcome = engine.remediate(&mut tree, findings, &metadata()).unwrap();

        assert_eq!(outcome.passes, 1);
        assert_eq!(outcome.attempted, 1);
        assert!(outcome.applied_fixes.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert!(!outcome.remaining[0].auto_fixable);
        assert_eq!(tree.get("a.txt"), Some("changed"));
    }

    /// Reports `#one` on stage 0 and `#two` on stage 1, and cannot read stage 2.
    struct StagedRule;

    impl IssueRule for StagedRule {
        fn id(&self) -> &str {
            "staged"
        }
        fn name(&self) -> &str {
            "Staged"
        }
        fn category(&self) -> FindingCategory {
            FindingCategory::Structural
        }
        fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
            RuleScope::Files(vec!["a.txt".to_string()])
        }
        fn check_file(&self, file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
            match file.content {
                "stage-0" => Ok(vec![Issue::new("a.txt", "stage 0").with_subject("one")]),
                "stage-1" => Ok(vec![Issue::new("a.txt", "stage 1").with_subject("two")]),
                _ => Err(PolicyError::RuleEvaluationFailed {
                    rule: "staged".to_string(),
                    message: "lookup failed".to_string(),
                }),
            }
        }
    }

    struct AdvanceStage;

    impl FixStrategy for AdvanceStage {
        fn name(&self) -> &str {
            "advance-stage"
        }
        fn rule_id(&self) -> &str {
            "staged"
        }
        fn confidence(&self) -> f64 {
            0.9
        }
        fn apply(&self, _f: &Finding, slot: &mut Option<String>, _c: &FixContext<'_>) -> Result<String, FixError> {
            let next = match slot.as_deref() {
                Some("stage-0") => "stage-1",
                _ => "stage-2",
            };
            *slot = Some(next.to_string());
            Ok(format!("advanced to {}", next))
        }
    }

    #[test]
    fn test_fault_keeps_completed_passes() {
        let mut catalog = IssueCatalog::new();
        catalog.register_rule(Arc::new(StagedRule)).unwrap();
        catalog.register_strategy(Arc::new(AdvanceStage)).unwrap();
        let (engine, detector) = engine(catalog);
        let mut tree = ProjectTree::from_files([("a.txt", "stage-0")]);
        let findings = detector.detect(&tree, &metadata()).unwrap();

        let fault = engine.remediate(&mut tree, findings, &metadata()).unwrap_err();

        assert!(fault.to_string().contains("lookup failed"));
        assert_eq!(fault.partial.passes, 1);
        assert_eq!(fault.partial.applied_fixes.len(), 1);
        assert_eq!(fault.partial.applied_fixes[0].finding_id, "staged:a.txt#one");
        let remaining: Vec<&str> = fault.partial.remaining.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(remaining, vec!["staged:a.txt#two"]);
        // Rolled back to the end of the first pass.
        assert_eq!(tree.get("a.txt"), Some("stage-1"));
    }
}

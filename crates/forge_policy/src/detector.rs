//! Issue detection.
//!
//! Detection is a pure function of the tree and the catalog. File-scoped
//! rules are fanned out per file on a bounded rayon pool; the collected
//! findings are then de-duplicated and sorted so the output order never
//! depends on scheduling.

use std::collections::BTreeSet;
use std::sync::Arc;

use forge_core::{sort_findings, Finding, ProjectMetadata, ProjectTree};
use glob::{MatchOptions, Pattern};
use rayon::prelude::*;
use tracing::debug;

use crate::catalog::{DetectContext, FixContext, Issue, IssueCatalog, IssueRule, RuleScope, SourceFile};
use crate::error::{PolicyError, PolicyResult};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Default worker count when none is configured.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Build a rayon pool with `threads` workers (at least one).
pub(crate) fn build_pool(threads: usize) -> PolicyResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .map_err(|e| PolicyError::WorkerPool(e.to_string()))
}

/// Runs catalog rules over a project tree.
#[derive(Debug, Clone)]
pub struct IssueDetector {
    catalog: Arc<IssueCatalog>,
    max_concurrency: usize,
}

impl IssueDetector {
    pub fn new(catalog: Arc<IssueCatalog>) -> Self {
        Self {
            catalog,
            max_concurrency: default_concurrency(),
        }
    }

    /// Bound the number of files evaluated in parallel.
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn catalog(&self) -> &Arc<IssueCatalog> {
        &self.catalog
    }

    /// Detect every finding in the tree.
    pub fn detect(&self, tree: &ProjectTree, metadata: &ProjectMetadata) -> PolicyResult<Vec<Finding>> {
        self.run(tree, metadata, None)
    }

    /// Detect findings attached to the given files only.
    ///
    /// Project-level rules are still evaluated, but only their findings for
    /// `paths` are kept.
    pub fn detect_files(
        &self,
        tree: &ProjectTree,
        metadata: &ProjectMetadata,
        paths: &BTreeSet<String>,
    ) -> PolicyResult<Vec<Finding>> {
        self.run(tree, metadata, Some(paths))
    }

    fn run(
        &self,
        tree: &ProjectTree,
        metadata: &ProjectMetadata,
        only: Option<&BTreeSet<String>>,
    ) -> PolicyResult<Vec<Finding>> {
        let ctx = DetectContext { tree, metadata };

        let mut file_rules: Vec<(&Arc<dyn IssueRule>, Vec<Pattern>)> = Vec::new();
        let mut project_rules: Vec<&Arc<dyn IssueRule>> = Vec::new();
        for rule in self.catalog.rules_for(metadata) {
            match rule.scope(&ctx) {
                RuleScope::Files(globs) => {
                    let patterns = globs
                        .iter()
                        .map(|g| Pattern::new(g))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| PolicyError::RuleEvaluationFailed {
                            rule: rule.id().to_string(),
                            message: format!("Invalid glob: {}", e),
                        })?;
                    file_rules.push((rule, patterns));
                }
                RuleScope::Project => project_rules.push(rule),
            }
        }

        let files: Vec<SourceFile<'_>> = tree
            .iter()
            .filter(|(path, _)| only.map_or(true, |o| o.contains(*path)))
            .map(|(path, content)| SourceFile { path, content })
            .collect();

        debug!(
            "Detecting over {} files with {} file rules, {} project rules",
            files.len(),
            file_rules.len(),
            project_rules.len()
        );

        let pool = build_pool(self.max_concurrency)?;
        let per_file: Vec<Vec<Finding>> = pool.install(|| {
            files
                .par_iter()
                .map(|file| -> PolicyResult<Vec<Finding>> {
                    let mut found = Vec::new();
                    for (rule, patterns) in &file_rules {
                        if !patterns.iter().any(|p| p.matches_with(file.path, MATCH_OPTIONS)) {
                            continue;
                        }
                        for issue in rule.check_file(file, &ctx)? {
                            found.push(self.to_finding(rule, issue, &ctx));
                        }
                    }
                    Ok(found)
                })
                .collect::<PolicyResult<Vec<_>>>()
        })?;

        let mut findings: Vec<Finding> = per_file.into_iter().flatten().collect();
        for rule in project_rules {
            for issue in rule.check_project(&ctx)? {
                if only.map_or(true, |o| o.contains(&issue.file)) {
                    findings.push(self.to_finding(rule, issue, &ctx));
                }
            }
        }

        sort_findings(&mut findings);
        findings.dedup_by(|a, b| a.id == b.id);
        debug!("Detected {} findings", findings.len());
        Ok(findings)
    }

    fn to_finding(&self, rule: &Arc<dyn IssueRule>, issue: Issue, ctx: &DetectContext<'_>) -> Finding {
        let mut finding = Finding::new(rule.id(), rule.category(), issue.file, issue.message);
        if let Some(subject) = issue.subject {
            finding = finding.with_subject(subject);
        }
        if let Some(line) = issue.line {
            finding = finding.with_line(line);
        }
        if let Some(fix) = issue.suggested_fix {
            finding = finding.with_suggested_fix(fix);
        }

        let fix_ctx = FixContext {
            tree: ctx.tree,
            metadata: ctx.metadata,
        };
        let fixable = self.catalog.best_strategy(&finding, &fix_ctx).is_some();
        finding.with_auto_fixable(fixable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{Feature, Framework, Severity};

    fn detector() -> IssueDetector {
        IssueDetector::new(Arc::new(IssueCatalog::standard().unwrap()))
    }

    fn broken_tree() -> ProjectTree {
        ProjectTree::from_files([
            ("index.html", "<html><head><title>x</title></head><body></body></html>"),
            ("package.json", r#"{"name":"x","scripts":{"dev":"vite"},"dependencies":{"react":"^18.2.0"}}"#),
            ("src/main.jsx", "import App from './app';\nconsole.log('hi');\n"),
            ("src/App.jsx", "export default function App() { return null; }\n"),
            ("src/util.ts", "export const x = 1;\n"),
        ])
    }

    #[test]
    fn test_detect_is_sorted_and_classified() {
        let metadata = ProjectMetadata::new("x", Framework::React).with_feature(Feature::Offline);
        let findings = detector().detect(&broken_tree(), &metadata).unwrap();

        let mut sorted = findings.clone();
        sort_findings(&mut sorted);
        assert_eq!(findings, sorted);

        let kinds: Vec<_> = findings.iter().map(|f| f.kind.as_str()).collect();
        for expected in [
            "manifest-missing",
            "manifest-unlinked",
            "theme-color-missing",
            "script-missing",
            "dependency-missing",
            "service-worker-missing",
            "tsconfig-missing",
            "import-casing",
            "debug-logging",
        ] {
            assert!(kinds.contains(&expected), "missing {}", expected);
        }

        let debug = findings.iter().find(|f| f.kind == "debug-logging").unwrap();
        assert_eq!(debug.severity, Severity::Warning);
        assert!(!debug.auto_fixable);

        let manifest = findings.iter().find(|f| f.kind == "manifest-missing").unwrap();
        assert_eq!(manifest.severity, Severity::Error);
        assert!(manifest.auto_fixable);
    }

    #[test]
    fn test_detect_is_deterministic_across_concurrency() {
        let tree = broken_tree();
        let metadata = ProjectMetadata::new("x", Framework::React);

        let serial = detector().with_concurrency(1).detect(&tree, &metadata).unwrap();
        for threads in [2, 8] {
            let parallel = detector().with_concurrency(threads).detect(&tree, &metadata).unwrap();
            assert_eq!(serial, parallel);
        }
    }

    #[test]
    fn test_detect_files_restricts_output() {
        let tree = broken_tree();
        let metadata = ProjectMetadata::new("x", Framework::React);
        let only: BTreeSet<String> = ["src/main.jsx".to_string()].into_iter().collect();

        let findings = detector().detect_files(&tree, &metadata, &only).unwrap();

        assert!(!findings.is_empty());
        assert!(findings.iter().all(|f| f.file == "src/main.jsx"));
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let mut catalog = IssueCatalog::standard().unwrap();
        catalog.disable_rule("debug-logging");
        let detector = IssueDetector::new(Arc::new(catalog));
        let metadata = ProjectMetadata::new("x", Framework::React);

        let findings = detector.detect(&broken_tree(), &metadata).unwrap();

        assert!(findings.iter().all(|f| f.kind != "debug-logging"));
    }
}

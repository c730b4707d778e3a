//! Issue catalog: the registry of detection rules and fix strategies.
//!
//! The catalog is assembled once, then shared read-only (behind an `Arc`)
//! by every detector and fix engine. Rules and strategies are trait objects
//! so built-in checks and declarative rule packs sit side by side.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use forge_core::{Finding, FindingCategory, ProjectMetadata, ProjectTree};
use tracing::debug;

use crate::error::{FixError, PolicyError, PolicyResult};
use crate::pack::RulePack;

/// A file handed to a file-scoped rule.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    pub path: &'a str,
    pub content: &'a str,
}

/// Read-only view used while detecting.
#[derive(Debug, Clone, Copy)]
pub struct DetectContext<'a> {
    pub tree: &'a ProjectTree,
    pub metadata: &'a ProjectMetadata,
}

/// Read-only view used while fixing.
///
/// `tree` is the tree as it was at the start of the current fix pass.
#[derive(Debug, Clone, Copy)]
pub struct FixContext<'a> {
    pub tree: &'a ProjectTree,
    pub metadata: &'a ProjectMetadata,
}

/// Which inputs a rule inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleScope {
    /// Evaluated once per text file matching any of the glob patterns.
    Files(Vec<String>),
    /// Evaluated once per tree.
    Project,
}

/// A raw problem reported by a rule; the detector turns it into a `Finding`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub file: String,
    pub message: String,
    pub subject: Option<String>,
    pub line: Option<usize>,
    pub suggested_fix: Option<String>,
}

impl Issue {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
            subject: None,
            line: None,
            suggested_fix: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }
}

/// A detection rule.
pub trait IssueRule: Send + Sync {
    /// Unique rule id, also the `kind` of its findings.
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn category(&self) -> FindingCategory;

    fn description(&self) -> &str {
        ""
    }

    /// Whether the rule is relevant for this project at all.
    fn applies_to(&self, _metadata: &ProjectMetadata) -> bool {
        true
    }

    fn scope(&self, ctx: &DetectContext<'_>) -> RuleScope;

    fn check_file(&self, _file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        Ok(Vec::new())
    }

    fn check_project(&self, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        Ok(Vec::new())
    }
}

/// A deterministic transformation resolving one finding kind.
pub trait FixStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// The rule whose findings this strategy resolves.
    fn rule_id(&self) -> &str;

    /// Declared confidence in `[0, 1]`, reported verbatim on applied fixes.
    fn confidence(&self) -> f64;

    /// Preconditions. Strategies whose preconditions fail are never chosen.
    fn can_fix(&self, _finding: &Finding, _ctx: &FixContext<'_>) -> bool {
        true
    }

    /// Rewrite `slot`, the content of `finding.file` (`None` when absent).
    ///
    /// Returns a human-readable description of the change.
    fn apply(
        &self,
        finding: &Finding,
        slot: &mut Option<String>,
        ctx: &FixContext<'_>,
    ) -> Result<String, FixError>;
}

/// Check that a declared confidence lies in `[0, 1]`.
pub fn check_confidence(strategy: &dyn FixStrategy) -> PolicyResult<f64> {
    let confidence = strategy.confidence();
    if confidence.is_nan() || !(0.0..=1.0).contains(&confidence) {
        return Err(PolicyError::CatalogCorrupt(format!(
            "strategy '{}' declares confidence {} outside [0, 1]",
            strategy.name(),
            confidence
        )));
    }
    Ok(confidence)
}

/// Registry of rules and fix strategies.
#[derive(Default)]
pub struct IssueCatalog {
    rules: Vec<Arc<dyn IssueRule>>,
    strategies: HashMap<String, Vec<Arc<dyn FixStrategy>>>,
    disabled: HashSet<String>,
}

impl IssueCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every built-in rule and strategy registered.
    pub fn standard() -> PolicyResult<Self> {
        let mut catalog = Self::new();
        crate::rules::register_builtin(&mut catalog)?;
        crate::strategies::register_builtin(&mut catalog)?;
        Ok(catalog)
    }

    /// Add the rules of a declarative rule pack.
    pub fn with_rule_pack(mut self, pack: &RulePack) -> PolicyResult<Self> {
        pack.register(&mut self)?;
        Ok(self)
    }

    /// Register a rule. Rule ids must be unique.
    pub fn register_rule(&mut self, rule: Arc<dyn IssueRule>) -> PolicyResult<()> {
        if self.rule(rule.id()).is_some() {
            return Err(PolicyError::CatalogCorrupt(format!(
                "duplicate rule id '{}'",
                rule.id()
            )));
        }
        debug!("Registering rule: {}", rule.id());
        self.rules.push(rule);
        Ok(())
    }

    /// Register a fix strategy for an already registered rule.
    pub fn register_strategy(&mut self, strategy: Arc<dyn FixStrategy>) -> PolicyResult<()> {
        check_confidence(strategy.as_ref())?;
        if self.rule(strategy.rule_id()).is_none() {
            return Err(PolicyError::CatalogCorrupt(format!(
                "strategy '{}' targets unknown rule '{}'",
                strategy.name(),
                strategy.rule_id()
            )));
        }

        debug!(
            "Registering strategy: {} -> {} ({:.2})",
            strategy.name(),
            strategy.rule_id(),
            strategy.confidence()
        );
        self.strategies
            .entry(strategy.rule_id().to_string())
            .or_default()
            .push(strategy);
        Ok(())
    }

    /// Disable a rule; its findings are no longer produced.
    pub fn disable_rule(&mut self, id: &str) -> bool {
        if self.rule(id).is_none() {
            return false;
        }
        debug!("Disabling rule: {}", id);
        self.disabled.insert(id.to_string())
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        !self.disabled.contains(id)
    }

    pub fn rule(&self, id: &str) -> Option<&Arc<dyn IssueRule>> {
        self.rules.iter().find(|r| r.id() == id)
    }

    /// Enabled rules in registration order.
    pub fn rules(&self) -> impl Iterator<Item = &Arc<dyn IssueRule>> {
        self.rules.iter().filter(|r| self.is_enabled(r.id()))
    }

    /// Enabled rules relevant for the given project.
    pub fn rules_for<'a>(
        &'a self,
        metadata: &'a ProjectMetadata,
    ) -> impl Iterator<Item = &'a Arc<dyn IssueRule>> + 'a {
        self.rules().filter(move |r| r.applies_to(metadata))
    }

    /// Strategies for a rule in registration order.
    pub fn strategies_for(&self, rule_id: &str) -> &[Arc<dyn FixStrategy>] {
        self.strategies
            .get(rule_id)
            .map(|s| s.as_slice())
            .unwrap_or(&[])
    }

    /// Highest-confidence strategy whose preconditions hold for `finding`.
    ///
    /// Ties go to the strategy registered first.
    pub fn best_strategy(
        &self,
        finding: &Finding,
        ctx: &FixContext<'_>,
    ) -> Option<&Arc<dyn FixStrategy>> {
        let mut best: Option<&Arc<dyn FixStrategy>> = None;
        for strategy in self.strategies_for(&finding.kind) {
            if !strategy.can_fix(finding, ctx) {
                continue;
            }
            match best {
                Some(current) if current.confidence() >= strategy.confidence() => {}
                _ => best = Some(strategy),
            }
        }
        best
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for IssueCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueCatalog")
            .field("rules", &self.rules.iter().map(|r| r.id()).collect::<Vec<_>>())
            .field("disabled", &self.disabled)
            .finish()
    }
}

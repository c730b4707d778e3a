//! Declarative rule packs.
//!
//! A rule pack is a YAML file adding project-specific rules to the catalog
//! without writing code:
//!
//! ```yaml
//! name: company-rules
//! rules:
//!   - id: no-insecure-urls
//!     type: forbidden_pattern
//!     pattern: "http://"
//!     paths: ["src/**/*.js"]
//!     suggested_fix: Use https:// URLs
//!   - id: robots-txt
//!     type: required_file
//!     file: public/robots.txt
//!     template: "User-agent: *\nAllow: /\n"
//!     confidence: 0.9
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use forge_core::{Finding, FindingCategory};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{DetectContext, FixContext, FixStrategy, IssueCatalog, IssueRule, Issue, RuleScope, SourceFile};
use crate::error::{FixError, PolicyError, PolicyResult};

/// A named set of declarative rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulePack {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<PackRule>,
}

/// One declarative rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackRule {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: PackRuleKind,
}

/// Types of declarative rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PackRuleKind {
    /// Regex that must not appear in the matching files.
    ForbiddenPattern {
        pattern: String,
        #[serde(default = "default_paths")]
        paths: Vec<String>,
        #[serde(default = "default_category")]
        category: FindingCategory,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        suggested_fix: Option<String>,
    },
    /// File that must exist; created from `template` when one is given.
    RequiredFile {
        file: String,
        #[serde(default)]
        template: Option<String>,
        #[serde(default = "default_confidence")]
        confidence: f64,
        #[serde(default)]
        suggested_fix: Option<String>,
    },
}

fn default_enabled() -> bool {
    true
}

fn default_paths() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_category() -> FindingCategory {
    FindingCategory::Style
}

fn default_confidence() -> f64 {
    0.9
}

impl RulePack {
    /// Load a rule pack from a YAML file.
    pub fn load(path: &Path) -> PolicyResult<Self> {
        debug!("Loading rule pack from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a rule pack from YAML text.
    pub fn from_yaml(content: &str) -> PolicyResult<Self> {
        let pack: RulePack = serde_yaml::from_str(content)?;
        pack.validate()?;
        Ok(pack)
    }

    fn validate(&self) -> PolicyResult<()> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(PolicyError::InvalidRulePack(format!(
                    "pack '{}' has a rule without id",
                    self.name
                )));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(PolicyError::InvalidRulePack(format!(
                    "pack '{}' defines rule '{}' twice",
                    self.name, rule.id
                )));
            }
        }
        Ok(())
    }

    /// Register the enabled rules (and template strategies) with a catalog.
    pub fn register(&self, catalog: &mut IssueCatalog) -> PolicyResult<()> {
        for rule in self.rules.iter().filter(|r| r.enabled) {
            let name = rule.name.clone().unwrap_or_else(|| rule.id.clone());
            match &rule.kind {
                PackRuleKind::ForbiddenPattern {
                    pattern,
                    paths,
                    category,
                    message,
                    suggested_fix,
                } => {
                    let regex = Regex::new(pattern).map_err(|e| {
                        PolicyError::InvalidRulePack(format!("rule '{}': invalid regex: {}", rule.id, e))
                    })?;
                    for path in paths {
                        glob::Pattern::new(path).map_err(|e| {
                            PolicyError::InvalidRulePack(format!("rule '{}': invalid glob '{}': {}", rule.id, path, e))
                        })?;
                    }
                    catalog.register_rule(Arc::new(PatternRule {
                        id: rule.id.clone(),
                        name,
                        description: rule.description.clone(),
                        regex,
                        paths: paths.clone(),
                        category: *category,
                        message: message.clone(),
                        suggested_fix: suggested_fix.clone(),
                    }))?;
                }
                PackRuleKind::RequiredFile {
                    file,
                    template,
                    confidence,
                    suggested_fix,
                } => {
                    catalog.register_rule(Arc::new(RequiredFileRule {
                        id: rule.id.clone(),
                        name,
                        description: rule.description.clone(),
                        file: file.clone(),
                        suggested_fix: suggested_fix.clone(),
                    }))?;
                    if let Some(template) = template {
                        catalog.register_strategy(Arc::new(CreateRequiredFile {
                            rule_id: rule.id.clone(),
                            template: template.clone(),
                            confidence: *confidence,
                        }))?;
                    }
                }
            }
        }
        debug!("Registered rule pack '{}' ({} rules)", self.name, self.rules.len());
        Ok(())
    }
}

/// Forbidden regex over globbed files; one finding per file.
struct PatternRule {
    id: String,
    name: String,
    description: String,
    regex: Regex,
    paths: Vec<String>,
    category: FindingCategory,
    message: Option<String>,
    suggested_fix: Option<String>,
}

impl IssueRule for PatternRule {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn category(&self) -> FindingCategory {
        self.category
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        RuleScope::Files(self.paths.clone())
    }
    fn check_file(&self, file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let lines: Vec<usize> = file
            .content
            .lines()
            .enumerate()
            .filter(|(_, line)| self.regex.is_match(line))
            .map(|(i, _)| i + 1)
            .collect();
        let Some(first) = lines.first() else {
            return Ok(Vec::new());
        };

        let message = self.message.clone().unwrap_or_else(|| {
            format!("{}: forbidden pattern found on {} line(s)", self.name, lines.len())
        });
        let mut issue = Issue::new(file.path, message).with_line(*first);
        if let Some(fix) = &self.suggested_fix {
            issue = issue.with_suggested_fix(fix.clone());
        }
        Ok(vec![issue])
    }
}

/// A file that must exist.
struct RequiredFileRule {
    id: String,
    name: String,
    description: String,
    file: String,
    suggested_fix: Option<String>,
}

impl IssueRule for RequiredFileRule {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        RuleScope::Project
    }
    fn check_project(&self, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        if ctx.tree.has_file(&self.file) {
            return Ok(Vec::new());
        }
        let mut issue = Issue::new(
            self.file.as_str(),
            format!("{}: required file '{}' not found", self.name, self.file),
        );
        if let Some(fix) = &self.suggested_fix {
            issue = issue.with_suggested_fix(fix.clone());
        }
        Ok(vec![issue])
    }
}

/// Creates a required file from its declared template.
struct CreateRequiredFile {
    rule_id: String,
    template: String,
    confidence: f64,
}

impl FixStrategy for CreateRequiredFile {
    fn name(&self) -> &str {
        "create-required-file"
    }
    fn rule_id(&self) -> &str {
        &self.rule_id
    }
    fn confidence(&self) -> f64 {
        self.confidence
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        !ctx.tree.has_file(&finding.file)
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, _ctx: &FixContext<'_>) -> Result<String, FixError> {
        if slot.is_some() {
            return Err(FixError::Precondition("file already exists".to_string()));
        }
        *slot = Some(self.template.clone());
        Ok(format!("Created {} from template", finding.file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{Framework, ProjectMetadata, ProjectTree};

    const PACK: &str = r#"
name: company-rules
rules:
  - id: no-insecure-urls
    name: No insecure URLs
    type: forbidden_pattern
    pattern: "http://"
    paths: ["src/**/*.js"]
    suggested_fix: Use https:// URLs
  - id: robots-txt
    type: required_file
    file: public/robots.txt
    template: "User-agent: *\nAllow: /\n"
    confidence: 0.75
  - id: disabled-rule
    type: required_file
    file: LICENSE
    enabled: false
"#;

    #[test]
    fn test_parse_pack() {
        let pack = RulePack::from_yaml(PACK).unwrap();

        assert_eq!(pack.name, "company-rules");
        assert_eq!(pack.rules.len(), 3);
        assert!(matches!(
            pack.rules[0].kind,
            PackRuleKind::ForbiddenPattern { category: FindingCategory::Style, .. }
        ));
    }

    #[test]
    fn test_register_pack() {
        let pack = RulePack::from_yaml(PACK).unwrap();
        let mut catalog = IssueCatalog::new();
        pack.register(&mut catalog).unwrap();

        assert!(catalog.rule("no-insecure-urls").is_some());
        assert!(catalog.rule("disabled-rule").is_none());
        let strategies = catalog.strategies_for("robots-txt");
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].confidence(), 0.75);
    }

    #[test]
    fn test_pattern_rule_reports_first_line() {
        let pack = RulePack::from_yaml(PACK).unwrap();
        let mut catalog = IssueCatalog::new();
        pack.register(&mut catalog).unwrap();

        let tree = ProjectTree::from_files([("src/api.js", "const a = 1;\nfetch('http://x');\nfetch('http://y');\n")]);
        let metadata = ProjectMetadata::new("app", Framework::Vanilla);
        let ctx = DetectContext {
            tree: &tree,
            metadata: &metadata,
        };
        let file = SourceFile {
            path: "src/api.js",
            content: tree.get("src/api.js").unwrap(),
        };

        let issues = catalog.rule("no-insecure-urls").unwrap().check_file(&file, &ctx).unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(2));
        assert_eq!(issues[0].suggested_fix.as_deref(), Some("Use https:// URLs"));
    }

    #[test]
    fn test_rejects_invalid_packs() {
        let bad_regex = "name: x\nrules:\n  - id: a\n    type: forbidden_pattern\n    pattern: \"(\"\n";
        let pack = RulePack::from_yaml(bad_regex).unwrap();
        assert!(matches!(
            pack.register(&mut IssueCatalog::new()),
            Err(PolicyError::InvalidRulePack(_))
        ));

        let duplicate = "name: x\nrules:\n  - id: a\n    type: required_file\n    file: a\n  - id: a\n    type: required_file\n    file: b\n";
        assert!(matches!(
            RulePack::from_yaml(duplicate),
            Err(PolicyError::InvalidRulePack(_))
        ));

        let bad_confidence = "name: x\nrules:\n  - id: a\n    type: required_file\n    file: a\n    template: x\n    confidence: 1.5\n";
        let pack = RulePack::from_yaml(bad_confidence).unwrap();
        assert!(matches!(
            pack.register(&mut IssueCatalog::new()),
            Err(PolicyError::CatalogCorrupt(_))
        ));
    }
}

//! Prevention: deterministic normalizations applied before detection.
//!
//! Prevention rules only make changes that are always safe (separators,
//! encodings, names), so their issues never show up as findings.

use std::collections::BTreeSet;

use forge_core::{ProjectMetadata, ProjectTree};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::pwa;

/// A single always-safe normalization.
pub trait PreventionRule: Send + Sync {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    /// Normalize the tree in place. Returns true if anything changed.
    fn apply(&self, tree: &mut ProjectTree, metadata: &ProjectMetadata) -> bool;
}

/// Rules that fired during one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreventionReport {
    pub fired: Vec<String>,
}

impl PreventionReport {
    /// Number of distinct rules that fired.
    pub fn count(&self) -> usize {
        self.fired.len()
    }
}

/// Runs prevention rules in a fixed order.
pub struct PreventionScanner {
    rules: Vec<Box<dyn PreventionRule>>,
}

impl Default for PreventionScanner {
    fn default() -> Self {
        Self::standard()
    }
}

impl PreventionScanner {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Scanner with every built-in prevention rule.
    pub fn standard() -> Self {
        Self::empty()
            .with_rule(Box::new(NormalizePathSeparators))
            .with_rule(Box::new(StripBom))
            .with_rule(Box::new(NormalizeLineEndings))
            .with_rule(Box::new(SanitizePackageName))
            .with_rule(Box::new(SanitizeManifestNames))
            .with_rule(Box::new(EnsureManifestKeys))
            .with_rule(Box::new(EnsureGitignore))
    }

    pub fn with_rule(mut self, rule: Box<dyn PreventionRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Apply every rule once, mutating the tree.
    pub fn scan(&self, tree: &mut ProjectTree, metadata: &ProjectMetadata) -> PreventionReport {
        let mut report = PreventionReport::default();
        for rule in &self.rules {
            if rule.apply(tree, metadata) {
                debug!("Prevention rule fired: {}", rule.id());
                report.fired.push(rule.id().to_string());
            }
        }
        report
    }
}

struct NormalizePathSeparators;

impl PreventionRule for NormalizePathSeparators {
    fn id(&self) -> &str {
        "normalize-path-separators"
    }
    fn description(&self) -> &str {
        "Use forward slashes and drop leading ./ in file paths"
    }
    fn apply(&self, tree: &mut ProjectTree, _metadata: &ProjectMetadata) -> bool {
        let renames: Vec<(String, String)> = tree
            .all_paths()
            .into_iter()
            .filter_map(|path| {
                let mut normalized = path.replace('\\', "/");
                while let Some(rest) = normalized.strip_prefix("./") {
                    normalized = rest.to_string();
                }
                (normalized != path).then(|| (path.to_string(), normalized))
            })
            .collect();

        let mut changed = false;
        for (from, to) in renames {
            if tree.rename(&from, &to) {
                changed = true;
            } else {
                debug!("Not renaming {} over existing {}", from, to);
            }
        }
        changed
    }
}

struct StripBom;

impl PreventionRule for StripBom {
    fn id(&self) -> &str {
        "strip-bom"
    }
    fn description(&self) -> &str {
        "Remove leading UTF-8 byte order marks"
    }
    fn apply(&self, tree: &mut ProjectTree, _metadata: &ProjectMetadata) -> bool {
        let mut changed = false;
        for (_, content) in tree.iter_mut() {
            if let Some(rest) = content.strip_prefix('\u{feff}') {
                *content = rest.to_string();
                changed = true;
            }
        }
        changed
    }
}

struct NormalizeLineEndings;

impl PreventionRule for NormalizeLineEndings {
    fn id(&self) -> &str {
        "normalize-line-endings"
    }
    fn description(&self) -> &str {
        "Convert CRLF line endings to LF"
    }
    fn apply(&self, tree: &mut ProjectTree, _metadata: &ProjectMetadata) -> bool {
        let mut changed = false;
        for (_, content) in tree.iter_mut() {
            if content.contains("\r\n") {
                *content = content.replace("\r\n", "\n");
                changed = true;
            }
        }
        changed
    }
}

/// Rewrite a JSON object file through `edit`; returns true if it changed.
fn edit_json(
    tree: &mut ProjectTree,
    path: &str,
    edit: impl FnOnce(&mut serde_json::Map<String, Value>) -> bool,
) -> bool {
    let Some(mut object) = tree.get(path).and_then(pwa::parse_object) else {
        return false;
    };
    if !edit(&mut object) {
        return false;
    }
    match pwa::to_pretty_json(&Value::Object(object)) {
        Ok(content) => {
            tree.insert(path, content);
            true
        }
        Err(e) => {
            debug!("Could not serialize {}: {}", path, e);
            false
        }
    }
}

struct SanitizePackageName;

impl PreventionRule for SanitizePackageName {
    fn id(&self) -> &str {
        "sanitize-package-name"
    }
    fn description(&self) -> &str {
        "Make the package.json name a valid npm package name"
    }
    fn apply(&self, tree: &mut ProjectTree, _metadata: &ProjectMetadata) -> bool {
        edit_json(tree, "package.json", |package| {
            let Some(name) = package.get("name").and_then(|n| n.as_str()) else {
                return false;
            };
            let sanitized = pwa::sanitize_package_name(name);
            if sanitized == name {
                return false;
            }
            package.insert("name".to_string(), Value::String(sanitized));
            true
        })
    }
}

/// Drop control characters and markup delimiters from a display name.
fn clean_display_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | '"' | '`'))
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct SanitizeManifestNames;

impl PreventionRule for SanitizeManifestNames {
    fn id(&self) -> &str {
        "sanitize-manifest-names"
    }
    fn description(&self) -> &str {
        "Strip control and markup characters from manifest names"
    }
    fn apply(&self, tree: &mut ProjectTree, metadata: &ProjectMetadata) -> bool {
        let Some(path) = pwa::locate_manifest(tree, metadata).map(str::to_string) else {
            return false;
        };
        edit_json(tree, &path, |manifest| {
            let mut changed = false;
            for key in ["name", "short_name"] {
                let Some(value) = manifest.get(key).and_then(|v| v.as_str()) else {
                    continue;
                };
                let cleaned = clean_display_name(value);
                if cleaned != value && !cleaned.is_empty() {
                    manifest.insert(key.to_string(), Value::String(cleaned));
                    changed = true;
                }
            }
            changed
        })
    }
}

struct EnsureManifestKeys;

impl PreventionRule for EnsureManifestKeys {
    fn id(&self) -> &str {
        "ensure-manifest-keys"
    }
    fn description(&self) -> &str {
        "Add missing name, short_name, start_url and display manifest keys"
    }
    fn apply(&self, tree: &mut ProjectTree, metadata: &ProjectMetadata) -> bool {
        let Some(path) = pwa::locate_manifest(tree, metadata).map(str::to_string) else {
            return false;
        };
        // Only keys derivable from metadata alone; the rest stay findings.
        const KEYS: [&str; 4] = ["name", "short_name", "start_url", "display"];
        edit_json(tree, &path, |manifest| {
            let mut changed = false;
            for key in KEYS {
                if manifest.contains_key(key) {
                    continue;
                }
                if let Some(value) = pwa::default_manifest_value(key, metadata) {
                    manifest.insert(key.to_string(), value);
                    changed = true;
                }
            }
            changed
        })
    }
}

struct EnsureGitignore;

impl PreventionRule for EnsureGitignore {
    fn id(&self) -> &str {
        "ensure-gitignore"
    }
    fn description(&self) -> &str {
        "Ignore node_modules and dist in .gitignore"
    }
    fn apply(&self, tree: &mut ProjectTree, _metadata: &ProjectMetadata) -> bool {
        const REQUIRED: [&str; 2] = ["node_modules", "dist"];
        let existing = tree.get(".gitignore").unwrap_or("").to_string();
        let present: BTreeSet<&str> = existing
            .lines()
            .map(|l| l.trim().trim_start_matches('/').trim_end_matches('/'))
            .collect();
        let missing: Vec<&str> = REQUIRED.iter().copied().filter(|e| !present.contains(e)).collect();
        if missing.is_empty() {
            return false;
        }

        let mut content = existing.clone();
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        for entry in missing {
            content.push_str(entry);
            content.push('\n');
        }
        tree.insert(".gitignore", content);
        true
    }
}

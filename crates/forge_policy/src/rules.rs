//! Built-in detection rules.
//!
//! Structural rules flag problems that would break the build or the PWA
//! wiring; style rules flag polish issues. Each rule is a small struct so it
//! can be registered, disabled and listed individually.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use forge_core::{Framework, FindingCategory, ProjectMetadata};
use serde_json::Value;

use crate::catalog::{DetectContext, IssueCatalog, IssueRule, Issue, RuleScope, SourceFile};
use crate::error::PolicyResult;
use crate::pwa::{self, ImportResolution};

/// Ids of the built-in rules.
pub mod ids {
    pub const MANIFEST_MISSING: &str = "manifest-missing";
    pub const MANIFEST_SYNTAX: &str = "manifest-syntax";
    pub const MANIFEST_INCOMPLETE: &str = "manifest-incomplete";
    pub const INDEX_MISSING: &str = "index-missing";
    pub const MANIFEST_UNLINKED: &str = "manifest-unlinked";
    pub const THEME_COLOR_MISSING: &str = "theme-color-missing";
    pub const ICON_MISSING: &str = "icon-missing";
    pub const PACKAGE_MISSING: &str = "package-missing";
    pub const PACKAGE_SYNTAX: &str = "package-syntax";
    pub const SCRIPT_MISSING: &str = "script-missing";
    pub const DEPENDENCY_MISSING: &str = "dependency-missing";
    pub const DEPENDENCY_MISMATCH: &str = "dependency-mismatch";
    pub const SERVICE_WORKER_MISSING: &str = "service-worker-missing";
    pub const TSCONFIG_MISSING: &str = "tsconfig-missing";
    pub const IMPORT_SEPARATOR: &str = "import-separator";
    pub const IMPORT_CASING: &str = "import-casing";
    pub const IMPORT_UNRESOLVED: &str = "import-unresolved";
    pub const PATH_COLLISION: &str = "path-collision";
    pub const DUPLICATE_IMPORT: &str = "duplicate-import";
    pub const DEBUG_LOGGING: &str = "debug-logging";
}

/// Scripts every generated project must define.
pub const REQUIRED_SCRIPTS: &[&str] = &["dev", "build"];

const PACKAGE_JSON: &str = "package.json";

/// Register every built-in rule, in a stable order.
pub fn register_builtin(catalog: &mut IssueCatalog) -> PolicyResult<()> {
    let rules: Vec<Arc<dyn IssueRule>> = vec![
        Arc::new(ManifestMissing),
        Arc::new(ManifestSyntax),
        Arc::new(ManifestIncomplete),
        Arc::new(IconMissing),
        Arc::new(IndexMissing),
        Arc::new(ManifestUnlinked),
        Arc::new(ThemeColorMissing),
        Arc::new(PackageMissing),
        Arc::new(PackageSyntax),
        Arc::new(ScriptMissing),
        Arc::new(DependencyMissing),
        Arc::new(DependencyMismatch),
        Arc::new(ServiceWorkerMissing),
        Arc::new(TsconfigMissing),
        Arc::new(ImportSeparator),
        Arc::new(ImportCasing),
        Arc::new(ImportUnresolved),
        Arc::new(PathCollision),
        Arc::new(DuplicateImport),
        Arc::new(DebugLogging),
    ];
    for rule in rules {
        catalog.register_rule(rule)?;
    }
    Ok(())
}

fn manifest_scope(ctx: &DetectContext<'_>) -> RuleScope {
    RuleScope::Files(vec![pwa::manifest_path(ctx.tree, ctx.metadata).to_string()])
}

fn index_scope(ctx: &DetectContext<'_>) -> RuleScope {
    RuleScope::Files(vec![ctx.metadata.framework.index_html_path().to_string()])
}

fn source_scope() -> RuleScope {
    RuleScope::Files(pwa::SOURCE_GLOBS.iter().map(|g| g.to_string()).collect())
}

fn package_scope() -> RuleScope {
    RuleScope::Files(vec![PACKAGE_JSON.to_string()])
}

/// Issue for content that is not a JSON object, or `None` when it is one.
fn json_object_issue(file: &SourceFile<'_>, what: &str) -> Option<Issue> {
    match serde_json::from_str::<Value>(file.content) {
        Ok(Value::Object(_)) => None,
        Ok(_) => Some(
            Issue::new(file.path, format!("{} must be a JSON object", what))
                .with_line(1)
                .with_suggested_fix(format!("Rewrite {} as a JSON object", file.path)),
        ),
        Err(e) => {
            let mut issue = Issue::new(file.path, format!("{} is not valid JSON: {}", what, e))
                .with_suggested_fix(format!("Fix the JSON syntax in {}", file.path));
            if e.line() > 0 {
                issue = issue.with_line(e.line());
            }
            Some(issue)
        }
    }
}

/// True if the HTML contains a `<tag>` whose `attr` equals `value`.
fn has_tag_with(html: &str, tag: &str, attr: &str, value: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let wanted = [
        format!("{}=\"{}\"", attr, value),
        format!("{}='{}'", attr, value),
        format!("{}={}", attr, value),
    ];

    let mut rest = lower.as_str();
    while let Some(start) = rest.find(&open) {
        let after = &rest[start..];
        let end = after.find('>').unwrap_or(after.len());
        let element = &after[..end];
        if wanted.iter().any(|w| element.contains(w.as_str())) {
            return true;
        }
        rest = &after[end..];
    }
    false
}

fn is_test_file(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.contains(".test.") || file.contains(".spec.") || path.contains("__tests__/")
}

// Manifest rules

struct ManifestMissing;

impl IssueRule for ManifestMissing {
    fn id(&self) -> &str {
        ids::MANIFEST_MISSING
    }
    fn name(&self) -> &str {
        "Manifest missing"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn description(&self) -> &str {
        "A web app manifest is required for the app to be installable"
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        RuleScope::Project
    }
    fn check_project(&self, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        if pwa::locate_manifest(ctx.tree, ctx.metadata).is_some() {
            return Ok(Vec::new());
        }
        let path = ctx.metadata.framework.manifest_path();
        Ok(vec![Issue::new(path, "Web app manifest is missing")
            .with_suggested_fix(format!("Create {} with name, icons, start_url and display", path))])
    }
}

struct ManifestSyntax;

impl IssueRule for ManifestSyntax {
    fn id(&self) -> &str {
        ids::MANIFEST_SYNTAX
    }
    fn name(&self) -> &str {
        "Manifest syntax"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn scope(&self, ctx: &DetectContext<'_>) -> RuleScope {
        manifest_scope(ctx)
    }
    fn check_file(&self, file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        Ok(json_object_issue(file, "Manifest").into_iter().collect())
    }
}

struct ManifestIncomplete;

impl IssueRule for ManifestIncomplete {
    fn id(&self) -> &str {
        ids::MANIFEST_INCOMPLETE
    }
    fn name(&self) -> &str {
        "Manifest incomplete"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Style
    }
    fn description(&self) -> &str {
        "Manifest lacks one of the keys browsers need to offer installation"
    }
    fn scope(&self, ctx: &DetectContext<'_>) -> RuleScope {
        manifest_scope(ctx)
    }
    fn check_file(&self, file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let Some(manifest) = pwa::parse_object(file.content) else {
            return Ok(Vec::new());
        };
        Ok(pwa::REQUIRED_MANIFEST_KEYS
            .iter()
            .filter(|key| !manifest.contains_key(**key))
            .map(|key| {
                Issue::new(file.path, format!("Manifest is missing required key '{}'", key))
                    .with_subject(*key)
                    .with_suggested_fix(format!("Add '{}' to the manifest", key))
            })
            .collect())
    }
}

struct IconMissing;

impl IssueRule for IconMissing {
    fn id(&self) -> &str {
        ids::ICON_MISSING
    }
    fn name(&self) -> &str {
        "Manifest icon missing"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Style
    }
    fn scope(&self, ctx: &DetectContext<'_>) -> RuleScope {
        manifest_scope(ctx)
    }
    fn check_file(&self, file: &SourceFile<'_>, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let Some(manifest) = pwa::parse_object(file.content) else {
            return Ok(Vec::new());
        };
        let Some(icons) = manifest.get("icons").and_then(|i| i.as_array()) else {
            return Ok(Vec::new());
        };

        let base = pwa::parent_dir(file.path);
        let mut issues = Vec::new();
        for src in icons.iter().filter_map(|i| i.get("src")?.as_str()) {
            if src.contains("://") || src.starts_with("data:") {
                continue;
            }
            let resolved = pwa::join_normalized(base, src.trim_start_matches('/'));
            if resolved.as_deref().map_or(false, |p| ctx.tree.has_file(p)) {
                continue;
            }
            issues.push(
                Issue::new(file.path, format!("Icon '{}' referenced by the manifest does not exist", src))
                    .with_subject(src)
                    .with_suggested_fix("Add the icon images referenced by the manifest (192x192 and 512x512 PNG)"),
            );
        }
        Ok(issues)
    }
}

// HTML entry rules

struct IndexMissing;

impl IssueRule for IndexMissing {
    fn id(&self) -> &str {
        ids::INDEX_MISSING
    }
    fn name(&self) -> &str {
        "HTML entry missing"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn applies_to(&self, metadata: &ProjectMetadata) -> bool {
        !matches!(metadata.framework, Framework::Custom(_))
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        RuleScope::Project
    }
    fn check_project(&self, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let path = ctx.metadata.framework.index_html_path();
        if ctx.tree.contains(path) {
            return Ok(Vec::new());
        }
        Ok(vec![Issue::new(path, "HTML entry document is missing")])
    }
}

struct ManifestUnlinked;

impl IssueRule for ManifestUnlinked {
    fn id(&self) -> &str {
        ids::MANIFEST_UNLINKED
    }
    fn name(&self) -> &str {
        "Manifest not linked"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Style
    }
    fn scope(&self, ctx: &DetectContext<'_>) -> RuleScope {
        index_scope(ctx)
    }
    fn check_file(&self, file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        if has_tag_with(file.content, "link", "rel", "manifest") {
            return Ok(Vec::new());
        }
        Ok(vec![Issue::new(file.path, "HTML entry does not link the web app manifest")
            .with_suggested_fix("Add <link rel=\"manifest\"> to the document head")])
    }
}

struct ThemeColorMissing;

impl IssueRule for ThemeColorMissing {
    fn id(&self) -> &str {
        ids::THEME_COLOR_MISSING
    }
    fn name(&self) -> &str {
        "Theme color meta tag missing"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Style
    }
    fn scope(&self, ctx: &DetectContext<'_>) -> RuleScope {
        index_scope(ctx)
    }
    fn check_file(&self, file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        if has_tag_with(file.content, "meta", "name", "theme-color") {
            return Ok(Vec::new());
        }
        Ok(vec![Issue::new(file.path, "HTML entry has no theme-color meta tag")
            .with_suggested_fix("Add <meta name=\"theme-color\"> to the document head")])
    }
}

// package.json rules

struct PackageMissing;

impl IssueRule for PackageMissing {
    fn id(&self) -> &str {
        ids::PACKAGE_MISSING
    }
    fn name(&self) -> &str {
        "package.json missing"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        RuleScope::Project
    }
    fn check_project(&self, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        if ctx.tree.contains(PACKAGE_JSON) {
            return Ok(Vec::new());
        }
        Ok(vec![Issue::new(PACKAGE_JSON, "package.json is missing")])
    }
}

struct PackageSyntax;

impl IssueRule for PackageSyntax {
    fn id(&self) -> &str {
        ids::PACKAGE_SYNTAX
    }
    fn name(&self) -> &str {
        "package.json syntax"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        package_scope()
    }
    fn check_file(&self, file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        Ok(json_object_issue(file, "package.json").into_iter().collect())
    }
}

struct ScriptMissing;

impl IssueRule for ScriptMissing {
    fn id(&self) -> &str {
        ids::SCRIPT_MISSING
    }
    fn name(&self) -> &str {
        "Required script missing"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        package_scope()
    }
    fn check_file(&self, file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let Some(package) = pwa::parse_object(file.content) else {
            return Ok(Vec::new());
        };
        let scripts = package.get("scripts").and_then(|s| s.as_object());
        Ok(REQUIRED_SCRIPTS
            .iter()
            .filter(|name| scripts.map_or(true, |s| !s.contains_key(**name)))
            .map(|name| {
                Issue::new(file.path, format!("package.json has no '{}' script", name))
                    .with_subject(*name)
            })
            .collect())
    }
}

struct DependencyMissing;

impl IssueRule for DependencyMissing {
    fn id(&self) -> &str {
        ids::DEPENDENCY_MISSING
    }
    fn name(&self) -> &str {
        "Framework dependency missing"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        package_scope()
    }
    fn check_file(&self, file: &SourceFile<'_>, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let Some(package) = pwa::parse_object(file.content) else {
            return Ok(Vec::new());
        };
        let framework = &ctx.metadata.framework;
        Ok(framework
            .required_dependencies()
            .iter()
            .chain(framework.required_dev_dependencies())
            .filter(|(name, _)| pwa::declared_version(&package, name).is_none())
            .map(|(name, version)| {
                Issue::new(
                    file.path,
                    format!("{} requires '{}' ({}) but it is not declared", framework, name, version),
                )
                .with_subject(*name)
            })
            .collect())
    }
}

struct DependencyMismatch;

impl IssueRule for DependencyMismatch {
    fn id(&self) -> &str {
        ids::DEPENDENCY_MISMATCH
    }
    fn name(&self) -> &str {
        "Companion package version mismatch"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        package_scope()
    }
    fn check_file(&self, file: &SourceFile<'_>, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let Some(package) = pwa::parse_object(file.content) else {
            return Ok(Vec::new());
        };
        let mut issues = Vec::new();
        for (primary, companion) in ctx.metadata.framework.version_companions() {
            let (Some(primary_spec), Some(companion_spec)) = (
                pwa::declared_version(&package, primary),
                pwa::declared_version(&package, companion),
            ) else {
                continue;
            };
            let (Some(a), Some(b)) = (pwa::major_version(primary_spec), pwa::major_version(companion_spec)) else {
                continue;
            };
            if a != b {
                issues.push(
                    Issue::new(
                        file.path,
                        format!(
                            "{} {} does not match {} {}",
                            companion, companion_spec, primary, primary_spec
                        ),
                    )
                    .with_subject(*companion),
                );
            }
        }
        Ok(issues)
    }
}

// Project-level rules

struct ServiceWorkerMissing;

impl IssueRule for ServiceWorkerMissing {
    fn id(&self) -> &str {
        ids::SERVICE_WORKER_MISSING
    }
    fn name(&self) -> &str {
        "Service worker missing"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn description(&self) -> &str {
        "Offline, push and background sync features need a service worker"
    }
    fn applies_to(&self, metadata: &ProjectMetadata) -> bool {
        metadata.needs_service_worker()
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        RuleScope::Project
    }
    fn check_project(&self, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let path = ctx.metadata.framework.service_worker_path();
        let present = [path, "public/service-worker.js", "src/service-worker.js", "public/sw.js"]
            .iter()
            .any(|p| ctx.tree.contains(p));
        if present {
            return Ok(Vec::new());
        }
        let features: Vec<&str> = ctx
            .metadata
            .features
            .iter()
            .filter(|f| f.needs_service_worker())
            .map(|f| f.as_str())
            .collect();
        Ok(vec![Issue::new(
            path,
            format!("Service worker is missing but required by: {}", features.join(", ")),
        )])
    }
}

struct TsconfigMissing;

impl IssueRule for TsconfigMissing {
    fn id(&self) -> &str {
        ids::TSCONFIG_MISSING
    }
    fn name(&self) -> &str {
        "tsconfig.json missing"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        RuleScope::Project
    }
    fn check_project(&self, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let has_ts = ctx
            .tree
            .paths()
            .any(|p| p.starts_with("src/") && (p.ends_with(".ts") || p.ends_with(".tsx")));
        if !has_ts || ctx.tree.contains("tsconfig.json") {
            return Ok(Vec::new());
        }
        Ok(vec![Issue::new(
            "tsconfig.json",
            "TypeScript sources are present but tsconfig.json is missing",
        )])
    }
}

struct PathCollision;

impl IssueRule for PathCollision {
    fn id(&self) -> &str {
        ids::PATH_COLLISION
    }
    fn name(&self) -> &str {
        "Case-insensitive path collision"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn description(&self) -> &str {
        "Paths differing only by case break on case-insensitive file systems"
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        RuleScope::Project
    }
    fn check_project(&self, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for path in ctx.tree.all_paths() {
            groups.entry(path.to_ascii_lowercase()).or_default().push(path);
        }

        Ok(groups
            .into_values()
            .filter(|paths| paths.len() > 1)
            .map(|paths| {
                Issue::new(paths[0], format!("Paths differ only by case: {}", paths.join(", ")))
                    .with_suggested_fix("Rename files so their paths differ by more than letter case")
            })
            .collect())
    }
}

// Source rules

struct ImportSeparator;

impl IssueRule for ImportSeparator {
    fn id(&self) -> &str {
        ids::IMPORT_SEPARATOR
    }
    fn name(&self) -> &str {
        "Backslash in import path"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        source_scope()
    }
    fn check_file(&self, file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        Ok(pwa::parse_imports(file.content)
            .into_iter()
            .filter(|i| i.specifier.contains('\\'))
            .map(|i| {
                Issue::new(file.path, format!("Import '{}' uses backslash separators", i.specifier))
                    .with_line(i.line)
                    .with_subject(i.specifier)
            })
            .collect())
    }
}

struct ImportCasing;

impl IssueRule for ImportCasing {
    fn id(&self) -> &str {
        ids::IMPORT_CASING
    }
    fn name(&self) -> &str {
        "Import path case mismatch"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        source_scope()
    }
    fn check_file(&self, file: &SourceFile<'_>, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let mut issues = Vec::new();
        for import in pwa::parse_imports(file.content) {
            if !import.is_relative() || import.specifier.contains('\\') {
                continue;
            }
            if let ImportResolution::CaseMismatch { actual, corrected } =
                pwa::resolve_import(ctx.tree, file.path, &import.specifier)
            {
                issues.push(
                    Issue::new(
                        file.path,
                        format!("Import '{}' differs in case from '{}'", import.specifier, actual),
                    )
                    .with_line(import.line)
                    .with_subject(import.specifier)
                    .with_suggested_fix(format!("Change the import to '{}'", corrected)),
                );
            }
        }
        Ok(issues)
    }
}

struct ImportUnresolved;

impl IssueRule for ImportUnresolved {
    fn id(&self) -> &str {
        ids::IMPORT_UNRESOLVED
    }
    fn name(&self) -> &str {
        "Unresolved import"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Structural
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        source_scope()
    }
    fn check_file(&self, file: &SourceFile<'_>, ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let mut issues = Vec::new();
        for import in pwa::parse_imports(file.content) {
            if !import.is_relative() || import.specifier.contains('\\') {
                continue;
            }
            if pwa::resolve_import(ctx.tree, file.path, &import.specifier) == ImportResolution::Unresolved {
                issues.push(
                    Issue::new(file.path, format!("Import '{}' cannot be resolved", import.specifier))
                        .with_line(import.line)
                        .with_subject(import.specifier)
                        .with_suggested_fix("Create the missing module or correct the import path"),
                );
            }
        }
        Ok(issues)
    }
}

struct DuplicateImport;

impl IssueRule for DuplicateImport {
    fn id(&self) -> &str {
        ids::DUPLICATE_IMPORT
    }
    fn name(&self) -> &str {
        "Duplicate import"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Style
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        source_scope()
    }
    fn check_file(&self, file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        let mut seen = HashSet::new();
        let mut issues = Vec::new();
        for import in pwa::parse_imports(file.content) {
            let statement = normalize_statement(&file.content[import.statement_start..import.statement_end]);
            if !seen.insert(statement) {
                issues.push(
                    Issue::new(file.path, format!("'{}' is imported twice with the same bindings", import.specifier))
                        .with_line(import.line)
                        .with_subject(import.specifier),
                );
            }
        }
        Ok(issues)
    }
}

/// Whitespace- and quote-insensitive form of an import statement.
pub(crate) fn normalize_statement(statement: &str) -> String {
    statement
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .replace('"', "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

struct DebugLogging;

impl IssueRule for DebugLogging {
    fn id(&self) -> &str {
        ids::DEBUG_LOGGING
    }
    fn name(&self) -> &str {
        "Debug logging left in sources"
    }
    fn category(&self) -> FindingCategory {
        FindingCategory::Style
    }
    fn scope(&self, _ctx: &DetectContext<'_>) -> RuleScope {
        source_scope()
    }
    fn check_file(&self, file: &SourceFile<'_>, _ctx: &DetectContext<'_>) -> PolicyResult<Vec<Issue>> {
        if is_test_file(file.path) {
            return Ok(Vec::new());
        }
        let lines: Vec<usize> = file
            .content
            .lines()
            .enumerate()
            .filter(|(_, l)| l.contains("console.log("))
            .map(|(i, _)| i + 1)
            .collect();
        let Some(first) = lines.first() else {
            return Ok(Vec::new());
        };
        Ok(vec![Issue::new(file.path, format!("{} console.log call(s) left in source", lines.len()))
            .with_line(*first)
            .with_suggested_fix("Remove console.log calls before shipping")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{Feature, ProjectTree};

    fn ctx<'a>(tree: &'a ProjectTree, metadata: &'a ProjectMetadata) -> DetectContext<'a> {
        DetectContext { tree, metadata }
    }

    fn check(rule: &dyn IssueRule, tree: &ProjectTree, metadata: &ProjectMetadata, path: &str) -> Vec<Issue> {
        let file = SourceFile {
            path,
            content: tree.get(path).unwrap(),
        };
        rule.check_file(&file, &ctx(tree, metadata)).unwrap()
    }

    #[test]
    fn test_manifest_missing_uses_framework_path() {
        let tree = ProjectTree::new();
        let metadata = ProjectMetadata::new("app", Framework::Angular);

        let issues = ManifestMissing.check_project(&ctx(&tree, &metadata)).unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].file, "src/manifest.webmanifest");
    }

    #[test]
    fn test_manifest_syntax_reports_line() {
        let tree = ProjectTree::from_files([("public/manifest.json", "{\n  \"name\": \"x\",\n}")]);
        let metadata = ProjectMetadata::new("app", Framework::React);

        let issues = check(&ManifestSyntax, &tree, &metadata, "public/manifest.json");

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(3));
        assert!(issues[0].suggested_fix.is_some());
    }

    #[test]
    fn test_manifest_incomplete_lists_each_key() {
        let tree = ProjectTree::from_files([(
            "public/manifest.json",
            r#"{"name":"x","short_name":"x","start_url":"/","display":"standalone","icons":[]}"#,
        )]);
        let metadata = ProjectMetadata::new("app", Framework::React);

        let issues = check(&ManifestIncomplete, &tree, &metadata, "public/manifest.json");
        let subjects: Vec<_> = issues.iter().filter_map(|i| i.subject.as_deref()).collect();

        assert_eq!(subjects, vec!["background_color", "theme_color"]);
    }

    #[test]
    fn test_icon_missing_resolves_binary_assets() {
        let mut tree = ProjectTree::from_files([(
            "public/manifest.json",
            r#"{"icons":[{"src":"/icons/a.png"},{"src":"icons/b.png"},{"src":"https://cdn/x.png"}]}"#,
        )]);
        tree.insert_binary("public/icons/a.png", vec![0u8, 159]);
        let metadata = ProjectMetadata::new("app", Framework::React);

        let issues = check(&IconMissing, &tree, &metadata, "public/manifest.json");

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].subject.as_deref(), Some("icons/b.png"));
    }

    #[test]
    fn test_html_tag_detection() {
        assert!(has_tag_with("<LINK REL=\"manifest\" href=\"/m.json\">", "link", "rel", "manifest"));
        assert!(has_tag_with("<meta content='#fff' name='theme-color'>", "meta", "name", "theme-color"));
        assert!(!has_tag_with("<link rel=\"icon\"><p rel=\"manifest\">", "link", "rel", "manifest"));
    }

    #[test]
    fn test_dependency_rules() {
        let tree = ProjectTree::from_files([(
            "package.json",
            r#"{"scripts":{"dev":"vite"},"dependencies":{"react":"^18.2.0","react-dom":"^17.0.2"},"devDependencies":{"vite":"^5.0.0"}}"#,
        )]);
        let metadata = ProjectMetadata::new("app", Framework::React);

        let scripts = check(&ScriptMissing, &tree, &metadata, "package.json");
        let missing = check(&DependencyMissing, &tree, &metadata, "package.json");
        let mismatch = check(&DependencyMismatch, &tree, &metadata, "package.json");

        assert_eq!(scripts[0].subject.as_deref(), Some("build"));
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].subject.as_deref(), Some("@vitejs/plugin-react"));
        assert_eq!(mismatch.len(), 1);
        assert_eq!(mismatch[0].subject.as_deref(), Some("react-dom"));
    }

    #[test]
    fn test_service_worker_only_for_offline_features() {
        let rule = ServiceWorkerMissing;
        let plain = ProjectMetadata::new("app", Framework::Vue);
        let offline = plain.clone().with_feature(Feature::Offline);

        assert!(!rule.applies_to(&plain));
        assert!(rule.applies_to(&offline));

        let tree = ProjectTree::new();
        let issues = rule.check_project(&ctx(&tree, &offline)).unwrap();
        assert_eq!(issues[0].file, "public/sw.js");
    }

    #[test]
    fn test_import_rules() {
        let tree = ProjectTree::from_files([
            (
                "src/main.jsx",
                "import App from './app';\nimport Nav from './components\\Nav';\nimport Gone from './Gone';\nimport React from 'react';\n",
            ),
            ("src/App.jsx", ""),
            ("src/components/Nav.jsx", ""),
        ]);
        let metadata = ProjectMetadata::new("app", Framework::React);

        let casing = check(&ImportCasing, &tree, &metadata, "src/main.jsx");
        let separator = check(&ImportSeparator, &tree, &metadata, "src/main.jsx");
        let unresolved = check(&ImportUnresolved, &tree, &metadata, "src/main.jsx");

        assert_eq!(casing.len(), 1);
        assert_eq!(casing[0].subject.as_deref(), Some("./app"));
        assert_eq!(separator[0].line, Some(2));
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].subject.as_deref(), Some("./Gone"));
    }

    #[test]
    fn test_duplicate_import_ignores_quote_style() {
        let tree = ProjectTree::from_files([(
            "src/main.js",
            "import './style.css';\nimport \"./style.css\"\nimport { a } from './a';\nimport { b } from './a';\n",
        )]);
        let metadata = ProjectMetadata::new("app", Framework::Vanilla);

        let issues = check(&DuplicateImport, &tree, &metadata, "src/main.js");

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(2));
    }

    #[test]
    fn test_path_collision() {
        let tree = ProjectTree::from_files([("src/App.jsx", ""), ("src/app.jsx", ""), ("src/b.js", "")]);
        let metadata = ProjectMetadata::new("app", Framework::React);

        let issues = PathCollision.check_project(&ctx(&tree, &metadata)).unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].file, "src/App.jsx");
    }

    #[test]
    fn test_debug_logging_skips_tests() {
        let tree = ProjectTree::from_files([
            ("src/a.js", "let x = 1;\nconsole.log(x);\nconsole.log(2);\n"),
            ("src/a.test.js", "console.log(1);\n"),
        ]);
        let metadata = ProjectMetadata::new("app", Framework::Vanilla);

        let issues = check(&DebugLogging, &tree, &metadata, "src/a.js");
        assert_eq!(issues[0].line, Some(2));
        assert!(check(&DebugLogging, &tree, &metadata, "src/a.test.js").is_empty());
    }
}

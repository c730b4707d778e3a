//! Built-in fix strategies.
//!
//! Every strategy edits exactly one file, the finding's `file`, through the
//! slot handed in by the fix engine. Confidences are fixed per strategy.

use std::collections::HashSet;
use std::sync::Arc;

use forge_core::Finding;
use serde_json::{Map, Value};

use crate::catalog::{FixContext, FixStrategy, IssueCatalog};
use crate::error::{FixError, PolicyResult};
use crate::pwa::{self, ImportResolution};
use crate::rules::{ids, normalize_statement};

/// Register every built-in strategy. Rules must already be registered.
pub fn register_builtin(catalog: &mut IssueCatalog) -> PolicyResult<()> {
    let strategies: Vec<Arc<dyn FixStrategy>> = vec![
        Arc::new(CreateManifest),
        Arc::new(FillManifestKey),
        Arc::new(CreateIndexHtml),
        Arc::new(LinkManifest),
        Arc::new(AddThemeColor),
        Arc::new(CreatePackageJson),
        Arc::new(AddScript),
        Arc::new(AddDependency),
        Arc::new(AlignDependency),
        Arc::new(CreateServiceWorker),
        Arc::new(CreateTsconfig),
        Arc::new(NormalizeImportSeparators),
        Arc::new(FixImportCasing),
        Arc::new(RemoveDuplicateImport),
    ];
    for strategy in strategies {
        catalog.register_strategy(strategy)?;
    }
    Ok(())
}

fn create(slot: &mut Option<String>, content: String) -> Result<(), FixError> {
    if slot.is_some() {
        return Err(FixError::Precondition("file already exists".to_string()));
    }
    *slot = Some(content);
    Ok(())
}

fn read_object(slot: &Option<String>) -> Result<Map<String, Value>, FixError> {
    let content = slot
        .as_deref()
        .ok_or_else(|| FixError::Precondition("file does not exist".to_string()))?;
    pwa::parse_object(content)
        .ok_or_else(|| FixError::Precondition("file is not a JSON object".to_string()))
}

fn write_json(slot: &mut Option<String>, value: &Value) -> Result<(), FixError> {
    let content = pwa::to_pretty_json(value).map_err(|e| FixError::Failed(e.to_string()))?;
    *slot = Some(content);
    Ok(())
}

fn subject(finding: &Finding) -> Result<&str, FixError> {
    finding
        .subject
        .as_deref()
        .ok_or_else(|| FixError::Precondition("finding has no subject".to_string()))
}

fn tree_object(finding: &Finding, ctx: &FixContext<'_>) -> Option<Map<String, Value>> {
    ctx.tree.get(&finding.file).and_then(pwa::parse_object)
}

// Manifest

struct CreateManifest;

impl FixStrategy for CreateManifest {
    fn name(&self) -> &str {
        "create-manifest"
    }
    fn rule_id(&self) -> &str {
        ids::MANIFEST_MISSING
    }
    fn confidence(&self) -> f64 {
        1.0
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        !ctx.tree.has_file(&finding.file)
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        let manifest = pwa::default_manifest(ctx.metadata);
        let content = pwa::to_pretty_json(&manifest).map_err(|e| FixError::Failed(e.to_string()))?;
        create(slot, content)?;
        Ok(format!("Created {} from project metadata", finding.file))
    }
}

struct FillManifestKey;

impl FixStrategy for FillManifestKey {
    fn name(&self) -> &str {
        "fill-manifest-key"
    }
    fn rule_id(&self) -> &str {
        ids::MANIFEST_INCOMPLETE
    }
    fn confidence(&self) -> f64 {
        0.95
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        let known = finding
            .subject
            .as_deref()
            .map_or(false, |k| pwa::REQUIRED_MANIFEST_KEYS.contains(&k));
        known && tree_object(finding, ctx).is_some()
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        let key = subject(finding)?;
        let mut manifest = read_object(slot)?;
        if manifest.contains_key(key) {
            return Err(FixError::Precondition(format!("'{}' is already present", key)));
        }
        let value = pwa::default_manifest_value(key, ctx.metadata)
            .ok_or_else(|| FixError::Failed(format!("no default for manifest key '{}'", key)))?;
        manifest.insert(key.to_string(), value);
        write_json(slot, &Value::Object(manifest))?;
        Ok(format!("Added '{}' to {}", key, finding.file))
    }
}

// HTML entry

struct CreateIndexHtml;

impl FixStrategy for CreateIndexHtml {
    fn name(&self) -> &str {
        "create-index-html"
    }
    fn rule_id(&self) -> &str {
        ids::INDEX_MISSING
    }
    fn confidence(&self) -> f64 {
        0.9
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        !ctx.tree.has_file(&finding.file)
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        create(slot, pwa::default_index_html(ctx.tree, ctx.metadata))?;
        Ok(format!("Created {}", finding.file))
    }
}

struct LinkManifest;

impl FixStrategy for LinkManifest {
    fn name(&self) -> &str {
        "link-manifest"
    }
    fn rule_id(&self) -> &str {
        ids::MANIFEST_UNLINKED
    }
    fn confidence(&self) -> f64 {
        0.9
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        ctx.tree
            .get(&finding.file)
            .map_or(false, |html| pwa::head_close(html).is_some())
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        let html = slot
            .as_deref()
            .ok_or_else(|| FixError::Precondition("file does not exist".to_string()))?;
        let href = pwa::manifest_href(pwa::manifest_path(ctx.tree, ctx.metadata), &ctx.metadata.framework);
        let element = format!("<link rel=\"manifest\" href=\"{}\" />", href);
        let updated = pwa::insert_in_head(html, &element)
            .ok_or_else(|| FixError::Precondition("document has no </head>".to_string()))?;
        *slot = Some(updated);
        Ok(format!("Linked {} from {}", href, finding.file))
    }
}

struct AddThemeColor;

impl FixStrategy for AddThemeColor {
    fn name(&self) -> &str {
        "add-theme-color"
    }
    fn rule_id(&self) -> &str {
        ids::THEME_COLOR_MISSING
    }
    fn confidence(&self) -> f64 {
        0.85
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        ctx.tree
            .get(&finding.file)
            .map_or(false, |html| pwa::head_close(html).is_some())
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        let html = slot
            .as_deref()
            .ok_or_else(|| FixError::Precondition("file does not exist".to_string()))?;

        // Keep the page in sync with the manifest when it declares a color.
        let color = pwa::locate_manifest(ctx.tree, ctx.metadata)
            .and_then(|path| ctx.tree.get(path))
            .and_then(pwa::parse_object)
            .and_then(|m| m.get("theme_color").and_then(|c| c.as_str()).map(str::to_string))
            .unwrap_or_else(|| pwa::DEFAULT_THEME_COLOR.to_string());

        let element = format!("<meta name=\"theme-color\" content=\"{}\" />", color);
        let updated = pwa::insert_in_head(html, &element)
            .ok_or_else(|| FixError::Precondition("document has no </head>".to_string()))?;
        *slot = Some(updated);
        Ok(format!("Added theme-color {} to {}", color, finding.file))
    }
}

// package.json

struct CreatePackageJson;

impl FixStrategy for CreatePackageJson {
    fn name(&self) -> &str {
        "create-package-json"
    }
    fn rule_id(&self) -> &str {
        ids::PACKAGE_MISSING
    }
    fn confidence(&self) -> f64 {
        0.9
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        !ctx.tree.has_file(&finding.file)
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        let package = pwa::default_package_json(ctx.metadata);
        let content = pwa::to_pretty_json(&package).map_err(|e| FixError::Failed(e.to_string()))?;
        create(slot, content)?;
        Ok(format!("Created {} for {}", finding.file, ctx.metadata.framework))
    }
}

struct AddScript;

impl FixStrategy for AddScript {
    fn name(&self) -> &str {
        "add-script"
    }
    fn rule_id(&self) -> &str {
        ids::SCRIPT_MISSING
    }
    fn confidence(&self) -> f64 {
        0.9
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        let known = finding.subject.as_deref().map_or(false, |s| {
            ctx.metadata.framework.default_scripts().iter().any(|(name, _)| *name == s)
        });
        known && tree_object(finding, ctx).is_some()
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        let script = subject(finding)?;
        let command = ctx
            .metadata
            .framework
            .default_scripts()
            .iter()
            .find(|(name, _)| *name == script)
            .map(|(_, command)| *command)
            .ok_or_else(|| FixError::Precondition(format!("no default for script '{}'", script)))?;

        let mut package = read_object(slot)?;
        let scripts = package
            .entry("scripts")
            .or_insert_with(|| Value::Object(Map::new()));
        let scripts = scripts
            .as_object_mut()
            .ok_or_else(|| FixError::Failed("'scripts' is not an object".to_string()))?;
        scripts.insert(script.to_string(), Value::String(command.to_string()));

        write_json(slot, &Value::Object(package))?;
        Ok(format!("Added script '{}': {}", script, command))
    }
}

struct AddDependency;

impl AddDependency {
    fn lookup(ctx: &FixContext<'_>, name: &str) -> Option<(&'static str, &'static str)> {
        let framework = &ctx.metadata.framework;
        if let Some((_, version)) = framework.required_dependencies().iter().find(|(n, _)| *n == name) {
            return Some(("dependencies", *version));
        }
        framework
            .required_dev_dependencies()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, version)| ("devDependencies", *version))
    }
}

impl FixStrategy for AddDependency {
    fn name(&self) -> &str {
        "add-dependency"
    }
    fn rule_id(&self) -> &str {
        ids::DEPENDENCY_MISSING
    }
    fn confidence(&self) -> f64 {
        0.85
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        let known = finding
            .subject
            .as_deref()
            .map_or(false, |s| Self::lookup(ctx, s).is_some());
        known && tree_object(finding, ctx).is_some()
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        let name = subject(finding)?;
        let (section, version) = Self::lookup(ctx, name)
            .ok_or_else(|| FixError::Precondition(format!("'{}' is not a framework dependency", name)))?;

        let mut package = read_object(slot)?;
        let deps = package
            .entry(section)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| FixError::Failed(format!("'{}' is not an object", section)))?;
        deps.insert(name.to_string(), Value::String(version.to_string()));

        write_json(slot, &Value::Object(package))?;
        Ok(format!("Added {} {} to {}", name, version, section))
    }
}

struct AlignDependency;

impl AlignDependency {
    fn primary_for(ctx: &FixContext<'_>, companion: &str) -> Option<&'static str> {
        ctx.metadata
            .framework
            .version_companions()
            .iter()
            .find(|(_, c)| *c == companion)
            .map(|(p, _)| *p)
    }
}

impl FixStrategy for AlignDependency {
    fn name(&self) -> &str {
        "align-dependency"
    }
    fn rule_id(&self) -> &str {
        ids::DEPENDENCY_MISMATCH
    }
    fn confidence(&self) -> f64 {
        0.8
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        let (Some(companion), Some(package)) = (finding.subject.as_deref(), tree_object(finding, ctx)) else {
            return false;
        };
        Self::primary_for(ctx, companion)
            .and_then(|primary| pwa::declared_version(&package, primary))
            .and_then(pwa::major_version)
            .is_some()
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        let companion = subject(finding)?;
        let primary = Self::primary_for(ctx, companion)
            .ok_or_else(|| FixError::Precondition(format!("'{}' has no version companion", companion)))?;

        let mut package = read_object(slot)?;
        let target = pwa::declared_version(&package, primary)
            .ok_or_else(|| FixError::Precondition(format!("'{}' is not declared", primary)))?
            .to_string();

        let section = ["dependencies", "devDependencies"]
            .into_iter()
            .find(|s| package.get(*s).and_then(|d| d.get(companion)).is_some())
            .ok_or_else(|| FixError::Precondition(format!("'{}' is not declared", companion)))?;
        if let Some(deps) = package.get_mut(section).and_then(|d| d.as_object_mut()) {
            deps.insert(companion.to_string(), Value::String(target.clone()));
        }

        write_json(slot, &Value::Object(package))?;
        Ok(format!("Aligned {} to {} ({})", companion, target, primary))
    }
}

// Project files

struct CreateServiceWorker;

impl FixStrategy for CreateServiceWorker {
    fn name(&self) -> &str {
        "create-service-worker"
    }
    fn rule_id(&self) -> &str {
        ids::SERVICE_WORKER_MISSING
    }
    fn confidence(&self) -> f64 {
        0.9
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        !ctx.tree.has_file(&finding.file)
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        create(slot, pwa::default_service_worker(ctx.metadata))?;
        Ok(format!("Created cache-first service worker at {}", finding.file))
    }
}

struct CreateTsconfig;

impl FixStrategy for CreateTsconfig {
    fn name(&self) -> &str {
        "create-tsconfig"
    }
    fn rule_id(&self) -> &str {
        ids::TSCONFIG_MISSING
    }
    fn confidence(&self) -> f64 {
        0.9
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        !ctx.tree.has_file(&finding.file)
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        let config = pwa::default_tsconfig(ctx.metadata);
        let content = pwa::to_pretty_json(&config).map_err(|e| FixError::Failed(e.to_string()))?;
        create(slot, content)?;
        Ok(format!("Created {}", finding.file))
    }
}

// Imports

struct NormalizeImportSeparators;

impl FixStrategy for NormalizeImportSeparators {
    fn name(&self) -> &str {
        "normalize-import-separators"
    }
    fn rule_id(&self) -> &str {
        ids::IMPORT_SEPARATOR
    }
    fn confidence(&self) -> f64 {
        0.95
    }
    fn can_fix(&self, finding: &Finding, _ctx: &FixContext<'_>) -> bool {
        finding.subject.is_some()
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, _ctx: &FixContext<'_>) -> Result<String, FixError> {
        let specifier = subject(finding)?;
        let normalized = specifier.replace('\\', "/");
        let content = slot
            .as_deref()
            .ok_or_else(|| FixError::Precondition("file does not exist".to_string()))?;
        let updated = pwa::rewrite_import(content, specifier, &normalized)
            .ok_or_else(|| FixError::Failed(format!("import '{}' not found", specifier)))?;
        *slot = Some(updated);
        Ok(format!("Rewrote import '{}' as '{}'", specifier, normalized))
    }
}

struct FixImportCasing;

impl FixImportCasing {
    fn corrected(finding: &Finding, ctx: &FixContext<'_>) -> Option<String> {
        let specifier = finding.subject.as_deref()?;
        match pwa::resolve_import(ctx.tree, &finding.file, specifier) {
            ImportResolution::CaseMismatch { corrected, .. } => Some(corrected),
            _ => None,
        }
    }
}

impl FixStrategy for FixImportCasing {
    fn name(&self) -> &str {
        "fix-import-casing"
    }
    fn rule_id(&self) -> &str {
        ids::IMPORT_CASING
    }
    fn confidence(&self) -> f64 {
        0.9
    }
    fn can_fix(&self, finding: &Finding, ctx: &FixContext<'_>) -> bool {
        Self::corrected(finding, ctx).is_some()
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, ctx: &FixContext<'_>) -> Result<String, FixError> {
        let specifier = subject(finding)?;
        let corrected = Self::corrected(finding, ctx)
            .ok_or_else(|| FixError::Precondition(format!("'{}' has no case-only match", specifier)))?;
        let content = slot
            .as_deref()
            .ok_or_else(|| FixError::Precondition("file does not exist".to_string()))?;
        let updated = pwa::rewrite_import(content, specifier, &corrected)
            .ok_or_else(|| FixError::Failed(format!("import '{}' not found", specifier)))?;
        *slot = Some(updated);
        Ok(format!("Changed import '{}' to '{}'", specifier, corrected))
    }
}

struct RemoveDuplicateImport;

impl FixStrategy for RemoveDuplicateImport {
    fn name(&self) -> &str {
        "remove-duplicate-import"
    }
    fn rule_id(&self) -> &str {
        ids::DUPLICATE_IMPORT
    }
    fn confidence(&self) -> f64 {
        0.85
    }
    fn apply(&self, finding: &Finding, slot: &mut Option<String>, _ctx: &FixContext<'_>) -> Result<String, FixError> {
        let specifier = subject(finding)?;
        let content = slot
            .as_deref()
            .ok_or_else(|| FixError::Precondition("file does not exist".to_string()))?;

        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for import in pwa::parse_imports(content) {
            let statement = normalize_statement(&content[import.statement_start..import.statement_end]);
            if !seen.insert(statement) && import.specifier == specifier {
                duplicates.push((import.statement_start, import.statement_end));
            }
        }
        if duplicates.is_empty() {
            return Err(FixError::Failed(format!("no duplicate import of '{}'", specifier)));
        }

        let mut updated = content.to_string();
        for (start, end) in duplicates.iter().rev() {
            // Take the line break with the statement so no blank line is left.
            let end = if updated[*end..].starts_with('\n') { end + 1 } else { *end };
            updated.replace_range(*start..end, "");
        }
        *slot = Some(updated);
        Ok(format!("Removed {} duplicate import(s) of '{}'", duplicates.len(), specifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{FindingCategory, Framework, ProjectMetadata, ProjectTree};

    fn finding(kind: &str, file: &str, subject: Option<&str>) -> Finding {
        let finding = Finding::new(kind, FindingCategory::Structural, file, "test");
        match subject {
            Some(s) => finding.with_subject(s),
            None => finding,
        }
    }

    fn run(
        strategy: &dyn FixStrategy,
        tree: &ProjectTree,
        metadata: &ProjectMetadata,
        finding: &Finding,
    ) -> Result<Option<String>, FixError> {
        let ctx = FixContext { tree, metadata };
        let mut slot = tree.get(&finding.file).map(str::to_string);
        strategy.apply(finding, &mut slot, &ctx)?;
        Ok(slot)
    }

    #[test]
    fn test_create_manifest_refuses_existing_file() {
        let tree = ProjectTree::from_files([("public/manifest.json", "{}")]);
        let metadata = ProjectMetadata::new("app", Framework::React);
        let f = finding(ids::MANIFEST_MISSING, "public/manifest.json", None);

        assert!(!CreateManifest.can_fix(&f, &FixContext { tree: &tree, metadata: &metadata }));
        assert!(matches!(
            run(&CreateManifest, &tree, &metadata, &f),
            Err(FixError::Precondition(_))
        ));
    }

    #[test]
    fn test_fill_manifest_key_preserves_order() {
        let tree = ProjectTree::from_files([("public/manifest.json", r#"{"name":"Shop","display":"standalone"}"#)]);
        let metadata = ProjectMetadata::new("Shop", Framework::React);
        let f = finding(ids::MANIFEST_INCOMPLETE, "public/manifest.json", Some("theme_color"));

        let content = run(&FillManifestKey, &tree, &metadata, &f).unwrap().unwrap();
        let keys: Vec<String> = pwa::parse_object(&content).unwrap().keys().cloned().collect();

        assert_eq!(keys, vec!["name", "display", "theme_color"]);
    }

    #[test]
    fn test_link_manifest_and_theme_color() {
        let html = "<html>\n  <head>\n    <title>x</title>\n  </head>\n</html>\n";
        let tree = ProjectTree::from_files([
            ("index.html", html),
            ("public/manifest.json", r##"{"theme_color":"#123456"}"##),
        ]);
        let metadata = ProjectMetadata::new("app", Framework::Vue);

        let linked = run(&LinkManifest, &tree, &metadata, &finding(ids::MANIFEST_UNLINKED, "index.html", None))
            .unwrap()
            .unwrap();
        let themed = run(&AddThemeColor, &tree, &metadata, &finding(ids::THEME_COLOR_MISSING, "index.html", None))
            .unwrap()
            .unwrap();

        assert!(linked.contains("<link rel=\"manifest\" href=\"/manifest.json\" />"));
        assert!(themed.contains("content=\"#123456\""));
    }

    #[test]
    fn test_add_dependency_picks_section() {
        let tree = ProjectTree::from_files([("package.json", r#"{"name":"x","dependencies":{"react":"^18.2.0"}}"#)]);
        let metadata = ProjectMetadata::new("x", Framework::React);

        let content = run(
            &AddDependency,
            &tree,
            &metadata,
            &finding(ids::DEPENDENCY_MISSING, "package.json", Some("vite")),
        )
        .unwrap()
        .unwrap();
        let package = pwa::parse_object(&content).unwrap();

        assert_eq!(package["devDependencies"]["vite"], "^5.0.0");
        assert_eq!(package["dependencies"]["react"], "^18.2.0");
    }

    #[test]
    fn test_align_dependency() {
        let tree = ProjectTree::from_files([(
            "package.json",
            r#"{"dependencies":{"react":"^18.2.0","react-dom":"^17.0.2"}}"#,
        )]);
        let metadata = ProjectMetadata::new("x", Framework::React);
        let f = finding(ids::DEPENDENCY_MISMATCH, "package.json", Some("react-dom"));

        assert!(AlignDependency.can_fix(&f, &FixContext { tree: &tree, metadata: &metadata }));
        let content = run(&AlignDependency, &tree, &metadata, &f).unwrap().unwrap();

        assert_eq!(pwa::parse_object(&content).unwrap()["dependencies"]["react-dom"], "^18.2.0");
    }

    #[test]
    fn test_import_fixes() {
        let tree = ProjectTree::from_files([
            ("src/main.jsx", "import App from './app';\nimport Nav from './components\\Nav';\n"),
            ("src/App.jsx", ""),
            ("src/components/Nav.jsx", ""),
        ]);
        let metadata = ProjectMetadata::new("x", Framework::React);

        let cased = run(
            &FixImportCasing,
            &tree,
            &metadata,
            &finding(ids::IMPORT_CASING, "src/main.jsx", Some("./app")),
        )
        .unwrap()
        .unwrap();
        let separated = run(
            &NormalizeImportSeparators,
            &tree,
            &metadata,
            &finding(ids::IMPORT_SEPARATOR, "src/main.jsx", Some("./components\\Nav")),
        )
        .unwrap()
        .unwrap();

        assert!(cased.starts_with("import App from './App';"));
        assert!(separated.contains("from './components/Nav';"));
    }

    #[test]
    fn test_remove_duplicate_import_keeps_first() {
        let source = "import './a.css';\nimport x from './x';\nimport './a.css';\n";
        let tree = ProjectTree::from_files([("src/main.js", source)]);
        let metadata = ProjectMetadata::new("x", Framework::Vanilla);

        let content = run(
            &RemoveDuplicateImport,
            &tree,
            &metadata,
            &finding(ids::DUPLICATE_IMPORT, "src/main.js", Some("./a.css")),
        )
        .unwrap()
        .unwrap();

        assert_eq!(content, "import './a.css';\nimport x from './x';\n");
    }
}

//! Shared PWA conventions: default file contents, manifest lookup, JSON
//! helpers and import parsing/resolution.

use std::sync::OnceLock;

use forge_core::{Framework, ProjectMetadata, ProjectTree};
use regex::Regex;
use serde_json::{json, Map, Value};

/// Keys every web app manifest must carry.
pub const REQUIRED_MANIFEST_KEYS: &[&str] = &[
    "name",
    "short_name",
    "start_url",
    "display",
    "background_color",
    "theme_color",
    "icons",
];

pub const DEFAULT_THEME_COLOR: &str = "#1976d2";

/// Globs of application sources whose imports are checked.
pub const SOURCE_GLOBS: &[&str] = &[
    "src/**/*.js",
    "src/**/*.jsx",
    "src/**/*.mjs",
    "src/**/*.ts",
    "src/**/*.tsx",
    "src/**/*.vue",
    "src/**/*.svelte",
];

/// Extensions tried when resolving an extensionless import.
const RESOLVE_EXTENSIONS: &[&str] = &[
    ".js", ".jsx", ".mjs", ".ts", ".tsx", ".vue", ".svelte", ".json", ".css",
];

/// Alternative manifest locations accepted when the conventional one is absent.
const MANIFEST_ALTERNATIVES: &[&str] = &[
    "public/manifest.webmanifest",
    "public/site.webmanifest",
    "public/manifest.json",
    "src/manifest.webmanifest",
    "manifest.json",
];

/// Path of the manifest in this tree, falling back to the framework default.
pub fn manifest_path<'a>(tree: &'a ProjectTree, metadata: &ProjectMetadata) -> &'a str {
    locate_manifest(tree, metadata).unwrap_or_else(|| metadata.framework.manifest_path())
}

/// Path of an existing manifest, if any.
pub fn locate_manifest<'a>(tree: &'a ProjectTree, metadata: &ProjectMetadata) -> Option<&'a str> {
    std::iter::once(metadata.framework.manifest_path())
        .chain(MANIFEST_ALTERNATIVES.iter().copied())
        .find(|candidate| tree.contains(candidate))
}

/// The `href` an HTML page uses to reach the manifest at `path`.
pub fn manifest_href(path: &str, framework: &Framework) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    match framework {
        Framework::Angular => file.to_string(),
        _ => match path.strip_prefix("public/") {
            Some(rest) => format!("/{}", rest),
            None => format!("/{}", path),
        },
    }
}

/// Directory part of a path (`""` for root files).
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// Join and normalize `base/relative`, resolving `.` and `..`.
///
/// Returns `None` when the result would escape the project root.
pub fn join_normalized(base: &str, relative: &str) -> Option<String> {
    let mut parts: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// A short name derived from the application name.
pub fn short_name(name: &str) -> String {
    let trimmed = name.trim();
    let first_word = trimmed.split_whitespace().next().unwrap_or("App");
    if trimmed.chars().count() <= 12 {
        trimmed.to_string()
    } else {
        first_word.chars().take(12).collect()
    }
}

/// Default value for a required manifest key.
pub fn default_manifest_value(key: &str, metadata: &ProjectMetadata) -> Option<Value> {
    let value = match key {
        "name" => json!(metadata.name),
        "short_name" => json!(short_name(&metadata.name)),
        "start_url" => json!("/"),
        "display" => json!("standalone"),
        "background_color" => json!("#ffffff"),
        "theme_color" => json!(DEFAULT_THEME_COLOR),
        "icons" => json!([
            {"src": "icons/icon-192.png", "sizes": "192x192", "type": "image/png"},
            {"src": "icons/icon-512.png", "sizes": "512x512", "type": "image/png"}
        ]),
        _ => return None,
    };
    Some(value)
}

/// A complete manifest for the project.
pub fn default_manifest(metadata: &ProjectMetadata) -> Value {
    let mut manifest = Map::new();
    for key in REQUIRED_MANIFEST_KEYS {
        if let Some(value) = default_manifest_value(key, metadata) {
            manifest.insert(key.to_string(), value);
        }
    }
    Value::Object(manifest)
}

/// A `package.json` wired for the selected framework.
pub fn default_package_json(metadata: &ProjectMetadata) -> Value {
    let to_map = |pairs: &[(&str, &str)]| -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    };

    let framework = &metadata.framework;
    json!({
        "name": sanitize_package_name(&metadata.name),
        "private": true,
        "version": "0.1.0",
        "type": "module",
        "scripts": to_map(framework.default_scripts()),
        "dependencies": to_map(framework.required_dependencies()),
        "devDependencies": to_map(framework.required_dev_dependencies()),
    })
}

/// A `tsconfig.json` suited to a bundler-based PWA.
pub fn default_tsconfig(metadata: &ProjectMetadata) -> Value {
    let mut options = json!({
        "target": "ES2020",
        "module": "ESNext",
        "moduleResolution": "bundler",
        "lib": ["ES2020", "DOM", "DOM.Iterable"],
        "strict": true,
        "skipLibCheck": true,
        "resolveJsonModule": true,
        "isolatedModules": true,
        "noEmit": true
    });
    if metadata.framework == Framework::React {
        options["jsx"] = json!("react-jsx");
    }
    json!({
        "compilerOptions": options,
        "include": ["src"]
    })
}

/// A cache-first service worker precaching the app shell.
pub fn default_service_worker(metadata: &ProjectMetadata) -> String {
    let cache = format!("{}-v1", sanitize_package_name(&metadata.name));
    format!(
        r#"const CACHE_NAME = '{cache}';
const APP_SHELL = ['/', '/index.html', '/manifest.json'];

self.addEventListener('install', (event) => {{
  event.waitUntil(caches.open(CACHE_NAME).then((cache) => cache.addAll(APP_SHELL)));
  self.skipWaiting();
}});

self.addEventListener('activate', (event) => {{
  event.waitUntil(
    caches.keys().then((keys) =>
      Promise.all(keys.filter((key) => key !== CACHE_NAME).map((key) => caches.delete(key)))
    )
  );
  self.clients.claim();
}});

self.addEventListener('fetch', (event) => {{
  if (event.request.method !== 'GET') return;
  event.respondWith(
    caches.match(event.request).then((cached) => cached || fetch(event.request))
  );
}});
"#
    )
}

/// An HTML entry document linking the manifest.
pub fn default_index_html(tree: &ProjectTree, metadata: &ProjectMetadata) -> String {
    let manifest = manifest_href(manifest_path(tree, metadata), &metadata.framework);
    let body = match metadata.framework {
        Framework::Angular => "    <app-root></app-root>\n".to_string(),
        _ => {
            let entry = ["src/main.tsx", "src/main.ts", "src/main.jsx", "src/main.js"]
                .iter()
                .find(|p| tree.contains(p))
                .copied()
                .unwrap_or("src/main.js");
            format!(
                "    <div id=\"app\"></div>\n    <script type=\"module\" src=\"/{}\"></script>\n",
                entry
            )
        }
    };
    format!(
        "<!doctype html>\n<html lang=\"en\">\n  <head>\n    <meta charset=\"UTF-8\" />\n    \
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\" />\n    \
<meta name=\"theme-color\" content=\"{}\" />\n    <link rel=\"manifest\" href=\"{}\" />\n    \
<title>{}</title>\n  </head>\n  <body>\n{}  </body>\n</html>\n",
        DEFAULT_THEME_COLOR, manifest, metadata.name, body
    )
}

/// Normalize an npm package name.
///
/// Lowercase, characters outside `[a-z0-9-._~]` become `-`, runs of `-`
/// collapse, and leading/trailing separators are trimmed. Scoped names keep
/// their `@scope/` prefix.
pub fn sanitize_package_name(name: &str) -> String {
    if let Some((scope, rest)) = name.strip_prefix('@').and_then(|n| n.split_once('/')) {
        let scope = sanitize_segment(scope);
        let rest = sanitize_segment(rest);
        if !scope.is_empty() && !rest.is_empty() {
            return format!("@{}/{}", scope, rest);
        }
    }
    let sanitized = sanitize_segment(name);
    if sanitized.is_empty() {
        "pwa-app".to_string()
    } else {
        sanitized
    }
}

fn sanitize_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.trim().chars().flat_map(char::to_lowercase) {
        let allowed = c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_' | '~');
        let c = if allowed { c } else { '-' };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches(|c| matches!(c, '-' | '.' | '_')).to_string()
}

/// Pretty-printed JSON with a trailing newline.
pub fn to_pretty_json(value: &Value) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

/// Parse a JSON object, returning `None` for anything else.
pub fn parse_object(content: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Version declared for `name` in `dependencies` or `devDependencies`.
pub fn declared_version<'a>(package: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    ["dependencies", "devDependencies"]
        .iter()
        .find_map(|section| package.get(*section)?.get(name)?.as_str())
}

/// Major version of a semver range such as `^18.2.0` or `~17.0`.
pub fn major_version(spec: &str) -> Option<u64> {
    let trimmed = spec.trim().trim_start_matches(|c: char| matches!(c, '^' | '~' | '>' | '=' | '<' | 'v' | ' '));
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Find the case-insensitive `</head>` position.
pub fn head_close(html: &str) -> Option<usize> {
    html.to_ascii_lowercase().find("</head>")
}

/// Insert `element` on its own line just before `</head>`.
pub fn insert_in_head(html: &str, element: &str) -> Option<String> {
    let pos = head_close(html)?;
    let line_start = html[..pos].rfind('\n').map(|i| i + 1).unwrap_or(pos);
    let (before, after) = if html[line_start..pos].trim().is_empty() {
        html.split_at(line_start)
    } else {
        html.split_at(pos)
    };
    Some(format!("{}    {}\n{}", before, element, after))
}

/// A static import found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub specifier: String,
    /// 1-based line of the `import`/`export` keyword
    pub line: usize,
    /// Byte range of the specifier (without quotes)
    pub start: usize,
    pub end: usize,
    /// Byte range of the whole statement
    pub statement_start: usize,
    pub statement_end: usize,
}

impl ImportRef {
    pub fn is_relative(&self) -> bool {
        self.specifier.starts_with("./") || self.specifier.starts_with("../")
            || self.specifier.starts_with(".\\") || self.specifier.starts_with("..\\")
    }
}

fn import_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*(?:import|export)[ \t]+(?:[^'";]*?[ \t\n]from[ \t]*)?['"]([^'"\n]+)['"][ \t]*;?"#).ok()
    })
    .as_ref()
}

/// Static imports of a source file, in order.
pub fn parse_imports(content: &str) -> Vec<ImportRef> {
    let Some(re) = import_regex() else {
        return Vec::new();
    };
    re.captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let spec = caps.get(1)?;
            let keyword_offset = whole.as_str().len() - whole.as_str().trim_start().len();
            let line = content[..whole.start() + keyword_offset].matches('\n').count() + 1;
            Some(ImportRef {
                specifier: spec.as_str().to_string(),
                line,
                start: spec.start(),
                end: spec.end(),
                statement_start: whole.start() + keyword_offset,
                statement_end: whole.end(),
            })
        })
        .collect()
}

/// Replace every import specifier equal to `from` with `to`.
///
/// Returns `None` when no import matched.
pub fn rewrite_import(content: &str, from: &str, to: &str) -> Option<String> {
    let imports: Vec<ImportRef> = parse_imports(content)
        .into_iter()
        .filter(|i| i.specifier == from)
        .collect();
    if imports.is_empty() {
        return None;
    }

    let mut out = content.to_string();
    for import in imports.iter().rev() {
        out.replace_range(import.start..import.end, to);
    }
    Some(out)
}

/// Outcome of resolving a relative import against the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportResolution {
    Resolved(String),
    /// The target exists, but only with different letter case.
    CaseMismatch { actual: String, corrected: String },
    Unresolved,
}

/// Resolve a relative import from `from_file`.
pub fn resolve_import(tree: &ProjectTree, from_file: &str, specifier: &str) -> ImportResolution {
    let Some(joined) = join_normalized(parent_dir(from_file), specifier) else {
        return ImportResolution::Unresolved;
    };

    let mut candidates = vec![joined.clone()];
    candidates.extend(RESOLVE_EXTENSIONS.iter().map(|ext| format!("{}{}", joined, ext)));
    candidates.extend(
        RESOLVE_EXTENSIONS
            .iter()
            .map(|ext| format!("{}/index{}", joined, ext)),
    );

    if let Some(found) = candidates.iter().find(|c| tree.has_file(c)) {
        return ImportResolution::Resolved(found.clone());
    }

    for candidate in &candidates {
        if let Some(actual) = tree.find_case_insensitive(candidate) {
            // ASCII case changes keep byte offsets, so the prefix is the
            // correctly cased form of `joined`.
            let Some(actual_joined) = actual.get(..joined.len()) else {
                continue;
            };
            if let Some(corrected) = recase_specifier(specifier, actual_joined) {
                return ImportResolution::CaseMismatch {
                    actual: actual.to_string(),
                    corrected,
                };
            }
        }
    }

    ImportResolution::Unresolved
}

/// Rewrite the trailing named segments of `specifier` with those of `actual`.
fn recase_specifier(specifier: &str, actual: &str) -> Option<String> {
    let segments: Vec<&str> = specifier.split('/').collect();
    let named = segments
        .iter()
        .rev()
        .take_while(|s| !matches!(**s, "." | ".." | ""))
        .count();
    if named == 0 || segments[..segments.len() - named].iter().any(|s| !matches!(*s, "." | "..")) {
        return None;
    }

    let actual_segments: Vec<&str> = actual.split('/').collect();
    if actual_segments.len() < named {
        return None;
    }
    let prefix = &segments[..segments.len() - named];
    let tail = &actual_segments[actual_segments.len() - named..];
    Some(prefix.iter().chain(tail.iter()).copied().collect::<Vec<_>>().join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_package_name() {
        assert_eq!(sanitize_package_name("My Cool App!"), "my-cool-app");
        assert_eq!(sanitize_package_name("  __weird__  "), "weird");
        assert_eq!(sanitize_package_name("@Acme/Shop App"), "@acme/shop-app");
        assert_eq!(sanitize_package_name("!!!"), "pwa-app");
        assert_eq!(sanitize_package_name("already-fine"), "already-fine");
    }

    #[test]
    fn test_major_version() {
        assert_eq!(major_version("^18.2.0"), Some(18));
        assert_eq!(major_version("~17.0"), Some(17));
        assert_eq!(major_version(">=5"), Some(5));
        assert_eq!(major_version("latest"), None);
    }

    #[test]
    fn test_parse_imports() {
        let source = "import React from 'react';\nimport {\n  a,\n  b\n} from \"./utils\";\nimport './styles.css';\nconst x = 1;\nexport { c } from './c';\n";
        let imports = parse_imports(source);

        let specs: Vec<_> = imports.iter().map(|i| i.specifier.as_str()).collect();
        assert_eq!(specs, vec!["react", "./utils", "./styles.css", "./c"]);
        assert_eq!(imports[1].line, 2);
        assert_eq!(imports[3].line, 8);
        assert_eq!(&source[imports[1].start..imports[1].end], "./utils");
    }

    #[test]
    fn test_rewrite_import() {
        let source = "import App from './app';\nimport x from './app';\n";
        let rewritten = rewrite_import(source, "./app", "./App").unwrap();
        assert_eq!(rewritten, "import App from './App';\nimport x from './App';\n");
        assert!(rewrite_import(source, "./missing", "./x").is_none());
    }

    #[test]
    fn test_resolve_import() {
        let tree = ProjectTree::from_files([
            ("src/main.jsx", ""),
            ("src/App.jsx", ""),
            ("src/components/index.js", ""),
        ]);

        assert_eq!(
            resolve_import(&tree, "src/main.jsx", "./App"),
            ImportResolution::Resolved("src/App.jsx".to_string())
        );
        assert_eq!(
            resolve_import(&tree, "src/main.jsx", "./components"),
            ImportResolution::Resolved("src/components/index.js".to_string())
        );
        assert_eq!(
            resolve_import(&tree, "src/main.jsx", "./app"),
            ImportResolution::CaseMismatch {
                actual: "src/App.jsx".to_string(),
                corrected: "./App".to_string(),
            }
        );
        assert_eq!(
            resolve_import(&tree, "src/main.jsx", "./Missing"),
            ImportResolution::Unresolved
        );
        assert_eq!(
            resolve_import(&tree, "src/main.jsx", "../../outside"),
            ImportResolution::Unresolved
        );
    }

    #[test]
    fn test_insert_in_head() {
        let html = "<html>\n  <head>\n    <title>x</title>\n  </head>\n</html>\n";
        let out = insert_in_head(html, "<link rel=\"manifest\" href=\"/manifest.json\" />").unwrap();
        assert!(out.contains("    <link rel=\"manifest\" href=\"/manifest.json\" />\n  </head>"));
        assert!(insert_in_head("<p>no head</p>", "<x>").is_none());
    }

    #[test]
    fn test_manifest_href() {
        assert_eq!(manifest_href("public/manifest.json", &Framework::React), "/manifest.json");
        assert_eq!(
            manifest_href("src/manifest.webmanifest", &Framework::Angular),
            "manifest.webmanifest"
        );
    }

    #[test]
    fn test_default_manifest_has_required_keys() {
        let metadata = ProjectMetadata::new("Field Notes", Framework::Vue);
        let manifest = default_manifest(&metadata);
        for key in REQUIRED_MANIFEST_KEYS {
            assert!(manifest.get(*key).is_some(), "missing {}", key);
        }
        assert_eq!(manifest["short_name"], "Field Notes");
    }
}

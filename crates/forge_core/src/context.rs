//! Project metadata supplied by the generator.
//!
//! The selected framework and feature list only parameterize which catalog
//! rules apply and what the fix strategies generate; they never change the
//! pipeline itself.

use serde::{Deserialize, Serialize};

use crate::tree::ProjectTree;

/// Frontend framework of the generated project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    React,
    Vue,
    Svelte,
    Angular,
    Vanilla,
    Custom(String),
}

impl Framework {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "react" => Self::React,
            "vue" => Self::Vue,
            "svelte" => Self::Svelte,
            "angular" => Self::Angular,
            "vanilla" | "vanilla-js" | "js" => Self::Vanilla,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::React => "react",
            Self::Vue => "vue",
            Self::Svelte => "svelte",
            Self::Angular => "angular",
            Self::Vanilla => "vanilla",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Location of the web app manifest.
    pub fn manifest_path(&self) -> &'static str {
        match self {
            Self::Angular => "src/manifest.webmanifest",
            _ => "public/manifest.json",
        }
    }

    /// Location of the service worker script.
    pub fn service_worker_path(&self) -> &'static str {
        match self {
            Self::Angular => "src/sw.js",
            _ => "public/sw.js",
        }
    }

    /// Location of the HTML entry document.
    pub fn index_html_path(&self) -> &'static str {
        match self {
            Self::Angular => "src/index.html",
            _ => "index.html",
        }
    }

    /// Runtime dependencies the framework wiring requires.
    pub fn required_dependencies(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::React => &[("react", "^18.2.0"), ("react-dom", "^18.2.0")],
            Self::Vue => &[("vue", "^3.4.0")],
            Self::Svelte => &[("svelte", "^4.2.0")],
            Self::Angular => &[
                ("@angular/core", "^17.0.0"),
                ("@angular/common", "^17.0.0"),
                ("@angular/platform-browser", "^17.0.0"),
            ],
            Self::Vanilla | Self::Custom(_) => &[],
        }
    }

    /// Build tooling the framework wiring requires.
    pub fn required_dev_dependencies(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::React => &[("vite", "^5.0.0"), ("@vitejs/plugin-react", "^4.2.0")],
            Self::Vue => &[("vite", "^5.0.0"), ("@vitejs/plugin-vue", "^5.0.0")],
            Self::Svelte => &[("vite", "^5.0.0"), ("@sveltejs/vite-plugin-svelte", "^3.0.0")],
            Self::Angular => &[("@angular/cli", "^17.0.0")],
            Self::Vanilla => &[("vite", "^5.0.0")],
            Self::Custom(_) => &[],
        }
    }

    /// Package pairs that must share a major version: `(primary, companion)`.
    pub fn version_companions(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::React => &[("react", "react-dom")],
            Self::Angular => &[
                ("@angular/core", "@angular/common"),
                ("@angular/core", "@angular/platform-browser"),
            ],
            _ => &[],
        }
    }

    /// Default `package.json` scripts; `dev` and `build` are required.
    pub fn default_scripts(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Angular => &[("dev", "ng serve"), ("build", "ng build"), ("test", "ng test")],
            Self::Custom(_) => &[("dev", "vite"), ("build", "vite build")],
            _ => &[("dev", "vite"), ("build", "vite build"), ("preview", "vite preview")],
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional PWA capability selected in the generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    Offline,
    PushNotifications,
    InstallPrompt,
    BackgroundSync,
    TypeScript,
    Custom(String),
}

impl Feature {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "offline" => Self::Offline,
            "push-notifications" | "push" => Self::PushNotifications,
            "install-prompt" => Self::InstallPrompt,
            "background-sync" => Self::BackgroundSync,
            "typescript" | "ts" => Self::TypeScript,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Offline => "offline",
            Self::PushNotifications => "push-notifications",
            Self::InstallPrompt => "install-prompt",
            Self::BackgroundSync => "background-sync",
            Self::TypeScript => "typescript",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Features that cannot work without a service worker.
    pub fn needs_service_worker(&self) -> bool {
        matches!(
            self,
            Self::Offline | Self::PushNotifications | Self::BackgroundSync
        )
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata accompanying a generated tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectMetadata {
    /// Application display name
    pub name: String,
    /// Selected framework
    pub framework: Framework,
    /// Selected features
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl ProjectMetadata {
    pub fn new(name: impl Into<String>, framework: Framework) -> Self {
        Self {
            name: name.into(),
            framework,
            features: Vec::new(),
        }
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        if !self.features.contains(&feature) {
            self.features.push(feature);
        }
        self
    }

    pub fn has_feature(&self, feature: &Feature) -> bool {
        self.features.contains(feature)
    }

    pub fn needs_service_worker(&self) -> bool {
        self.features.iter().any(|f| f.needs_service_worker())
    }

    /// Guess metadata from `package.json` when the caller supplied none.
    pub fn infer(tree: &ProjectTree) -> Self {
        let package = tree
            .get("package.json")
            .and_then(|c| serde_json::from_str::<serde_json::Value>(c).ok());

        let has_dep = |name: &str| {
            package.as_ref().map_or(false, |p| {
                ["dependencies", "devDependencies"]
                    .iter()
                    .any(|section| p.get(section).and_then(|d| d.get(name)).is_some())
            })
        };

        let framework = if has_dep("@angular/core") {
            Framework::Angular
        } else if has_dep("react") {
            Framework::React
        } else if has_dep("vue") {
            Framework::Vue
        } else if has_dep("svelte") {
            Framework::Svelte
        } else {
            Framework::Vanilla
        };

        let name = package
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or("pwa-app")
            .to_string();

        let mut metadata = Self::new(name, framework);
        if tree.paths().any(|p| p.ends_with(".ts") || p.ends_with(".tsx")) {
            metadata = metadata.with_feature(Feature::TypeScript);
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_from_str() {
        assert_eq!(Framework::from_str("React"), Framework::React);
        assert_eq!(Framework::from_str("vanilla-js"), Framework::Vanilla);
        assert_eq!(Framework::from_str("solid"), Framework::Custom("solid".to_string()));
    }

    #[test]
    fn test_framework_conventions() {
        assert_eq!(Framework::React.manifest_path(), "public/manifest.json");
        assert_eq!(Framework::Angular.manifest_path(), "src/manifest.webmanifest");
        assert_eq!(Framework::Angular.index_html_path(), "src/index.html");
        assert!(Framework::React
            .default_scripts()
            .iter()
            .any(|(name, _)| *name == "build"));
    }

    #[test]
    fn test_infer_from_package_json() {
        let tree = ProjectTree::from_files([
            (
                "package.json",
                r#"{"name":"shop","dependencies":{"react":"^18.2.0"}}"#,
            ),
            ("src/main.tsx", ""),
        ]);

        let metadata = ProjectMetadata::infer(&tree);

        assert_eq!(metadata.name, "shop");
        assert_eq!(metadata.framework, Framework::React);
        assert!(metadata.has_feature(&Feature::TypeScript));
    }

    #[test]
    fn test_infer_without_package_json() {
        let metadata = ProjectMetadata::infer(&ProjectTree::new());
        assert_eq!(metadata.framework, Framework::Vanilla);
        assert_eq!(metadata.name, "pwa-app");
    }

    #[test]
    fn test_service_worker_features() {
        let metadata = ProjectMetadata::new("app", Framework::Vue).with_feature(Feature::InstallPrompt);
        assert!(!metadata.needs_service_worker());
        assert!(metadata.with_feature(Feature::Offline).needs_service_worker());
    }
}

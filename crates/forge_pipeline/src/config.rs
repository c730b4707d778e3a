//! Pipeline configuration loaded from `forge.yaml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use forge_policy::{default_concurrency, IssueCatalog, RulePack, DEFAULT_MAX_PASSES};
use forge_runner::VerifierConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// Config file looked up in the project root.
pub const CONFIG_FILE: &str = "forge.yaml";

/// Options for one validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidateOptions {
    /// Run install/build/dev-server after remediation
    pub run_build_test: bool,
    /// Bound on build verification (0 = no timeout)
    pub timeout_ms: u64,
    pub max_fix_concurrency: usize,
    pub max_detect_concurrency: usize,
    pub max_fix_passes: usize,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            run_build_test: false,
            timeout_ms: 300_000,
            max_fix_concurrency: default_concurrency(),
            max_detect_concurrency: default_concurrency(),
            max_fix_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build_test(mut self, enabled: bool) -> Self {
        self.run_build_test = enabled;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_fix_concurrency(mut self, max: usize) -> Self {
        self.max_fix_concurrency = max;
        self
    }

    pub fn with_detect_concurrency(mut self, max: usize) -> Self {
        self.max_detect_concurrency = max;
        self
    }

    pub fn with_fix_passes(mut self, passes: usize) -> Self {
        self.max_fix_passes = passes;
        self
    }

    /// Build verification deadline, if any.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Catalog adjustments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule ids to turn off
    pub disabled: Vec<String>,
    /// Rule pack files, relative to the config file
    pub packs: Vec<PathBuf>,
}

/// Contents of `forge.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub validation: ValidateOptions,
    pub build: VerifierConfig,
    pub rules: RulesConfig,
}

impl ForgeConfig {
    /// Load a config from a file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Parse a config from a YAML string.
    pub fn from_yaml(yaml: &str) -> PipelineResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `forge.yaml` from `root` if present, defaults otherwise.
    pub fn discover(root: &Path) -> PipelineResult<Self> {
        let path = root.join(CONFIG_FILE);
        if path.is_file() {
            debug!("Loading config from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let v = &self.validation;
        if v.max_fix_concurrency == 0 || v.max_detect_concurrency == 0 {
            return Err(PipelineError::Config("concurrency limits must be at least 1".to_string()));
        }
        if v.max_fix_passes == 0 {
            return Err(PipelineError::Config("maxFixPasses must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Standard catalog plus configured packs, minus disabled rules.
    ///
    /// Pack paths are resolved against `base`.
    pub fn build_catalog(&self, base: &Path, extra_packs: &[PathBuf]) -> PipelineResult<IssueCatalog> {
        let mut catalog = IssueCatalog::standard()?;

        for pack_path in self.rules.packs.iter().chain(extra_packs) {
            let path = if pack_path.is_absolute() {
                pack_path.clone()
            } else {
                base.join(pack_path)
            };
            let pack = RulePack::load(&path)?;
            debug!("Loaded rule pack '{}' from {}", pack.name, path.display());
            catalog = catalog.with_rule_pack(&pack)?;
        }

        for id in &self.rules.disabled {
            if !catalog.disable_rule(id) {
                warn!("Cannot disable unknown rule '{}'", id);
            }
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = ForgeConfig::from_yaml(
            r#"
validation:
  runBuildTest: true
  timeoutMs: 60000
  maxFixPasses: 2
build:
  gracePeriodMs: 1500
  commands:
    install: pnpm install --frozen-lockfile
    build: pnpm build
    devServer: pnpm dev
rules:
  disabled: [debug-logging]
  packs: [rules/hosting.yaml]
"#,
        )
        .unwrap();

        assert!(config.validation.run_build_test);
        assert_eq!(config.validation.timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.validation.max_fix_passes, 2);
        assert_eq!(config.validation.max_detect_concurrency, default_concurrency());
        assert_eq!(config.build.grace_period_ms, 1500);
        assert_eq!(
            config.build.commands.as_ref().map(|c| c.install.as_str()),
            Some("pnpm install --frozen-lockfile")
        );
        assert_eq!(config.rules.disabled, vec!["debug-logging"]);
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(ForgeConfig::from_yaml("").unwrap(), ForgeConfig::default());
    }

    #[test]
    fn test_zero_timeout_means_unbounded() {
        assert_eq!(ValidateOptions::new().with_timeout_ms(0).timeout(), None);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let result = ForgeConfig::from_yaml("validation:\n  maxFixConcurrency: 0\n");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_build_catalog_applies_packs_and_disabled_rules() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("rules")).unwrap();
        std::fs::write(
            dir.path().join("rules/hosting.yaml"),
            "name: hosting\nrules:\n  - id: robots-txt\n    type: required_file\n    file: public/robots.txt\n",
        )
        .unwrap();
        let config = ForgeConfig::from_yaml("rules:\n  disabled: [debug-logging]\n  packs: [rules/hosting.yaml]\n").unwrap();

        let catalog = config.build_catalog(dir.path(), &[]).unwrap();

        assert!(catalog.rule("robots-txt").is_some());
        assert!(!catalog.is_enabled("debug-logging"));
    }

    #[test]
    fn test_discover_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ForgeConfig::discover(dir.path()).unwrap(), ForgeConfig::default());
    }
}

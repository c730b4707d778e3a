//! Build command and verifier configuration.

use std::path::PathBuf;

use forge_core::{BuildStage, ProjectTree};
use serde::{Deserialize, Serialize};

/// Package manager used to install and run scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    /// Pick the package manager from the lockfile present in the tree.
    pub fn detect(tree: &ProjectTree) -> Self {
        if tree.has_file("pnpm-lock.yaml") {
            Self::Pnpm
        } else if tree.has_file("yarn.lock") {
            Self::Yarn
        } else if tree.has_file("bun.lockb") || tree.has_file("bun.lock") {
            Self::Bun
        } else {
            Self::Npm
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pnpm => "pnpm",
            Self::Yarn => "yarn",
            Self::Bun => "bun",
        }
    }

    /// Command line that runs a package.json script.
    pub fn run_script(&self, script: &str) -> String {
        match self {
            Self::Yarn => format!("yarn {}", script),
            other => format!("{} run {}", other.command(), script),
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Shell commands for the three build stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCommands {
    pub install: String,
    pub build: String,
    pub dev_server: String,
}

impl Default for BuildCommands {
    fn default() -> Self {
        Self::for_manager(PackageManager::Npm)
    }
}

impl BuildCommands {
    pub fn for_manager(manager: PackageManager) -> Self {
        Self {
            install: format!("{} install", manager.command()),
            build: manager.run_script("build"),
            dev_server: manager.run_script("dev"),
        }
    }

    /// Commands for the package manager whose lockfile is in the tree.
    pub fn detect(tree: &ProjectTree) -> Self {
        Self::for_manager(PackageManager::detect(tree))
    }

    pub fn command(&self, stage: BuildStage) -> &str {
        match stage {
            BuildStage::Install => &self.install,
            BuildStage::Build => &self.build,
            BuildStage::DevServer => &self.dev_server,
        }
    }
}

/// Default pattern signalling that a dev server is serving.
pub const DEFAULT_READINESS_PATTERN: &str =
    r"(?i)(ready in|local:\s+https?://|localhost:\d+|compiled successfully|server running)";

/// Default patterns for output lines recorded as build warnings.
pub const DEFAULT_WARNING_PATTERNS: &[&str] = &[r"(?i)\bwarn(ing)?\b", r"(?i)\bdeprecated\b"];

/// Build verifier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifierConfig {
    /// Explicit commands; detected from the lockfile when unset
    pub commands: Option<BuildCommands>,
    /// Regex that marks the dev server as ready
    pub readiness_pattern: String,
    /// A dev server still running after this long counts as ready
    pub grace_period_ms: u64,
    /// Directory the tree is written to; a temp dir when unset
    pub workdir: Option<PathBuf>,
    pub warning_patterns: Vec<String>,
    /// Output lines quoted in a stage failure message
    pub tail_lines: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            commands: None,
            readiness_pattern: DEFAULT_READINESS_PATTERN.to_string(),
            grace_period_ms: 5_000,
            workdir: None,
            warning_patterns: DEFAULT_WARNING_PATTERNS.iter().map(|p| p.to_string()).collect(),
            tail_lines: 10,
        }
    }
}

impl VerifierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commands(mut self, commands: BuildCommands) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_grace_period(mut self, ms: u64) -> Self {
        self.grace_period_ms = ms;
        self
    }

    pub fn with_readiness_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.readiness_pattern = pattern.into();
        self
    }

    /// Commands to run for `tree`.
    pub fn commands_for(&self, tree: &ProjectTree) -> BuildCommands {
        self.commands.clone().unwrap_or_else(|| BuildCommands::detect(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_follow_lockfile() {
        let npm = ProjectTree::from_files([("package.json", "{}")]);
        assert_eq!(BuildCommands::detect(&npm).build, "npm run build");

        let pnpm = ProjectTree::from_files([("pnpm-lock.yaml", "lockfileVersion: 6")]);
        assert_eq!(BuildCommands::detect(&pnpm).install, "pnpm install");

        let yarn = ProjectTree::from_files([("yarn.lock", "")]);
        let commands = BuildCommands::detect(&yarn);
        assert_eq!(commands.build, "yarn build");
        assert_eq!(commands.command(BuildStage::DevServer), "yarn dev");

        let mut bun = ProjectTree::new();
        bun.insert_binary("bun.lockb", vec![0u8, 159, 146]);
        assert_eq!(PackageManager::detect(&bun), PackageManager::Bun);
    }

    #[test]
    fn test_explicit_commands_win() {
        let tree = ProjectTree::from_files([("yarn.lock", "")]);
        let custom = BuildCommands {
            install: "make deps".to_string(),
            build: "make".to_string(),
            dev_server: "make serve".to_string(),
        };
        let config = VerifierConfig::new().with_commands(custom.clone());

        assert_eq!(config.commands_for(&tree), custom);
    }

    #[test]
    fn test_config_deserializes_partial_yaml_shape() {
        let config: VerifierConfig =
            serde_json::from_str(r#"{"gracePeriodMs": 250, "workdir": "/tmp/app"}"#).unwrap();

        assert_eq!(config.grace_period_ms, 250);
        assert_eq!(config.workdir, Some(PathBuf::from("/tmp/app")));
        assert_eq!(config.readiness_pattern, DEFAULT_READINESS_PATTERN);
    }
}

//! Catalog command - list rules and fix strategies.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use forge_pipeline::ForgeConfig;
use forge_policy::IssueCatalog;
use serde::Serialize;

use super::OutputFormat;
use crate::ExitCodes;

#[derive(Args)]
pub struct CatalogArgs {
    /// Additional rule pack
    #[arg(long = "rules")]
    pub rule_packs: Vec<PathBuf>,

    /// Config file whose rule settings are applied
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleEntry {
    id: String,
    name: String,
    category: String,
    description: String,
    strategies: Vec<StrategyEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StrategyEntry {
    name: String,
    confidence: f64,
}

pub async fn execute(args: CatalogArgs) -> Result<u8> {
    let (config, base) = match &args.config {
        Some(path) => (
            ForgeConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
            path.parent().map(PathBuf::from).unwrap_or_default(),
        ),
        None => (ForgeConfig::default(), PathBuf::new()),
    };
    let catalog = config
        .build_catalog(&base, &args.rule_packs)
        .context("Failed to build the rule catalog")?;

    let entries = entries(&catalog);
    match args.format {
        OutputFormat::Text => {
            println!("📚 {} rules\n", entries.len());
            for rule in &entries {
                println!("  {} [{}] {}", rule.id, rule.category, rule.name);
                for strategy in &rule.strategies {
                    println!("      🔧 {} @ {:.2}", strategy.name, strategy.confidence);
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
    }
    Ok(ExitCodes::SUCCESS)
}

fn entries(catalog: &IssueCatalog) -> Vec<RuleEntry> {
    catalog
        .rules()
        .map(|rule| RuleEntry {
            id: rule.id().to_string(),
            name: rule.name().to_string(),
            category: format!("{:?}", rule.category()).to_lowercase(),
            description: rule.description().to_string(),
            strategies: catalog
                .strategies_for(rule.id())
                .iter()
                .map(|s| StrategyEntry {
                    name: s.name().to_string(),
                    confidence: s.confidence(),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_include_strategies() {
        let catalog = IssueCatalog::standard().unwrap();

        let entries = entries(&catalog);

        let manifest = entries.iter().find(|e| e.id == "manifest-missing").unwrap();
        assert_eq!(manifest.category, "structural");
        assert_eq!(manifest.strategies[0].name, "create-manifest");
        assert_eq!(manifest.strategies[0].confidence, 1.0);

        let debug = entries.iter().find(|e| e.id == "debug-logging").unwrap();
        assert_eq!(debug.category, "style");
        assert!(debug.strategies.is_empty());
    }
}

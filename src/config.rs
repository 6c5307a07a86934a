use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::catalog::Scope;
use crate::graph::PagerankParams;
use crate::matcher::{AliasMap, MatchingMode, TableFilter};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub scope: ScopeConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// Catalog database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Default scope for inference runs; the CLI tools can override per flag.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    pub server_name: String,
    pub database_name: String,
    pub schema_name: String,
}

/// Matching policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_matching_mode")]
    pub matching_mode: MatchingMode,
    /// `schema.table` wildcard allow-list; empty allows everything.
    #[serde(default)]
    pub allow_patterns: Vec<String>,
    /// Symmetric column-name alias declarations.
    #[serde(default)]
    pub aliases: HashMap<String, Vec<String>>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            matching_mode: default_matching_mode(),
            allow_patterns: Vec::new(),
            aliases: HashMap::new(),
        }
    }
}

/// Graph analytics tuning
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_damping")]
    pub pagerank_damping: f64,
    #[serde(default = "default_max_iterations")]
    pub pagerank_max_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub pagerank_tolerance: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            pagerank_damping: default_damping(),
            pagerank_max_iterations: default_max_iterations(),
            pagerank_tolerance: default_tolerance(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_matching_mode() -> MatchingMode {
    MatchingMode::Combined
}

fn default_damping() -> f64 {
    0.85
}

fn default_max_iterations() -> usize {
    100
}

fn default_tolerance() -> f64 {
    1e-6
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading
    /// config. Looks for the config file in this order:
    /// 1. Path specified in SCHEMAGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("SCHEMAGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str).context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.analytics.pagerank_damping <= 0.0 || self.analytics.pagerank_damping >= 1.0 {
            anyhow::bail!(
                "analytics.pagerank_damping must be between 0 and 1, got {}",
                self.analytics.pagerank_damping
            );
        }
        if self.analytics.pagerank_max_iterations == 0 {
            anyhow::bail!("analytics.pagerank_max_iterations must be greater than 0");
        }

        // Surface bad wildcard patterns at startup rather than mid-run
        TableFilter::from_patterns(&self.inference.allow_patterns)
            .context("Invalid inference.allow_patterns")?;

        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.catalog.db_path
    }

    pub fn default_scope(&self) -> Scope {
        Scope::new(
            &self.scope.server_name,
            &self.scope.database_name,
            &self.scope.schema_name,
        )
    }

    pub fn table_filter(&self) -> Result<TableFilter> {
        TableFilter::from_patterns(&self.inference.allow_patterns)
            .context("Invalid inference.allow_patterns")
    }

    pub fn alias_map(&self) -> AliasMap {
        AliasMap::new(self.inference.aliases.clone())
    }

    pub fn pagerank_params(&self) -> PagerankParams {
        PagerankParams {
            damping: self.analytics.pagerank_damping,
            max_iterations: self.analytics.pagerank_max_iterations,
            tolerance: self.analytics.pagerank_tolerance,
        }
    }
}

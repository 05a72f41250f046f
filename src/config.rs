//! Configuration types for ingestion and expansion

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ingest::DEFAULT_PATTERN;

/// Configuration for one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Base directory holding one subdirectory per table
    pub base_path: PathBuf,
    /// File pattern below each table directory
    pub pattern: String,
    /// Number of parallel load workers
    pub workers: usize,
    /// Per-file load timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Load only this table
    pub table: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            pattern: DEFAULT_PATTERN.to_string(),
            workers: 4,
            timeout_secs: None,
            table: None,
        }
    }
}

impl IngestConfig {
    /// Create a new builder for IngestConfig
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("ingest workers must be at least 1".to_string());
        }
        if self.pattern.is_empty() {
            return Err("ingest pattern must not be empty".to_string());
        }
        if self.timeout_secs == Some(0) {
            return Err("ingest timeout must be at least 1 second".to_string());
        }
        Ok(())
    }
}

/// Builder for IngestConfig
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    base_path: Option<PathBuf>,
    pattern: Option<String>,
    workers: Option<usize>,
    timeout_secs: Option<u64>,
    table: Option<String>,
}

impl IngestConfigBuilder {
    /// Set the base directory
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Set the file pattern
    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    /// Set the number of parallel workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the per-file timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Restrict the run to one table
    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    /// Build the IngestConfig
    pub fn build(self) -> Result<IngestConfig, String> {
        let base_path = self.base_path.ok_or("Base path is required")?;

        let config = IngestConfig {
            base_path,
            pattern: self.pattern.unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
            workers: self.workers.unwrap_or(4),
            timeout_secs: self.timeout_secs,
            table: self.table,
        };
        config.validate()?;
        Ok(config)
    }
}

/// What to emit for an empty seller id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptySellerPolicy {
    /// Emit no row for the empty segment
    #[default]
    Skip,
    /// Emit the row with this seller id
    Placeholder(String),
}

impl FromStr for EmptySellerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("skip") {
            return Ok(EmptySellerPolicy::Skip);
        }
        match s.split_once('=') {
            Some((kind, id)) if kind.eq_ignore_ascii_case("placeholder") && !id.is_empty() => {
                Ok(EmptySellerPolicy::Placeholder(id.to_string()))
            }
            _ => Err(format!(
                "Invalid empty seller policy: {}. Expected: skip, placeholder=<id>",
                s
            )),
        }
    }
}

/// Derived table to materialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionTarget {
    /// `tb_data_week`, one row per (week key, seller)
    Week,
    /// `tb_data_product`, one row per (product key, seller)
    Product,
}

impl ExpansionTarget {
    pub const ALL: [ExpansionTarget; 2] = [ExpansionTarget::Week, ExpansionTarget::Product];

    /// Wide table the target reads from
    pub fn source_table(&self) -> &'static str {
        match self {
            ExpansionTarget::Week => "tb_sales_estimates_weekly_v2",
            ExpansionTarget::Product => "tb_sales_estimates_weekly_v2_latest",
        }
    }

    /// Normalized table the target writes to
    pub fn target_table(&self) -> &'static str {
        match self {
            ExpansionTarget::Week => "tb_data_week",
            ExpansionTarget::Product => "tb_data_product",
        }
    }
}

impl FromStr for ExpansionTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "week" => Ok(ExpansionTarget::Week),
            "product" => Ok(ExpansionTarget::Product),
            _ => Err(format!("Invalid target: {}. Expected: week, product", s)),
        }
    }
}

/// Configuration for the multi-value expansion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandConfig {
    /// Number of hash shards the source is split into
    pub shards: usize,
    /// Number of shards processed in parallel
    pub workers: usize,
    pub empty_seller: EmptySellerPolicy,
    pub targets: Vec<ExpansionTarget>,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            shards: 1024,
            workers: 4,
            empty_seller: EmptySellerPolicy::Skip,
            targets: ExpansionTarget::ALL.to_vec(),
        }
    }
}

impl ExpandConfig {
    /// Create a new builder for ExpandConfig
    pub fn builder() -> ExpandConfigBuilder {
        ExpandConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.shards == 0 {
            return Err("expand shards must be at least 1".to_string());
        }
        if self.workers == 0 {
            return Err("expand workers must be at least 1".to_string());
        }
        if self.targets.is_empty() {
            return Err("at least one expansion target is required".to_string());
        }
        Ok(())
    }
}

/// Builder for ExpandConfig
#[derive(Debug, Default)]
pub struct ExpandConfigBuilder {
    shards: Option<usize>,
    workers: Option<usize>,
    empty_seller: Option<EmptySellerPolicy>,
    targets: Option<Vec<ExpansionTarget>>,
}

impl ExpandConfigBuilder {
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = Some(shards);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn empty_seller(mut self, policy: EmptySellerPolicy) -> Self {
        self.empty_seller = Some(policy);
        self
    }

    /// Materialize only `target`
    pub fn target(mut self, target: ExpansionTarget) -> Self {
        self.targets = Some(vec![target]);
        self
    }

    pub fn build(self) -> Result<ExpandConfig, String> {
        let defaults = ExpandConfig::default();
        let config = ExpandConfig {
            shards: self.shards.unwrap_or(defaults.shards),
            workers: self.workers.unwrap_or(defaults.workers),
            empty_seller: self.empty_seller.unwrap_or_default(),
            targets: self.targets.unwrap_or(defaults.targets),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Database section of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// DuckDB file path, or `:memory:`
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "hive_loader.duckdb".to_string(),
        }
    }
}

/// Config file combining database, ingest and expand settings
///
/// ```toml
/// [database]
/// path = "warehouse.duckdb"
///
/// [ingest]
/// base_path = "/data/export"
/// workers = 8
/// timeout_secs = 600
///
/// [expand]
/// shards = 1024
/// empty_seller = "skip"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub expand: ExpandConfig,
}

impl LoaderConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, StoreError> {
        let config: LoaderConfig =
            toml::from_str(contents).map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.database.path.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "database path must not be empty".to_string(),
            ));
        }
        self.ingest.validate().map_err(StoreError::InvalidConfig)?;
        self.expand.validate().map_err(StoreError::InvalidConfig)?;
        Ok(())
    }
}

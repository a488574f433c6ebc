//! Configuration handling for kfreq CLI
//!
//! Supports loading configuration from kfreq.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use kfreq_core::PartitionBacking;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "kfreq.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Worker threads for parallel partitions (0 = rayon default)
    #[serde(default)]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Target disk space in GB
    #[serde(default = "default_target_disk")]
    pub target_disk_gb: u64,

    /// Target memory in GB
    #[serde(default = "default_target_memory")]
    pub target_memory_gb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Membership filter false-positive rate
    #[serde(default = "default_error_rate")]
    pub error_rate: f64,

    /// Re-scan to report exact counts for the filtered strategy
    #[serde(default)]
    pub recount: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Where partitioned passes keep routed k-mers ("disk" or "memory")
    #[serde(default)]
    pub backing: PartitionBacking,

    /// Parent directory for spill files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spill_dir: Option<PathBuf>,

    /// Count the partitions of a pass concurrently
    #[serde(default)]
    pub parallel: bool,

    /// Skip singletons in partition tables
    #[serde(default)]
    pub singleton_filter: bool,
}

// Default value functions
fn default_target_disk() -> u64 { 50 }
fn default_target_memory() -> u64 { 4 }
fn default_error_rate() -> f64 { 0.01 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { threads: 0 }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            target_disk_gb: default_target_disk(),
            target_memory_gb: default_target_memory(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            error_rate: default_error_rate(),
            recount: false,
        }
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            backing: PartitionBacking::Disk,
            spill_dir: None,
            parallel: false,
            singleton_filter: false,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default configuration")
    }

    fn validate(&self) -> Result<()> {
        if self.budget.target_disk_gb == 0 || self.budget.target_memory_gb == 0 {
            anyhow::bail!("budget.target_disk_gb and budget.target_memory_gb must be positive");
        }
        if !(0.0..1.0).contains(&self.filter.error_rate) {
            anyhow::bail!("filter.error_rate must be in [0, 1), got {}", self.filter.error_rate);
        }
        Ok(())
    }
}

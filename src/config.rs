//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files. Every field has
//! a default, so a partial file (or none at all) is valid. A few data-source
//! settings can be overridden from the environment or a `.env` file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::ExitFill;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_source: DataSourceConfig,
    pub analysis: AnalysisConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an optional path, falling back to defaults
    pub fn load(path: Option<&str>) -> Result<Self> {
        dotenv::dotenv().ok();

        match path {
            Some(p) => Self::from_file(p),
            None => {
                let mut config = Config::default();
                config.apply_env_overrides();
                Ok(config)
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("OHL_DATA_BASE_URL") {
            self.data_source.base_url = url;
        }
        if let Ok(suffix) = std::env::var("OHL_SYMBOL_SUFFIX") {
            self.data_source.symbol_suffix = suffix;
        }
    }
}

/// Market data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    pub base_url: String,
    /// Appended to bare symbols (e.g. RELIANCE -> RELIANCE.NS); empty disables
    pub symbol_suffix: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub requests_per_second: usize,
    /// Calendar days fetched before the pattern date
    pub lookback_days: i64,
    /// Calendar days fetched after the pattern date
    pub lookahead_days: i64,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        DataSourceConfig {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            symbol_suffix: ".NS".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            timeout_secs: 10,
            max_attempts: 3,
            backoff_ms: 1000,
            requests_per_second: 10,
            lookback_days: 15,
            lookahead_days: 30,
        }
    }
}

impl DataSourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Trade rule parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Target above entry as a fraction (0.002 = 0.2%)
    pub target_pct: f64,
    /// Forward trading days scanned before a trade is Incomplete
    pub holding_days: usize,
    pub exit_fill: ExitFill,
    /// Roll Saturday/Sunday pattern dates forward to Monday
    pub adjust_weekends: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            target_pct: 0.002,
            holding_days: 6,
            exit_fill: ExitFill::BarExtreme,
            adjust_weekends: true,
        }
    }
}

/// Fetch scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum concurrent fetches; 1 is strictly sequential
    pub concurrency: usize,
    /// Upper bound on one record's fetch, retries included
    pub fetch_timeout_secs: u64,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            concurrency: 4,
            fetch_timeout_secs: 60,
            show_progress: true,
        }
    }
}

impl PipelineConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_dir: "logs".to_string(),
        }
    }
}

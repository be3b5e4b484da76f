//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.incident-trends.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".incident-trends.toml";

/// NYPD Shooting Incident Data (Historic), CSV export.
pub const DEFAULT_DATASET_URL: &str =
    "https://data.cityofnewyork.us/api/views/833y-pxx7/rows.csv?accessType=DOWNLOAD";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Dataset source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Trend model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "incident_trends_report.md".to_string()
}

/// Where the dataset comes from and how hard to try fetching it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Dataset URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Extra attempts after the first failed fetch.
    #[serde(default)]
    pub retries: u32,

    /// Delay before the first retry; doubles on every further retry.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_seconds: default_timeout(),
            retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_url() -> String {
    DEFAULT_DATASET_URL.to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Shooter age group values treated as placeholders and left out of the
    /// age x region shares. Compared case-insensitively after trimming.
    #[serde(default = "default_excluded_age_groups")]
    pub excluded_age_groups: Vec<String>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            excluded_age_groups: default_excluded_age_groups(),
        }
    }
}

fn default_excluded_age_groups() -> Vec<String> {
    // 1020, 1022, 1028, 224 and 940 are data-entry errors in the source.
    vec!["UNKNOWN", "(null)", "NULL", "1020", "1022", "1028", "224", "940"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Trend model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Years to predict incident counts for.
    #[serde(default = "default_predict_years")]
    pub predict_years: Vec<i32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            predict_years: default_predict_years(),
        }
    }
}

fn default_predict_years() -> Vec<i32> {
    vec![2025, 2030, 2035]
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Render text bar charts next to the tables.
    #[serde(default = "default_true")]
    pub include_charts: bool,

    /// Width of the longest bar, in characters.
    #[serde(default = "default_chart_width")]
    pub chart_width: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_charts: true,
            chart_width: default_chart_width(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_chart_width() -> usize {
    40
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.url {
            self.source.url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.source.retries = retries;
        }
        if let Some(backoff) = args.retry_backoff_ms {
            self.source.retry_backoff_ms = backoff;
        }

        if let Some(ref years) = args.predict {
            self.model.predict_years = years.clone();
        }

        if let Some(ref output) = args.output {
            self.general.output = output.to_string_lossy().to_string();
        }

        if args.no_charts {
            self.report.include_charts = false;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// incident-trends - descriptive statistics for NYPD shooting incidents
///
/// Downloads the shooting incident dataset, deduplicates it, aggregates
/// counts by year, borough and demographic group, and fits a linear
/// trend to extrapolate future yearly counts.
///
/// Examples:
///   incident-trends
///   incident-trends --input ./NYPD_Shooting_Incident_Data__Historic_.csv
///   incident-trends --predict 2026,2028 --format json -o trends.json
///   incident-trends --tables-dir ./tables --retries 3
///   incident-trends --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Dataset URL to download
    ///
    /// Defaults to the NYPD historic shooting incident CSV export.
    /// Can also be set via INCIDENT_TRENDS_URL or .incident-trends.toml.
    #[arg(long, value_name = "URL", env = "INCIDENT_TRENDS_URL")]
    pub url: Option<String>,

    /// Read the dataset from a local CSV file instead of downloading it
    ///
    /// Takes precedence over --url.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Also export every derived table as CSV into this directory
    #[arg(long, value_name = "DIR")]
    pub tables_dir: Option<PathBuf>,

    /// Years to predict incident counts for (comma-separated)
    ///
    /// Example: --predict 2025,2030,2035
    #[arg(long, value_name = "YEARS", value_delimiter = ',', allow_negative_numbers = true)]
    pub predict: Option<Vec<i32>>,

    /// Extra download attempts after a failed fetch
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<u32>,

    /// Delay before the first retry in milliseconds (doubles per retry)
    #[arg(long, value_name = "MS")]
    pub retry_backoff_ms: Option<u64>,

    /// Download timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .incident-trends.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Leave the text bar charts out of the Markdown report
    #[arg(long)]
    pub no_charts: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: load and clean the dataset, print cleaning stats and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .incident-trends.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Dataset URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref years) = self.predict {
            if years.is_empty() {
                return Err("--predict needs at least one year".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        if let Some(ref dir) = self.tables_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(format!("Tables path is not a directory: {}", dir.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the `[general] verbose` value from the config file;
    /// `--quiet` still wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

//! incident-trends - descriptive statistics for NYPD shooting incidents
//!
//! A CLI tool that downloads the shooting incident dataset, cleans it,
//! aggregates counts by year, borough and demographic group, and fits a
//! linear trend to extrapolate future yearly counts.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (fetch, schema, malformed CSV, I/O, bad arguments)
//!   2 - Report written, but the trend model could not be fitted

mod analysis;
mod cleaning;
mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod report;
mod source;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use models::{CleanedTable, Report, ReportMetadata};
use source::{DatasetSource, FetchOptions};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is loaded before logging so `[general] verbose` can apply
    let (mut config, config_origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("incident-trends v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_origin {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match run_report(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .incident-trends.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::DEFAULT_CONFIG_FILE))?;

    println!(
        "✅ Created {} with default settings.",
        config::DEFAULT_CONFIG_FILE
    );
    println!("   Edit it to customize the dataset URL, retries, placeholders and predictions.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete load, clean, aggregate, fit and render workflow.
/// Returns the exit code (0 or 2).
async fn run_report(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    // Step 1: Load the dataset
    let source = match args.input {
        Some(ref path) => DatasetSource::File(path.clone()),
        None => DatasetSource::Url(config.source.url.clone()),
    };
    let mut fetch_options = FetchOptions::from(&config.source);
    fetch_options.show_progress = !args.quiet;

    println!("📥 Loading dataset: {}", source);
    if matches!(source, DatasetSource::Url(_)) && fetch_options.retry.retries > 0 {
        println!(
            "   Retries: {} (backoff {}ms, doubling)",
            fetch_options.retry.retries,
            fetch_options.retry.backoff.as_millis()
        );
    }
    let raw = source::load_source(&source, &fetch_options).await?;

    // Steps 2-3: Clean, aggregate and fit
    println!("🧹 Cleaning {} bytes...", raw.len());
    let (table, analysis) = pipeline::run(&raw, &config).context("Failed to clean dataset")?;
    print_cleaning_stats(&table);

    if args.dry_run {
        println!("\n✅ Dry run complete. No report was written.");
        return Ok(0);
    }

    let (trend, trend_error) = match analysis.trend {
        Ok(summary) => (Some(summary), None),
        Err(e) => (None, Some(e.to_string())),
    };

    // Step 4: Build the report
    let report = Report {
        metadata: ReportMetadata {
            source: source.to_string(),
            generated_at: Utc::now(),
            cleaning: table.stats,
            date_range: table.date_range(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        aggregates: analysis.aggregates,
        trend,
        trend_error,
    };

    // Step 5: Render and save
    println!("📝 Generating report...");
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = PathBuf::from(&config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    if let Some(ref dir) = args.tables_dir {
        let written = report::export_tables(&report.aggregates, report.trend.as_ref(), dir)?;
        println!("   Exported {} tables to {}", written.len(), dir.display());
    }

    // Print summary
    println!("\n📈 Summary:");
    for row in &report.aggregates.by_year {
        debug!("{}: {}", row.year, row.count);
    }
    if let (Some(first), Some(last)) = (
        report.aggregates.by_year.first(),
        report.aggregates.by_year.last(),
    ) {
        println!(
            "   Years: {}–{} | {} in {} → {} in {}",
            first.year, last.year, first.count, first.year, last.count, last.year
        );
    }
    match report.trend {
        Some(ref trend) => {
            println!("   Trend: {:+.2} incidents/year", trend.slope);
            for prediction in &trend.predictions {
                println!(
                    "   - {}: {:.1} predicted",
                    prediction.year, prediction.predicted_count
                );
            }
        }
        None => {
            println!(
                "   ⚠️  Trend model unavailable: {}",
                report.trend_error.as_deref().unwrap_or("not fitted")
            );
        }
    }
    println!(
        "   Duration: {:.1}s",
        start_time.elapsed().as_secs_f64()
    );
    println!(
        "\n✅ Report complete! Saved to: {}",
        output_path.display()
    );

    if report.trend.is_none() {
        return Ok(2);
    }

    Ok(0)
}

fn print_cleaning_stats(table: &CleanedTable) {
    let stats = &table.stats;
    println!("   Raw rows: {}", stats.raw_rows);
    println!("   Duplicates removed: {}", stats.duplicates_removed);
    if stats.unparseable_rows > 0 {
        println!("   ⚠️  Rows excluded (unparseable): {}", stats.unparseable_rows);
    }
    println!("   Incidents kept: {}", stats.clean_rows);
}

/// Load configuration from file or use defaults.
///
/// Returns the config and the file it came from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => Ok((config, Some(PathBuf::from(config::DEFAULT_CONFIG_FILE)))),
        None => Ok((Config::default(), None)),
    }
}

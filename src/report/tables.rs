//! CSV export of the derived tables.
//!
//! One file per table, for plotting tools that want the raw aggregates
//! rather than the rendered report.

use crate::models::{Aggregates, TrendSummary};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Serialize)]
struct CoefficientsRow {
    intercept: f64,
    slope: f64,
    r_squared: f64,
    observations: usize,
}

/// Write every aggregate table (and the trend, if fitted) into `dir`.
///
/// Returns the paths written, in a fixed order.
pub fn export_tables(
    aggregates: &Aggregates,
    trend: Option<&TrendSummary>,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create tables directory: {}", dir.display()))?;

    let mut written = Vec::new();

    written.push(write_table(dir, "by_year.csv", &aggregates.by_year)?);
    written.push(write_table(dir, "by_year_region.csv", &aggregates.by_year_region)?);
    written.push(write_table(
        dir,
        "age_region_shares.csv",
        &aggregates.age_region_shares,
    )?);
    written.push(write_table(
        dir,
        "murders_by_year.csv",
        &aggregates.murders_by_year,
    )?);

    for breakdown in &aggregates.demographics {
        let name = format!("demographics_{}.csv", breakdown.field.key());
        written.push(write_table(dir, &name, &breakdown.categories)?);
    }

    if let Some(trend) = trend {
        let coefficients = [CoefficientsRow {
            intercept: trend.intercept,
            slope: trend.slope,
            r_squared: trend.r_squared,
            observations: trend.observations,
        }];
        written.push(write_table(dir, "trend_model.csv", &coefficients)?);
        written.push(write_table(dir, "predictions.csv", &trend.predictions)?);
    }

    Ok(written)
}

fn write_table<T: Serialize>(dir: &Path, name: &str, rows: &[T]) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;

    debug!("Wrote {} row(s) to {}", rows.len(), path.display());
    Ok(path)
}

//! Markdown report generation.
//!
//! This module renders the aggregate tables and the trend model as a
//! Markdown document, with optional text bar charts standing in for plots.

use crate::analysis::regions;
use crate::config::ReportConfig;
use crate::models::{
    AgeRegionShare, DemographicBreakdown, Report, ReportMetadata, TrendSummary, YearCount,
    YearRegionCount, YearlyMurders,
};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, config: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# NYPD Shooting Incident Trends\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_yearly_section(&report.aggregates.by_year, config));
    output.push_str(&generate_region_section(&report.aggregates.by_year_region));
    output.push_str(&generate_age_region_section(
        &report.aggregates.age_region_shares,
    ));
    output.push_str(&generate_murder_section(&report.aggregates.murders_by_year));
    output.push_str(&generate_demographics_section(
        &report.aggregates.demographics,
        config,
    ));
    output.push_str(&generate_trend_section(
        report.trend.as_ref(),
        report.trend_error.as_deref(),
        &report.aggregates.by_year,
    ));

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();
    let cleaning = &metadata.cleaning;

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some((first, last)) = metadata.date_range {
        section.push_str(&format!(
            "- **Incident Dates:** {} to {}\n",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        ));
    }
    section.push_str(&format!("- **Raw Rows:** {}\n", cleaning.raw_rows));
    section.push_str(&format!(
        "- **Duplicates Removed:** {}\n",
        cleaning.duplicates_removed
    ));
    if cleaning.unparseable_rows > 0 {
        section.push_str(&format!(
            "- **Rows Excluded (unparseable):** {}\n",
            cleaning.unparseable_rows
        ));
    }
    section.push_str(&format!("- **Incidents Analyzed:** {}\n", cleaning.clean_rows));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Incidents by Year](#incidents-by-year)\n");
    toc.push_str("- [Incidents by Borough and Year](#incidents-by-borough-and-year)\n");
    toc.push_str("- [Shooter Age Group by Borough](#shooter-age-group-by-borough)\n");
    toc.push_str("- [Statistical Murders by Year](#statistical-murders-by-year)\n");
    toc.push_str("- [Demographics](#demographics)\n");
    for breakdown in &report.aggregates.demographics {
        let anchor = breakdown.field.to_string().replace(' ', "-").to_lowercase();
        toc.push_str(&format!("  - [{}](#{})\n", breakdown.field, anchor));
    }
    toc.push_str("- [Trend Model](#trend-model)\n");
    toc.push('\n');

    toc
}

/// Yearly counts with an optional bar chart column.
fn generate_yearly_section(by_year: &[YearCount], config: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Incidents by Year\n\n");

    if by_year.is_empty() {
        section.push_str("No incidents in the cleaned dataset.\n\n");
        return section;
    }

    let max = by_year.iter().map(|row| row.count).max().unwrap_or(0);

    if config.include_charts {
        section.push_str("| Year | Incidents | |\n");
        section.push_str("|:---:|---:|:---|\n");
        for row in by_year {
            section.push_str(&format!(
                "| {} | {} | `{}` |\n",
                row.year,
                row.count,
                bar(row.count, max, config.chart_width)
            ));
        }
    } else {
        section.push_str("| Year | Incidents |\n");
        section.push_str("|:---:|---:|\n");
        for row in by_year {
            section.push_str(&format!("| {} | {} |\n", row.year, row.count));
        }
    }

    let total: u64 = by_year.iter().map(|row| row.count).sum();
    section.push_str(&format!("\n**Total:** {}\n\n", total));

    section
}

/// Year x borough pivot table (the heatmap data).
fn generate_region_section(by_year_region: &[YearRegionCount]) -> String {
    let mut section = String::new();

    section.push_str("## Incidents by Borough and Year\n\n");

    if by_year_region.is_empty() {
        section.push_str("No incidents in the cleaned dataset.\n\n");
        return section;
    }

    let columns = regions(by_year_region);
    let mut cells: BTreeMap<i32, BTreeMap<&str, u64>> = BTreeMap::new();
    for row in by_year_region {
        cells
            .entry(row.year)
            .or_default()
            .insert(row.region.as_str(), row.count);
    }

    section.push_str("| Year |");
    for region in &columns {
        section.push_str(&format!(" {} |", region));
    }
    section.push_str("\n|:---:|");
    section.push_str(&"---:|".repeat(columns.len()));
    section.push('\n');

    for (year, counts) in &cells {
        section.push_str(&format!("| {} |", year));
        for region in &columns {
            let count = counts.get(region.as_str()).copied().unwrap_or(0);
            section.push_str(&format!(" {} |", count));
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

/// Shooter age group x borough shares.
fn generate_age_region_section(shares: &[AgeRegionShare]) -> String {
    let mut section = String::new();

    section.push_str("## Shooter Age Group by Borough\n\n");

    if shares.is_empty() {
        section.push_str("No incidents with a known shooter age group.\n\n");
        return section;
    }

    section.push_str(
        "Share of each borough's incidents with a known shooter age group. \
         Unknown and placeholder age groups are excluded.\n\n",
    );

    let columns: BTreeSet<&str> = shares.iter().map(|s| s.region.as_str()).collect();
    let mut cells: BTreeMap<&str, BTreeMap<&str, &AgeRegionShare>> = BTreeMap::new();
    for share in shares {
        cells
            .entry(share.shooter_age_group.as_str())
            .or_default()
            .insert(share.region.as_str(), share);
    }

    section.push_str("| Age Group |");
    for region in &columns {
        section.push_str(&format!(" {} |", region));
    }
    section.push_str("\n|:---|");
    section.push_str(&"---:|".repeat(columns.len()));
    section.push('\n');

    for (age_group, by_region) in &cells {
        section.push_str(&format!("| {} |", age_group));
        for region in &columns {
            match by_region.get(region) {
                Some(share) => {
                    section.push_str(&format!(" {} ({:.1}%) |", share.count, share.percent))
                }
                None => section.push_str(" 0 (0.0%) |"),
            }
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

/// Statistical murders per year.
fn generate_murder_section(rows: &[YearlyMurders]) -> String {
    let mut section = String::new();

    section.push_str("## Statistical Murders by Year\n\n");

    if rows.is_empty() {
        section.push_str("No incidents in the cleaned dataset.\n\n");
        return section;
    }

    section.push_str("| Year | Incidents | Murders | Murder Rate |\n");
    section.push_str("|:---:|---:|---:|---:|\n");
    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} | {:.1}% |\n",
            row.year,
            row.incidents,
            row.murders,
            row.murder_rate * 100.0
        ));
    }
    section.push('\n');

    section
}

/// One table per demographic field.
fn generate_demographics_section(
    breakdowns: &[DemographicBreakdown],
    config: &ReportConfig,
) -> String {
    let mut section = String::new();

    section.push_str("## Demographics\n\n");

    for breakdown in breakdowns {
        section.push_str(&format!("### {}\n\n", breakdown.field));

        if breakdown.categories.is_empty() {
            section.push_str("No data.\n\n");
            continue;
        }

        let max = breakdown
            .categories
            .iter()
            .map(|c| c.count)
            .max()
            .unwrap_or(0);

        section.push_str("| Category | Incidents | Share |");
        section.push_str(if config.include_charts { " |\n" } else { "\n" });
        section.push_str("|:---|---:|---:|");
        section.push_str(if config.include_charts { ":---|\n" } else { "\n" });

        for category in &breakdown.categories {
            section.push_str(&format!(
                "| {} | {} | {:.1}% |",
                category.category, category.count, category.percent
            ));
            if config.include_charts {
                section.push_str(&format!(
                    " `{}` |",
                    bar(category.count, max, config.chart_width / 2)
                ));
            }
            section.push('\n');
        }
        section.push('\n');
    }

    section
}

/// Trend coefficients and predictions, or why there are none.
fn generate_trend_section(
    trend: Option<&TrendSummary>,
    error: Option<&str>,
    by_year: &[YearCount],
) -> String {
    let mut section = String::new();

    section.push_str("## Trend Model\n\n");

    let Some(trend) = trend else {
        section.push_str(&format!(
            "> ⚠️ **Trend model unavailable:** {}\n\n",
            error.unwrap_or("not fitted")
        ));
        return section;
    };

    section.push_str(&format!(
        "Ordinary least squares over {} yearly counts:\n\n",
        trend.observations
    ));
    section.push_str(&format!(
        "`incidents = {:.4} + ({:.4} × year)`\n\n",
        trend.intercept, trend.slope
    ));
    section.push_str(&format!("- **R²:** {:.4}\n", trend.r_squared));
    if let (Some(first), Some(last)) = (by_year.first(), by_year.last()) {
        section.push_str(&format!("- **Fitted Years:** {}–{}\n", first.year, last.year));
    }
    section.push('\n');

    if !trend.predictions.is_empty() {
        section.push_str("### Predictions\n\n");
        section.push_str("| Year | Predicted Incidents |\n");
        section.push_str("|:---:|---:|\n");
        for prediction in &trend.predictions {
            section.push_str(&format!(
                "| {} | {:.1} |\n",
                prediction.year, prediction.predicted_count
            ));
        }
        section.push('\n');

        if trend.predictions.iter().any(|p| p.predicted_count < 0.0) {
            section.push_str(
                "*Negative predictions are an artifact of extrapolating a declining line.*\n\n",
            );
        }
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by incident-trends v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Horizontal bar scaled so that `max` fills `width` characters.
fn bar(value: u64, max: u64, width: usize) -> String {
    if max == 0 || width == 0 {
        return String::new();
    }
    let filled = ((value as f64 / max as f64) * width as f64).round() as usize;
    "█".repeat(filled.max(usize::from(value > 0)))
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

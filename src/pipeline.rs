//! Clean -> aggregate -> fit, over bytes already in memory.
//!
//! The fetch and the presentation stay in `main`; everything here is
//! synchronous and deterministic for a given input and configuration.

use crate::analysis::TrendModel;
use crate::cleaning;
use crate::config::Config;
use crate::error::PipelineError;
use crate::models::{Aggregates, CleanedTable, TrendSummary};
use tracing::{info, warn};

/// Result of analysing a cleaned table.
#[derive(Debug)]
pub struct Analysis {
    pub aggregates: Aggregates,
    /// The fitted trend, or the model-input error that prevented it.
    pub trend: Result<TrendSummary, PipelineError>,
}

/// Aggregate the cleaned table and fit the trend model.
///
/// A model failure is kept in [`Analysis::trend`] so the historical
/// aggregates can still be reported.
pub fn analyze(table: &CleanedTable, config: &Config) -> Analysis {
    if table.is_empty() {
        warn!("Cleaned table is empty; every aggregate will be empty");
    }

    let aggregates = Aggregates::compute(table, &config.aggregation);
    info!(
        "Aggregated {} incidents over {} year(s)",
        table.len(),
        aggregates.by_year.len()
    );

    let trend = TrendModel::fit(&aggregates.by_year)
        .map(|model| model.summarize(&config.model.predict_years));

    match &trend {
        Ok(summary) => info!(
            "Trend: {:.3} incidents/year (R² {:.3})",
            summary.slope, summary.r_squared
        ),
        Err(e) => warn!("Skipping trend model: {}", e),
    }

    Analysis { aggregates, trend }
}

/// Clean raw CSV bytes and analyse the result.
pub fn run(raw: &[u8], config: &Config) -> Result<(CleanedTable, Analysis), PipelineError> {
    let table = cleaning::clean(raw)?;
    let analysis = analyze(&table, config);
    Ok((table, analysis))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../fixtures/incidents_sample.csv");

    #[test]
    fn test_run_on_sample() {
        let (table, analysis) = run(SAMPLE.as_bytes(), &Config::default()).unwrap();

        assert_eq!(table.stats.raw_rows, 11);
        assert_eq!(table.stats.duplicates_removed, 2);
        assert_eq!(table.stats.unparseable_rows, 1);
        assert_eq!(table.stats.clean_rows, 8);

        let by_year: Vec<(i32, u64)> = analysis
            .aggregates
            .by_year
            .iter()
            .map(|row| (row.year, row.count))
            .collect();
        assert_eq!(by_year, vec![(2019, 3), (2020, 3), (2021, 2)]);

        assert_eq!(analysis.aggregates.by_year_region.len(), 6);
        assert!(analysis
            .aggregates
            .by_year_region
            .iter()
            .all(|row| row.region != "MANHATTAN"));

        let shares = &analysis.aggregates.age_region_shares;
        assert_eq!(shares.len(), 5);
        assert!(shares.iter().all(|s| s.shooter_age_group != "UNKNOWN"));

        let trend = analysis.trend.as_ref().unwrap();
        assert!((trend.slope + 0.5).abs() < 1e-9);
        assert_eq!(trend.predictions.len(), 3);
        assert_eq!(trend.predictions[0].year, 2025);
    }

    #[test]
    fn test_run_is_idempotent() {
        let config = Config::default();
        let (_, first) = run(SAMPLE.as_bytes(), &config).unwrap();
        let (_, second) = run(SAMPLE.as_bytes(), &config).unwrap();

        assert_eq!(
            serde_json::to_string(&first.aggregates).unwrap(),
            serde_json::to_string(&second.aggregates).unwrap()
        );
        assert_eq!(first.trend.ok(), second.trend.ok());
    }

    #[test]
    fn test_single_year_keeps_aggregates() {
        let raw = "INCIDENT_KEY,OCCUR_DATE,BORO,STATISTICAL_MURDER_FLAG,PERP_AGE_GROUP,PERP_SEX,PERP_RACE,VIC_AGE_GROUP,VIC_SEX,VIC_RACE\n\
                   1,01/01/2022,BRONX,false,18-24,M,BLACK,18-24,M,BLACK\n\
                   2,06/01/2022,QUEENS,true,25-44,M,WHITE,25-44,F,WHITE\n";

        let (_, analysis) = run(raw.as_bytes(), &Config::default()).unwrap();
        assert_eq!(analysis.aggregates.by_year.len(), 1);
        assert!(matches!(
            analysis.trend,
            Err(PipelineError::ModelInput { distinct_years: 1 })
        ));
    }

    #[test]
    fn test_custom_prediction_years() {
        let mut config = Config::default();
        config.model.predict_years = vec![2022];

        let (_, analysis) = run(SAMPLE.as_bytes(), &config).unwrap();
        let trend = analysis.trend.unwrap();
        assert_eq!(trend.predictions.len(), 1);
        // 8/3 incidents/year on average at 2020, falling by 0.5 per year.
        let expected = 8.0 / 3.0 - 0.5 * 2.0;
        assert!((trend.predictions[0].predicted_count - expected).abs() < 1e-6);
    }
}

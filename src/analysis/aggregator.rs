//! Grouped counts and shares over the cleaned incident table.
//!
//! Every function here is a pure function of its inputs. Outputs are
//! sorted (year, then region or category) so repeated runs over the same
//! table produce identical tables.

use crate::config::AggregationConfig;
use crate::models::{
    AgeRegionShare, Aggregates, CategoryCount, CleanedTable, DemographicBreakdown,
    DemographicField, IncidentRecord, YearCount, YearRegionCount, YearlyMurders,
};
use std::collections::{BTreeMap, BTreeSet};

/// Demographic fields broken down in the report.
pub const REPORTED_DEMOGRAPHICS: [DemographicField; 5] = [
    DemographicField::VictimRace,
    DemographicField::VictimSex,
    DemographicField::VictimAgeGroup,
    DemographicField::ShooterRace,
    DemographicField::ShooterSex,
];

impl Aggregates {
    /// Compute every aggregate table from a cleaned table.
    pub fn compute(table: &CleanedTable, config: &AggregationConfig) -> Self {
        let records = &table.records;

        Self {
            by_year: count_by_year(records),
            by_year_region: count_by_year_region(records),
            age_region_shares: age_region_shares(records, &config.excluded_age_groups),
            murders_by_year: murders_by_year(records),
            demographics: REPORTED_DEMOGRAPHICS
                .iter()
                .map(|&field| DemographicBreakdown {
                    field,
                    categories: category_breakdown(records, field),
                })
                .collect(),
        }
    }
}

/// Count incidents per calendar year.
pub fn count_by_year(records: &[IncidentRecord]) -> Vec<YearCount> {
    let mut counts: BTreeMap<i32, u64> = BTreeMap::new();

    for record in records {
        *counts.entry(record.year()).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(year, count)| YearCount { year, count })
        .collect()
}

/// Count incidents per (year, region).
pub fn count_by_year_region(records: &[IncidentRecord]) -> Vec<YearRegionCount> {
    let mut counts: BTreeMap<(i32, &str), u64> = BTreeMap::new();

    for record in records {
        *counts
            .entry((record.year(), record.region.as_str()))
            .or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((year, region), count)| YearRegionCount {
            year,
            region: region.to_string(),
            count,
        })
        .collect()
}

/// Shooter age group shares within each region.
///
/// Rows with no age group, or with an age group in `excluded` (compared
/// case-insensitively after trimming), are dropped before the per-region
/// totals are taken, so each region's percentages sum to 100.
pub fn age_region_shares(records: &[IncidentRecord], excluded: &[String]) -> Vec<AgeRegionShare> {
    let mut counts: BTreeMap<(&str, &str), u64> = BTreeMap::new();

    for record in records {
        let Some(age_group) = record.shooter_age_group.as_deref() else {
            continue;
        };
        if is_placeholder(age_group, excluded) {
            continue;
        }
        *counts
            .entry((record.region.as_str(), age_group))
            .or_default() += 1;
    }

    let mut region_totals: BTreeMap<&str, u64> = BTreeMap::new();
    for (&(region, _), &count) in &counts {
        *region_totals.entry(region).or_default() += count;
    }

    counts
        .into_iter()
        .map(|((region, age_group), count)| {
            let total = region_totals.get(region).copied().unwrap_or(count);
            AgeRegionShare {
                shooter_age_group: age_group.to_string(),
                region: region.to_string(),
                count,
                percent: percent(count, total),
            }
        })
        .collect()
}

fn is_placeholder(value: &str, excluded: &[String]) -> bool {
    let value = value.trim();
    value.is_empty()
        || excluded
            .iter()
            .any(|placeholder| placeholder.trim().eq_ignore_ascii_case(value))
}

/// Incidents and statistical murders per calendar year.
pub fn murders_by_year(records: &[IncidentRecord]) -> Vec<YearlyMurders> {
    let mut counts: BTreeMap<i32, (u64, u64)> = BTreeMap::new();

    for record in records {
        let entry = counts.entry(record.year()).or_default();
        entry.0 += 1;
        if record.is_murder {
            entry.1 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(year, (incidents, murders))| YearlyMurders {
            year,
            incidents,
            murders,
            murder_rate: murders as f64 / incidents as f64,
        })
        .collect()
}

/// Category counts for one demographic field, largest first.
///
/// Missing values are counted under `UNKNOWN`.
pub fn category_breakdown(records: &[IncidentRecord], field: DemographicField) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();

    for record in records {
        let category = field.value(record).unwrap_or("UNKNOWN");
        *counts.entry(category).or_default() += 1;
    }

    let total = records.len() as u64;
    let mut categories: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
            percent: percent(count, total),
        })
        .collect();

    // Stable sort keeps the alphabetical order among equal counts
    categories.sort_by_key(|c| std::cmp::Reverse(c.count));
    categories
}

/// Distinct regions, sorted.
pub fn regions(by_year_region: &[YearRegionCount]) -> Vec<String> {
    by_year_region
        .iter()
        .map(|row| row.region.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CleaningStats;
    use chrono::NaiveDate;

    fn record(year: i32, region: &str, age: Option<&str>, is_murder: bool) -> IncidentRecord {
        IncidentRecord {
            incident_date: NaiveDate::from_ymd_opt(year, 3, 15).unwrap(),
            region: region.to_string(),
            location_class: None,
            is_murder,
            shooter_age_group: age.map(String::from),
            shooter_sex: Some("M".to_string()),
            shooter_race: None,
            victim_age_group: Some("25-44".to_string()),
            victim_sex: "M".to_string(),
            victim_race: "BLACK".to_string(),
        }
    }

    fn placeholders() -> Vec<String> {
        AggregationConfig::default().excluded_age_groups
    }

    #[test]
    fn test_count_by_year() {
        let records = vec![
            record(2020, "BRONX", None, false),
            record(2020, "QUEENS", None, false),
            record(2021, "BRONX", None, false),
        ];

        let by_year = count_by_year(&records);
        assert_eq!(
            by_year,
            vec![
                YearCount { year: 2020, count: 2 },
                YearCount { year: 2021, count: 1 },
            ]
        );
        let total: u64 = by_year.iter().map(|row| row.count).sum();
        assert_eq!(total, records.len() as u64);
    }

    #[test]
    fn test_count_by_year_region() {
        let records = vec![
            record(2020, "BRONX", None, false),
            record(2020, "BRONX", None, false),
            record(2020, "QUEENS", None, false),
            record(2021, "BRONX", None, false),
        ];

        let rows = count_by_year_region(&records);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].year, 2020);
        assert_eq!(rows[0].region, "BRONX");
        assert_eq!(rows[0].count, 2);
        assert_eq!(regions(&rows), vec!["BRONX", "QUEENS"]);
    }

    #[test]
    fn test_age_region_shares_single_region() {
        let records = vec![
            record(2020, "BRONX", Some("18-24"), false),
            record(2021, "BRONX", Some("18-24"), false),
            record(2022, "BRONX", Some("18-24"), false),
            record(2022, "BRONX", Some("25-44"), false),
        ];

        let shares = age_region_shares(&records, &placeholders());
        assert_eq!(shares.len(), 2);
        assert!((shares[0].percent - 75.0).abs() < 1e-9);
        assert!((shares[1].percent - 25.0).abs() < 1e-9);
        let sum: f64 = shares.iter().map(|s| s.percent).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_age_region_shares_filters_placeholders_by_value() {
        let mut records = vec![
            record(2020, "QUEENS", Some("UNKNOWN"), false),
            record(2020, "QUEENS", Some("18-24"), false),
            record(2020, "QUEENS", None, false),
            record(2020, "QUEENS", Some("1020"), false),
            record(2020, "QUEENS", Some("(null)"), false),
            record(2020, "BROOKLYN", Some("45-64"), false),
            record(2020, "BROOKLYN", Some("unknown"), false),
        ];

        let forward = age_region_shares(&records, &placeholders());
        records.reverse();
        let reversed = age_region_shares(&records, &placeholders());

        assert_eq!(forward, reversed);
        assert_eq!(forward.len(), 2);
        assert!(forward
            .iter()
            .all(|s| s.shooter_age_group != "UNKNOWN" && s.shooter_age_group != "1020"));
        for share in &forward {
            assert!((share.percent - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_age_region_shares_sum_per_region() {
        let records = vec![
            record(2020, "BRONX", Some("<18"), false),
            record(2020, "BRONX", Some("18-24"), false),
            record(2020, "BRONX", Some("25-44"), false),
            record(2020, "MANHATTAN", Some("18-24"), false),
            record(2020, "MANHATTAN", Some("25-44"), false),
            record(2020, "MANHATTAN", Some("25-44"), false),
        ];

        let shares = age_region_shares(&records, &placeholders());
        for region in ["BRONX", "MANHATTAN"] {
            let sum: f64 = shares
                .iter()
                .filter(|s| s.region == region)
                .map(|s| s.percent)
                .sum();
            assert!((sum - 100.0).abs() < 1e-9, "{} sums to {}", region, sum);
        }
    }

    #[test]
    fn test_murders_by_year() {
        let records = vec![
            record(2019, "BRONX", None, true),
            record(2019, "BRONX", None, false),
            record(2019, "BRONX", None, false),
            record(2019, "BRONX", None, true),
            record(2020, "BRONX", None, false),
        ];

        let rows = murders_by_year(&records);
        assert_eq!(rows[0].incidents, 4);
        assert_eq!(rows[0].murders, 2);
        assert!((rows[0].murder_rate - 0.5).abs() < 1e-12);
        assert_eq!(rows[1].murders, 0);
    }

    #[test]
    fn test_category_breakdown() {
        let mut records = vec![
            record(2020, "BRONX", None, false),
            record(2020, "BRONX", None, false),
            record(2020, "BRONX", None, false),
        ];
        records[0].victim_race = "WHITE".to_string();

        let breakdown = category_breakdown(&records, DemographicField::VictimRace);
        assert_eq!(breakdown[0].category, "BLACK");
        assert_eq!(breakdown[0].count, 2);
        assert_eq!(breakdown[1].category, "WHITE");

        let shooter_race = category_breakdown(&records, DemographicField::ShooterRace);
        assert_eq!(shooter_race.len(), 1);
        assert_eq!(shooter_race[0].category, "UNKNOWN");
        assert!((shooter_race[0].percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let table = CleanedTable {
            records: vec![
                record(2021, "QUEENS", Some("18-24"), true),
                record(2020, "BRONX", Some("25-44"), false),
                record(2020, "QUEENS", Some("UNKNOWN"), false),
            ],
            stats: CleaningStats::default(),
        };
        let config = AggregationConfig::default();

        let first = Aggregates::compute(&table, &config);
        let second = Aggregates::compute(&table, &config);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.demographics.len(), REPORTED_DEMOGRAPHICS.len());
    }
}

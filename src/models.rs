//! Data models for the incident trend report.
//!
//! This module contains the cleaned incident record, every derived table
//! produced by the aggregation and trend stages, and the report envelope
//! handed to the presentation layer.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One reported shooting incident after deduplication and cleaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Calendar date of the incident.
    pub incident_date: NaiveDate,
    /// Borough the incident occurred in.
    pub region: String,
    /// Scene classification, when the extract carries one.
    pub location_class: Option<String>,
    /// Statistical murder flag.
    pub is_murder: bool,
    pub shooter_age_group: Option<String>,
    pub shooter_sex: Option<String>,
    pub shooter_race: Option<String>,
    pub victim_age_group: Option<String>,
    pub victim_sex: String,
    pub victim_race: String,
}

impl IncidentRecord {
    /// Calendar year of the incident.
    pub fn year(&self) -> i32 {
        self.incident_date.year()
    }
}

/// Diagnostics gathered while cleaning the raw table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    /// Data rows in the source, excluding the header.
    pub raw_rows: usize,
    /// Rows dropped because their incident key was already seen.
    pub duplicates_removed: usize,
    /// Rows dropped because a field could not be parsed.
    pub unparseable_rows: usize,
    /// Rows that made it into the cleaned table.
    pub clean_rows: usize,
}

/// The cleaned incident table. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct CleanedTable {
    pub records: Vec<IncidentRecord>,
    pub stats: CleaningStats,
}

impl CleanedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest incident dates, or `None` for an empty table.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.iter().map(|r| r.incident_date).min()?;
        let last = self.records.iter().map(|r| r.incident_date).max()?;
        Some((first, last))
    }
}

/// Incident count for one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: i32,
    pub count: u64,
}

/// Incident count for one (year, region) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRegionCount {
    pub year: i32,
    pub region: String,
    pub count: u64,
}

/// Share of a region's incidents attributed to one shooter age group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeRegionShare {
    pub shooter_age_group: String,
    pub region: String,
    pub count: u64,
    /// Percentage of the region's total, in `0.0..=100.0`.
    pub percent: f64,
}

/// Incidents and statistical murders for one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyMurders {
    pub year: i32,
    pub incidents: u64,
    pub murders: u64,
    /// `murders / incidents`.
    pub murder_rate: f64,
}

/// Count and share of one category within a demographic breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
    pub percent: f64,
}

/// Demographic fields that can be broken down into category counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemographicField {
    ShooterAgeGroup,
    ShooterSex,
    ShooterRace,
    VictimAgeGroup,
    VictimSex,
    VictimRace,
}

impl DemographicField {
    /// Value of this field on a record, if present.
    pub fn value<'a>(&self, record: &'a IncidentRecord) -> Option<&'a str> {
        match self {
            DemographicField::ShooterAgeGroup => record.shooter_age_group.as_deref(),
            DemographicField::ShooterSex => record.shooter_sex.as_deref(),
            DemographicField::ShooterRace => record.shooter_race.as_deref(),
            DemographicField::VictimAgeGroup => record.victim_age_group.as_deref(),
            DemographicField::VictimSex => Some(record.victim_sex.as_str()),
            DemographicField::VictimRace => Some(record.victim_race.as_str()),
        }
    }

    /// Snake-case identifier, matching the serialized form.
    pub fn key(&self) -> &'static str {
        match self {
            DemographicField::ShooterAgeGroup => "shooter_age_group",
            DemographicField::ShooterSex => "shooter_sex",
            DemographicField::ShooterRace => "shooter_race",
            DemographicField::VictimAgeGroup => "victim_age_group",
            DemographicField::VictimSex => "victim_sex",
            DemographicField::VictimRace => "victim_race",
        }
    }
}

impl fmt::Display for DemographicField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemographicField::ShooterAgeGroup => write!(f, "Shooter Age Group"),
            DemographicField::ShooterSex => write!(f, "Shooter Sex"),
            DemographicField::ShooterRace => write!(f, "Shooter Race"),
            DemographicField::VictimAgeGroup => write!(f, "Victim Age Group"),
            DemographicField::VictimSex => write!(f, "Victim Sex"),
            DemographicField::VictimRace => write!(f, "Victim Race"),
        }
    }
}

/// Category breakdown for a single demographic field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicBreakdown {
    pub field: DemographicField,
    pub categories: Vec<CategoryCount>,
}

/// Every aggregate table derived from a cleaned incident table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub by_year: Vec<YearCount>,
    pub by_year_region: Vec<YearRegionCount>,
    pub age_region_shares: Vec<AgeRegionShare>,
    pub murders_by_year: Vec<YearlyMurders>,
    pub demographics: Vec<DemographicBreakdown>,
}

/// Predicted incident count for a queried year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub year: i32,
    /// Raw model output; neither rounded nor clamped at zero.
    pub predicted_count: f64,
}

/// Fitted trend line plus the predictions made with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub intercept: f64,
    pub slope: f64,
    pub r_squared: f64,
    /// Number of yearly observations the line was fitted on.
    pub observations: usize,
    pub predictions: Vec<Prediction>,
}

/// Metadata about the report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// URL or file path the dataset was read from.
    pub source: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Cleaning diagnostics.
    pub cleaning: CleaningStats,
    /// Earliest and latest incident dates in the cleaned table.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Wall-clock duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete trend report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub aggregates: Aggregates,
    /// Fitted trend, absent when the model could not be fitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendSummary>,
    /// Why the trend is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_error: Option<String>,
}

//! Deduplication, projection and parsing of raw incident rows.

use crate::cleaning::columns::ColumnMap;
use crate::error::PipelineError;
use crate::models::{CleanedTable, CleaningStats, IncidentRecord};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Why a single row was left out of the cleaned table.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RowRejection {
    MissingKey,
    BadDate(String),
    BadMurderFlag(String),
    MissingRegion,
}

/// Clean raw CSV bytes into the incident table.
///
/// Rows are deduplicated on `INCIDENT_KEY` (first occurrence wins) before
/// any field is parsed, so a duplicate of a malformed row is still counted
/// as a duplicate.
pub fn clean(raw: &[u8]) -> Result<CleanedTable, PipelineError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(raw);

    let columns = ColumnMap::from_headers(reader.headers()?)?;
    debug!("Resolved columns: {:?}", columns);

    let mut stats = CleaningStats::default();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for (index, row) in reader.records().enumerate() {
        let row = row?;
        stats.raw_rows += 1;

        let key = field(&row, columns.incident_key);
        if !key.is_empty() && !seen_keys.insert(key.to_string()) {
            stats.duplicates_removed += 1;
            continue;
        }

        match parse_row(&row, &columns) {
            Ok(record) => records.push(record),
            Err(rejection) => {
                // Header is line 1.
                debug!("Skipping line {}: {:?}", index + 2, rejection);
                stats.unparseable_rows += 1;
            }
        }
    }

    stats.clean_rows = records.len();

    if stats.duplicates_removed > 0 {
        info!(
            "Removed {} duplicate incident(s) by {}",
            stats.duplicates_removed,
            crate::cleaning::columns::INCIDENT_KEY
        );
    }
    if stats.unparseable_rows > 0 {
        warn!(
            "Excluded {} row(s) with unparseable fields",
            stats.unparseable_rows
        );
    }
    info!(
        "Cleaned {} of {} raw rows",
        stats.clean_rows, stats.raw_rows
    );

    Ok(CleanedTable { records, stats })
}

fn parse_row(row: &StringRecord, columns: &ColumnMap) -> Result<IncidentRecord, RowRejection> {
    if field(row, columns.incident_key).is_empty() {
        return Err(RowRejection::MissingKey);
    }

    let raw_date = field(row, columns.occur_date);
    let incident_date =
        parse_incident_date(raw_date).ok_or_else(|| RowRejection::BadDate(raw_date.to_string()))?;

    let raw_flag = field(row, columns.murder_flag);
    let is_murder =
        parse_flag(raw_flag).ok_or_else(|| RowRejection::BadMurderFlag(raw_flag.to_string()))?;

    let region = nullable(field(row, columns.boro)).ok_or(RowRejection::MissingRegion)?;

    Ok(IncidentRecord {
        incident_date,
        region,
        location_class: columns
            .location_class
            .and_then(|idx| nullable(field(row, idx))),
        is_murder,
        shooter_age_group: nullable(field(row, columns.perp_age_group)),
        shooter_sex: nullable(field(row, columns.perp_sex)),
        shooter_race: nullable(field(row, columns.perp_race)),
        victim_age_group: nullable(field(row, columns.vic_age_group)),
        victim_sex: nullable(field(row, columns.vic_sex)).unwrap_or_else(unknown),
        victim_race: nullable(field(row, columns.vic_race)).unwrap_or_else(unknown),
    })
}

fn field(row: &StringRecord, index: usize) -> &str {
    row.get(index).unwrap_or("")
}

fn unknown() -> String {
    "UNKNOWN".to_string()
}

/// Empty cells and the literal `(null)` become `None`.
fn nullable(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("(null)") {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse `MM/DD/YYYY`. The year must have exactly four digits.
pub fn parse_incident_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let year = value.rsplit('/').next()?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(value, "%m/%d/%Y").ok()
}

/// Parse the statistical murder flag.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "y" | "yes" | "1" => Some(true),
        "false" | "f" | "n" | "no" | "0" => Some(false),
        _ => None,
    }
}

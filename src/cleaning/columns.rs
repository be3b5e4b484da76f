//! Source column names and header resolution.
//!
//! The cleaned record keeps only the columns listed here. Anything else in
//! the header (coordinates, precinct, jurisdiction, time of day, free-text
//! location) is ignored, whatever its position.

use crate::error::PipelineError;
use csv::StringRecord;

pub const INCIDENT_KEY: &str = "INCIDENT_KEY";
pub const OCCUR_DATE: &str = "OCCUR_DATE";
pub const BORO: &str = "BORO";
pub const LOC_CLASSFCTN_DESC: &str = "LOC_CLASSFCTN_DESC";
pub const STATISTICAL_MURDER_FLAG: &str = "STATISTICAL_MURDER_FLAG";
pub const PERP_AGE_GROUP: &str = "PERP_AGE_GROUP";
pub const PERP_SEX: &str = "PERP_SEX";
pub const PERP_RACE: &str = "PERP_RACE";
pub const VIC_AGE_GROUP: &str = "VIC_AGE_GROUP";
pub const VIC_SEX: &str = "VIC_SEX";
pub const VIC_RACE: &str = "VIC_RACE";

/// Columns that must be present for the dataset to be usable.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    INCIDENT_KEY,
    OCCUR_DATE,
    BORO,
    STATISTICAL_MURDER_FLAG,
    PERP_AGE_GROUP,
    PERP_SEX,
    PERP_RACE,
    VIC_AGE_GROUP,
    VIC_SEX,
    VIC_RACE,
];

/// Positions of the kept columns within a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub incident_key: usize,
    pub occur_date: usize,
    pub boro: usize,
    /// Missing from older extracts.
    pub location_class: Option<usize>,
    pub murder_flag: usize,
    pub perp_age_group: usize,
    pub perp_sex: usize,
    pub perp_race: usize,
    pub vic_age_group: usize,
    pub vic_sex: usize,
    pub vic_race: usize,
}

impl ColumnMap {
    /// Resolve column positions from a header row.
    ///
    /// Fails with a schema error naming every missing required column.
    pub fn from_headers(headers: &StringRecord) -> Result<Self, PipelineError> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| position(name).is_none())
            .map(|name| name.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(PipelineError::Schema { missing });
        }

        let required = |name: &str| position(name).ok_or_else(|| PipelineError::Schema {
            missing: vec![name.to_string()],
        });

        Ok(Self {
            incident_key: required(INCIDENT_KEY)?,
            occur_date: required(OCCUR_DATE)?,
            boro: required(BORO)?,
            location_class: position(LOC_CLASSFCTN_DESC),
            murder_flag: required(STATISTICAL_MURDER_FLAG)?,
            perp_age_group: required(PERP_AGE_GROUP)?,
            perp_sex: required(PERP_SEX)?,
            perp_race: required(PERP_RACE)?,
            vic_age_group: required(VIC_AGE_GROUP)?,
            vic_sex: required(VIC_SEX)?,
            vic_race: required(VIC_RACE)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_reordered_headers() {
        let headers = StringRecord::from(vec![
            "Latitude", "VIC_RACE", "VIC_SEX", "VIC_AGE_GROUP", "PERP_RACE", "PERP_SEX",
            "PERP_AGE_GROUP", "STATISTICAL_MURDER_FLAG", "BORO", "OCCUR_DATE", "INCIDENT_KEY",
        ]);
        let map = ColumnMap::from_headers(&headers).unwrap();
        assert_eq!(map.incident_key, 10);
        assert_eq!(map.vic_race, 1);
        assert_eq!(map.location_class, None);
    }

    #[test]
    fn test_reports_all_missing_columns() {
        let headers = StringRecord::from(vec!["INCIDENT_KEY", "OCCUR_DATE", "PERP_SEX"]);
        match ColumnMap::from_headers(&headers) {
            Err(PipelineError::Schema { missing }) => {
                assert_eq!(missing.len(), 7);
                assert!(missing.contains(&BORO.to_string()));
                assert!(missing.contains(&VIC_RACE.to_string()));
                assert!(!missing.contains(&PERP_SEX.to_string()));
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }
}

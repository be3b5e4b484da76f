//! Pipeline error taxonomy.
//!
//! Fatal conditions get a variant here. Row-level problems (an unparseable
//! date, an unknown murder flag) are not errors: they are counted in
//! [`crate::models::CleaningStats`] and the row is skipped.

use thiserror::Error;

/// Errors raised by the ingest, cleaning and modelling stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport failure while downloading the dataset.
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// The server answered, but not with a success status.
    #[error("dataset server returned {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// A required column is absent from the header row.
    #[error("dataset is missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// Structurally malformed CSV (ragged rows, bad quoting, invalid UTF-8).
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    /// Not enough yearly observations to fit a line.
    #[error("trend model needs at least two distinct years, found {distinct_years}")]
    ModelInput { distinct_years: usize },
}

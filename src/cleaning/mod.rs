//! Ingestion and cleaning of the raw incident CSV.
//!
//! Turns the downloaded bytes into a deduplicated, renamed and typed
//! [`CleanedTable`](crate::models::CleanedTable).

pub mod cleaner;
pub mod columns;

pub use cleaner::clean;

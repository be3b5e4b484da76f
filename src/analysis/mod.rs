//! Aggregation and trend modelling over the cleaned incident table.

pub mod aggregator;
pub mod trend;

pub use aggregator::*;
pub use trend::TrendModel;

//! Dataset retrieval.
//!
//! This module downloads the incident CSV over HTTP, or reads it from a
//! local file when running offline.

pub mod fetcher;

pub use fetcher::{load_source, DatasetSource, FetchOptions};

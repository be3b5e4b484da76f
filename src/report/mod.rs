//! Report rendering and table export.

pub mod generator;
pub mod tables;

pub use generator::{generate_json_report, generate_markdown_report};
pub use tables::export_tables;

//! Report generation for benchmark results
//!
//! This crate provides:
//!
//! - The JSON-LD result model handed back to the platform
//! - JSON and CSV exports
//! - A console summary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod csv_export;
pub mod json_export;
pub mod model;
pub mod summary;

pub use csv_export::CsvExporter;
pub use json_export::JsonExporter;
pub use model::{Kpi, KpiValue, ResultModel};
pub use summary::render_summary;

/// Report writing errors
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// File could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

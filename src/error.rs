//! Error types for Posture Flux

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur while running the posture pipeline
#[derive(Debug, Error)]
pub enum PostureError {
    #[error("Failed to parse timestamp {value:?} in row {row}")]
    TimestampParse { row: usize, value: String },

    #[error("Row {row} is missing classifier feature {column}")]
    FeatureMissing { row: usize, column: &'static str },

    #[error("No observations for {0}")]
    EmptyDaySelected(NaiveDate),

    #[error("Failed to parse raw table: {0}")]
    Parse(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid classifier model: {0}")]
    Model(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

//! Posture Flux - posture-session analytics for smart-chair sensor logs
//!
//! Flux turns a raw, time-stamped sensor log into per-day posture statistics
//! through a deterministic pipeline: ingestion normalization → posture
//! classification → quality and session derivation → day aggregation.
//!
//! The classifier is an external, pre-trained artifact behind the
//! [`PostureClassifier`] trait; rendering is left to whatever consumes the
//! [`DayAnalysis`] output.

pub mod adapter;
pub mod aggregator;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod posture;
pub mod session;
pub mod source;
pub mod types;

pub use adapter::{RawRow, RawTable, RawTableAdapter};
pub use classifier::{FeatureMissingPolicy, NearestCentroidModel, PostureClassifier};
pub use error::PostureError;
pub use pipeline::{analyze_day, PostureProcessor, PostureService};
pub use posture::{Posture, PostureCode, PostureNames, QualityLevel};
pub use types::{DailyReport, DailySummary, DayAnalysis, SessionRow};

/// Crate version embedded in all reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "posture-flux";

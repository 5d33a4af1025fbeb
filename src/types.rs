//! Core types for the Posture Flux pipeline
//!
//! This module defines the tables that flow through each stage of the
//! pipeline: normalized observations, classified observations, session rows,
//! and the day-level summary handed to the presentation layer.

use crate::posture::{PostureCode, QualityLevel};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of classifier inputs per observation
pub const FEATURE_COUNT: usize = 18;

/// Classifier feature columns, in the order the model expects them
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "FSR0", "FSR1", "FSR2", "FSR3", "FSR4", "FSR5", "FSR6", "FSR7", "FSR8", "FSR9", "FSR10",
    "FSR11", "AccelX", "AccelY", "AccelZ", "GyroX", "GyroY", "GyroZ",
];

pub const TIMESTAMP_COLUMN: &str = "Timestamp";
pub const MPU_TEMP_COLUMN: &str = "MPUTemp";
pub const HUMIDITY_COLUMN: &str = "DHTHumidity";
pub const DHT_TEMP_COLUMN: &str = "DHTTemp";

/// Humidity value the sensor reports on a read fault
pub const HUMIDITY_SENTINEL: f64 = -1.0;

/// One cleaned sensor sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Position of the row in the raw table
    pub source_row: usize,
    /// Absolute sample time
    pub timestamp: DateTime<Utc>,
    /// Classifier inputs in `FEATURE_COLUMNS` order; `None` where absent or non-numeric
    pub features: [Option<f64>; FEATURE_COUNT],
    /// MPU-6050 die temperature (celsius)
    pub mpu_temp: Option<f64>,
    /// Relative humidity (%); `None` means unresolved (fault with no earlier valid reading)
    pub humidity: Option<f64>,
    /// DHT22 temperature (celsius)
    pub dht_temp: Option<f64>,
}

/// Why a raw row did not make it into the normalized table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRow {
    pub source_row: usize,
    /// Timestamp cell as received, rendered as text
    pub raw_timestamp: String,
}

/// Output of the ingestion normalizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub observations: Vec<Observation>,
    /// Rows dropped because their timestamp could not be parsed
    pub dropped: Vec<DroppedRow>,
    /// Leading humidity faults that had no earlier valid value to fill from
    pub unresolved_humidity: usize,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Fully populated classifier input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Observation with its predicted posture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedObservation {
    pub observation: Observation,
    pub code: PostureCode,
}

/// Observation enriched with the derived session columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub observation: Observation,
    pub code: PostureCode,
    pub quality: QualityLevel,
    /// Bad=0, Average=1, Good=2; `None` for unknown quality
    pub quality_score: Option<u8>,
    /// Seconds since the previous row of the same table (0 for the first row)
    pub dwell_seconds: f64,
    /// Hour of day (0-23) in the configured offset
    pub hour: u32,
    /// Whether the posture differs from the previous row's
    pub transition: bool,
}

/// Row count for one posture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostureCount {
    pub code: PostureCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub count: u32,
}

/// Row count and share for one quality level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityShare {
    pub quality: QualityLevel,
    pub count: u32,
    /// count / row_count
    pub proportion: f64,
}

/// One non-zero cell of the hour x posture matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyCount {
    pub hour: u32,
    pub code: PostureCode,
    pub count: u32,
}

/// Day-level statistics over one day's session rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub row_count: u32,
    /// Rows per posture, most frequent first (ties by code)
    pub frequency: Vec<PostureCount>,
    /// Rows per quality level present, in Good/Average/Bad/Unknown order
    pub quality: Vec<QualityShare>,
    /// Gap-based dwell seconds summed per posture
    pub dwell_seconds: BTreeMap<PostureCode, f64>,
    /// Sparse hour x posture counts, ordered by hour then code
    pub hourly: Vec<HourlyCount>,
    pub transitions: u32,
}

/// Latest observation of the day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPosture {
    pub timestamp: DateTime<Utc>,
    pub code: PostureCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub quality: QualityLevel,
    pub mpu_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub dht_temp: Option<f64>,
}

/// Quality score at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityPoint {
    pub timestamp: DateTime<Utc>,
    pub score: Option<u8>,
}

/// Environmental readings at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSample {
    pub timestamp: DateTime<Utc>,
    pub mpu_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub dht_temp: Option<f64>,
}

/// Everything the presentation layer needs for one selected day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub summary: DailySummary,
    pub current: CurrentPosture,
    pub quality_timeline: Vec<QualityPoint>,
    pub environment: Vec<EnvironmentSample>,
    /// Rows dropped by the feature-missing policy
    pub skipped_rows: u32,
}

/// Result of analyzing a selected day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DayAnalysis {
    /// No observations fall on the selected day
    NoData { date: NaiveDate },
    Report(Box<DailyReport>),
}

impl DayAnalysis {
    pub fn report(&self) -> Option<&DailyReport> {
        match self {
            DayAnalysis::Report(report) => Some(report),
            DayAnalysis::NoData { .. } => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, DayAnalysis::NoData { .. })
    }
}

/// Calendar day present in a table with its observation count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub rows: u32,
}

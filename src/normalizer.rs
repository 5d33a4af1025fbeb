//! Ingestion normalization
//!
//! This module turns the raw sensor table into a table of observations:
//! - Timestamps parsed to absolute UTC instants; unparseable rows dropped
//! - Humidity sensor faults (-1) forward-filled from the last valid reading
//! - Numeric cells extracted, missing cells kept as `None`

use crate::adapter::{RawRow, RawTable};
use crate::types::{
    DroppedRow, NormalizedTable, Observation, DHT_TEMP_COLUMN, FEATURE_COLUMNS, FEATURE_COUNT,
    HUMIDITY_COLUMN, HUMIDITY_SENTINEL, MPU_TEMP_COLUMN, TIMESTAMP_COLUMN,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use serde_json::Value;
use tracing::{debug, warn};

/// Naive layouts accepted for textual timestamps, tried in order
const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Normalizer for converting a raw table to observations
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    offset: FixedOffset,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(utc_offset())
    }
}

impl Normalizer {
    /// Naive timestamps are read as wall-clock time at `offset`
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Normalize a raw table. Never fails: bad rows are dropped and reported.
    pub fn normalize(&self, table: &RawTable) -> NormalizedTable {
        let mut observations = Vec::with_capacity(table.len());
        let mut dropped = Vec::new();

        for (source_row, row) in table.rows.iter().enumerate() {
            match row
                .get(TIMESTAMP_COLUMN)
                .and_then(|v| parse_timestamp(v, self.offset))
            {
                Some(timestamp) => observations.push(to_observation(source_row, timestamp, row)),
                None => {
                    debug!(row = source_row, "Dropping row with unparseable timestamp");
                    dropped.push(DroppedRow {
                        source_row,
                        raw_timestamp: row.timestamp_text(),
                    });
                }
            }
        }

        let unresolved_humidity = forward_fill_humidity(&mut observations);
        if unresolved_humidity > 0 {
            warn!(
                rows = unresolved_humidity,
                "Leading humidity faults have no earlier reading to fill from"
            );
        }

        NormalizedTable {
            observations,
            dropped,
            unresolved_humidity,
        }
    }
}

fn to_observation(source_row: usize, timestamp: DateTime<Utc>, row: &RawRow) -> Observation {
    let mut features = [None; FEATURE_COUNT];
    for (slot, column) in features.iter_mut().zip(FEATURE_COLUMNS) {
        *slot = row.number(column);
    }

    Observation {
        source_row,
        timestamp,
        features,
        mpu_temp: row.number(MPU_TEMP_COLUMN),
        humidity: row
            .number(HUMIDITY_COLUMN)
            .filter(|h| *h != HUMIDITY_SENTINEL),
        dht_temp: row.number(DHT_TEMP_COLUMN),
    }
}

/// Replace missing humidity with the last valid reading in row order.
///
/// Returns how many rows stay unresolved because no valid reading precedes them.
fn forward_fill_humidity(observations: &mut [Observation]) -> usize {
    let mut last_valid: Option<f64> = None;
    let mut unresolved = 0;

    for observation in observations.iter_mut() {
        match observation.humidity {
            Some(h) => last_valid = Some(h),
            None => {
                observation.humidity = last_valid;
                if last_valid.is_none() {
                    unresolved += 1;
                }
            }
        }
    }

    unresolved
}

/// Parse a timestamp cell.
///
/// Strings may be RFC 3339 or one of the naive layouts in `NAIVE_FORMATS`
/// (or a bare `YYYY-MM-DD`); naive values are interpreted at `offset`.
/// Numbers are Unix epoch seconds.
pub fn parse_timestamp(value: &Value, offset: FixedOffset) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim(), offset),
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                return DateTime::from_timestamp(secs, 0);
            }
            let secs = n.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos)
        }
        _ => None,
    }
}

fn parse_timestamp_str(s: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Calendar day of `timestamp` at `offset`
pub fn local_date(timestamp: &DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    timestamp.with_timezone(&offset).date_naive()
}

/// Hour of day (0-23) of `timestamp` at `offset`
pub fn local_hour(timestamp: &DateTime<Utc>, offset: FixedOffset) -> u32 {
    timestamp.with_timezone(&offset).hour()
}

/// The zero UTC offset
pub fn utc_offset() -> FixedOffset {
    Utc.fix()
}

//! Raw table ingestion
//!
//! The sensor log arrives as a table of rows keyed by column name (a
//! spreadsheet export rendered as JSON). This module parses the container
//! formats and gives typed, forgiving access to individual cells. It does no
//! cleaning; that is the normalizer's job.

use crate::error::PostureError;
use crate::types::{
    FEATURE_COLUMNS, HUMIDITY_COLUMN, HUMIDITY_SENTINEL, TIMESTAMP_COLUMN,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of the raw sensor table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRow(Map<String, Value>);

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style cell setter, mostly useful in tests and fixtures
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.0.insert(column.to_string(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Numeric cell value.
    ///
    /// Accepts JSON numbers and numeric strings; null, empty and non-numeric
    /// cells are missing.
    pub fn number(&self, column: &str) -> Option<f64> {
        match self.0.get(column)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// Timestamp cell rendered as text, for diagnostics
    pub fn timestamp_text(&self) -> String {
        match self.0.get(TIMESTAMP_COLUMN) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Raw sensor table in source order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTable {
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Problem found in a single raw row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowIssue {
    /// Row will be dropped by the normalizer
    TimestampUnparseable { value: String },
    /// Row cannot be classified without this column
    FeatureMissing { column: String },
    /// Humidity carries the sensor-fault sentinel or is absent
    HumiditySentinel,
}

impl RowIssue {
    /// Whether the issue removes the row from every downstream table
    pub fn drops_row(&self) -> bool {
        matches!(self, RowIssue::TimestampUnparseable { .. })
    }
}

/// Validation outcome for one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowValidation {
    pub index: usize,
    pub issues: Vec<RowIssue>,
}

/// Adapter for reading raw sensor tables
pub struct RawTableAdapter;

impl RawTableAdapter {
    /// Parse a JSON array of row objects
    pub fn parse_array(json: &str) -> Result<RawTable, PostureError> {
        let rows: Vec<RawRow> = serde_json::from_str(json)?;
        Ok(RawTable::new(rows))
    }

    /// Parse NDJSON with one row object per line
    pub fn parse_ndjson(ndjson: &str) -> Result<RawTable, PostureError> {
        let mut rows = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawRow>(trimmed) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    return Err(PostureError::Parse(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(RawTable::new(rows))
    }

    /// Check every row against the column contract.
    ///
    /// Only rows with at least one issue are returned.
    pub fn validate_rows(table: &RawTable, offset: chrono::FixedOffset) -> Vec<RowValidation> {
        table
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| RowValidation {
                index,
                issues: row_issues(row, offset),
            })
            .filter(|v| !v.issues.is_empty())
            .collect()
    }
}

fn row_issues(row: &RawRow, offset: chrono::FixedOffset) -> Vec<RowIssue> {
    let mut issues = Vec::new();

    let parsed = row
        .get(TIMESTAMP_COLUMN)
        .and_then(|v| crate::normalizer::parse_timestamp(v, offset));
    if parsed.is_none() {
        issues.push(RowIssue::TimestampUnparseable {
            value: row.timestamp_text(),
        });
    }

    for column in FEATURE_COLUMNS {
        if row.number(column).is_none() {
            issues.push(RowIssue::FeatureMissing {
                column: column.to_string(),
            });
        }
    }

    match row.number(HUMIDITY_COLUMN) {
        Some(h) if h != HUMIDITY_SENTINEL => {}
        _ => issues.push(RowIssue::HumiditySentinel),
    }

    issues
}

//! Raw data sources
//!
//! The pipeline only depends on the column contract of the raw table, not on
//! where it comes from. A source is anything that can produce a fresh table
//! on demand.

use crate::adapter::{RawTable, RawTableAdapter};
use crate::error::PostureError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Trait for raw table providers
pub trait RawDataSource: Send + Sync {
    /// Fetch the full observation history
    fn fetch(&self) -> Result<RawTable, PostureError>;
}

/// Container format of a raw table file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFormat {
    /// JSON array of row objects
    #[default]
    Json,
    /// One row object per line
    Ndjson,
}

impl TableFormat {
    pub fn parse(&self, contents: &str) -> Result<RawTable, PostureError> {
        match self {
            TableFormat::Json => RawTableAdapter::parse_array(contents),
            TableFormat::Ndjson => RawTableAdapter::parse_ndjson(contents),
        }
    }
}

/// Raw table read from a file on every fetch
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    format: TableFormat,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, format: TableFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }
}

impl RawDataSource for FileSource {
    fn fetch(&self) -> Result<RawTable, PostureError> {
        let contents = std::fs::read_to_string(&self.path)?;
        self.format.parse(&contents)
    }
}

/// Fixed in-memory table, mainly for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSource(pub RawTable);

impl RawDataSource for StaticSource {
    fn fetch(&self) -> Result<RawTable, PostureError> {
        Ok(self.0.clone())
    }
}

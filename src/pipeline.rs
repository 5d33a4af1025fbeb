//! Pipeline orchestration
//!
//! This module provides the public API for Posture Flux.
//! It runs the full pipeline from a raw sensor table to a day analysis.

use crate::adapter::RawTable;
use crate::aggregator::Aggregator;
use crate::cache::TableCache;
use crate::classifier::{ClassifierAdapter, FeatureMissingPolicy, PostureClassifier};
use crate::config::Config;
use crate::error::PostureError;
use crate::normalizer::{local_date, utc_offset, Normalizer};
use crate::posture::PostureNames;
use crate::session::SessionDeriver;
use crate::source::RawDataSource;
use crate::types::{
    CurrentPosture, DailyReport, DayAnalysis, DayCount, EnvironmentSample, NormalizedTable,
    Observation, QualityPoint, SessionRow,
};
use chrono::{FixedOffset, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Analyze one calendar day of a raw table with default settings
/// (UTC day boundaries, `AbortRow` policy, no display names).
///
/// # Example
/// ```ignore
/// let analysis = analyze_day(&table, classifier, date)?;
/// if let Some(report) = analysis.report() {
///     println!("{} rows", report.summary.row_count);
/// }
/// ```
pub fn analyze_day(
    table: &RawTable,
    classifier: Arc<dyn PostureClassifier>,
    date: NaiveDate,
) -> Result<DayAnalysis, PostureError> {
    PostureProcessor::new(classifier).analyze_day(table, date)
}

/// Calendar days present in a normalized table with their row counts,
/// oldest first. Days are taken at `offset`.
pub fn available_dates(normalized: &NormalizedTable, offset: FixedOffset) -> Vec<DayCount> {
    let mut days: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for observation in &normalized.observations {
        *days
            .entry(local_date(&observation.timestamp, offset))
            .or_insert(0) += 1;
    }
    days.into_iter()
        .map(|(date, rows)| DayCount { date, rows })
        .collect()
}

/// Session rows of one day plus the policy bookkeeping
struct DaySession {
    rows: Vec<SessionRow>,
    skipped: usize,
}

/// Pipeline with its classifier and settings bound.
///
/// Stages:
/// 1. Normalizer - parse timestamps, coerce numbers, fill humidity faults
/// 2. Day filter - keep observations on the selected local date
/// 3. ClassifierAdapter - assign posture codes under the missing-feature policy
/// 4. SessionDeriver - quality, dwell, hour and transition columns
/// 5. Aggregator - day summary
#[derive(Clone)]
pub struct PostureProcessor {
    classifier: Arc<dyn PostureClassifier>,
    policy: FeatureMissingPolicy,
    offset: FixedOffset,
    names: PostureNames,
}

impl PostureProcessor {
    pub fn new(classifier: Arc<dyn PostureClassifier>) -> Self {
        Self {
            classifier,
            policy: FeatureMissingPolicy::default(),
            offset: utc_offset(),
            names: PostureNames::default(),
        }
    }

    pub fn with_policy(mut self, policy: FeatureMissingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Offset used for naive timestamps, calendar days and hours
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_names(mut self, names: PostureNames) -> Self {
        self.names = names;
        self
    }

    /// Build a processor from the `[pipeline]` and `[names]` config sections
    pub fn from_config(
        classifier: Arc<dyn PostureClassifier>,
        config: &Config,
    ) -> Result<Self, PostureError> {
        let offset = config
            .utc_offset()
            .map_err(|e| PostureError::Config(e.to_string()))?;
        Ok(Self::new(classifier)
            .with_policy(config.feature_missing_policy())
            .with_offset(offset)
            .with_names(config.posture_names()))
    }

    pub fn policy(&self) -> FeatureMissingPolicy {
        self.policy
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn normalize(&self, table: &RawTable) -> NormalizedTable {
        Normalizer::new(self.offset).normalize(table)
    }

    /// Analyze the selected day of a raw table
    pub fn analyze_day(&self, table: &RawTable, date: NaiveDate) -> Result<DayAnalysis, PostureError> {
        let normalized = self.normalize(table);
        self.analyze_normalized(&normalized, date)
    }

    /// Analyze the selected day of an already normalized table
    pub fn analyze_normalized(
        &self,
        normalized: &NormalizedTable,
        date: NaiveDate,
    ) -> Result<DayAnalysis, PostureError> {
        let day = self.day_session(normalized, date)?;
        if day.rows.is_empty() {
            debug!(%date, "No observations for selected day");
            return Ok(DayAnalysis::NoData { date });
        }

        let summary = Aggregator::with_names(self.names.clone()).summarize(date, &day.rows)?;
        let current = self.current_posture(date, &day.rows)?;

        let quality_timeline = day
            .rows
            .iter()
            .map(|row| QualityPoint {
                timestamp: row.observation.timestamp,
                score: row.quality_score,
            })
            .collect();

        let environment = day
            .rows
            .iter()
            .map(|row| EnvironmentSample {
                timestamp: row.observation.timestamp,
                mpu_temp: row.observation.mpu_temp,
                humidity: row.observation.humidity,
                dht_temp: row.observation.dht_temp,
            })
            .collect();

        info!(%date, rows = summary.row_count, skipped = day.skipped, "Day analyzed");

        Ok(DayAnalysis::Report(Box::new(DailyReport {
            summary,
            current,
            quality_timeline,
            environment,
            skipped_rows: day.skipped as u32,
        })))
    }

    /// Session rows of the selected day, in timestamp order
    pub fn session_rows(
        &self,
        table: &RawTable,
        date: NaiveDate,
    ) -> Result<Vec<SessionRow>, PostureError> {
        let normalized = self.normalize(table);
        Ok(self.day_session(&normalized, date)?.rows)
    }

    /// Calendar days present in the table, oldest first
    pub fn available_dates(&self, normalized: &NormalizedTable) -> Vec<DayCount> {
        available_dates(normalized, self.offset)
    }

    /// Most recent calendar day in the table
    pub fn latest_date(&self, normalized: &NormalizedTable) -> Option<NaiveDate> {
        normalized
            .observations
            .iter()
            .map(|o| local_date(&o.timestamp, self.offset))
            .max()
    }

    fn day_session(
        &self,
        normalized: &NormalizedTable,
        date: NaiveDate,
    ) -> Result<DaySession, PostureError> {
        let day: Vec<Observation> = normalized
            .observations
            .iter()
            .filter(|o| local_date(&o.timestamp, self.offset) == date)
            .cloned()
            .collect();

        if day.is_empty() {
            return Ok(DaySession {
                rows: Vec::new(),
                skipped: 0,
            });
        }

        let classified = ClassifierAdapter::new(self.classifier.as_ref(), self.policy).classify(&day)?;
        let skipped = classified.skipped.len();
        let rows = SessionDeriver::new(self.offset).derive(classified.rows);

        Ok(DaySession { rows, skipped })
    }

    fn current_posture(
        &self,
        date: NaiveDate,
        rows: &[SessionRow],
    ) -> Result<CurrentPosture, PostureError> {
        let latest = rows.last().ok_or(PostureError::EmptyDaySelected(date))?;

        Ok(CurrentPosture {
            timestamp: latest.observation.timestamp,
            name: self.names.name_of(&latest.code).map(str::to_string),
            code: latest.code.clone(),
            quality: latest.quality,
            mpu_temp: latest.observation.mpu_temp,
            humidity: latest.observation.humidity,
            dht_temp: latest.observation.dht_temp,
        })
    }
}

/// Long-lived owner of the classifier, data source and table snapshot.
///
/// Each query reuses the cached raw table while it is younger than the
/// staleness window and refetches it otherwise.
pub struct PostureService {
    source: Box<dyn RawDataSource>,
    cache: TableCache,
    processor: PostureProcessor,
}

impl PostureService {
    pub fn new(source: Box<dyn RawDataSource>, processor: PostureProcessor) -> Self {
        Self {
            source,
            cache: TableCache::default(),
            processor,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = TableCache::new(ttl);
        self
    }

    /// Build a service with processor settings and cache ttl from config
    pub fn from_config(
        source: Box<dyn RawDataSource>,
        classifier: Arc<dyn PostureClassifier>,
        config: &Config,
    ) -> Result<Self, PostureError> {
        let processor = PostureProcessor::from_config(classifier, config)?;
        Ok(Self::new(source, processor).with_cache_ttl(config.cache_ttl()))
    }

    pub fn processor(&self) -> &PostureProcessor {
        &self.processor
    }

    /// Analyze `date` against the current table snapshot
    pub fn analyze(&mut self, date: NaiveDate) -> Result<DayAnalysis, PostureError> {
        self.analyze_at(Instant::now(), date)
    }

    pub fn analyze_at(&mut self, now: Instant, date: NaiveDate) -> Result<DayAnalysis, PostureError> {
        let table = self.snapshot_at(now)?;
        self.processor.analyze_day(&table, date)
    }

    /// Calendar days in the current table snapshot
    pub fn available_dates(&mut self) -> Result<Vec<DayCount>, PostureError> {
        let table = self.snapshot_at(Instant::now())?;
        Ok(self.processor.available_dates(&self.processor.normalize(&table)))
    }

    /// Force the next query to refetch the table
    pub fn refresh(&mut self) {
        self.cache.invalidate();
    }

    fn snapshot_at(&mut self, now: Instant) -> Result<Arc<RawTable>, PostureError> {
        let source = &self.source;
        self.cache.get_or_refresh_at(now, || source.fetch())
    }
}

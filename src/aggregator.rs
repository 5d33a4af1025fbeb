//! Day-level aggregation
//!
//! Reduces one day's session rows into a [`DailySummary`]: posture frequency,
//! quality shares, dwell totals, the sparse hour x posture matrix and the
//! transition count.
//!
//! Dwell totals are gap-based: each row contributes the time since the
//! previous sample. They approximate occupancy only for near-periodic
//! sampling; an irregular gap is attributed to the posture observed at the
//! end of the gap.

use crate::error::PostureError;
use crate::posture::{PostureCode, PostureNames, QualityLevel};
use crate::types::{DailySummary, HourlyCount, PostureCount, QualityShare, SessionRow};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Aggregator for one day's session rows
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    names: PostureNames,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach human-readable posture names to the frequency table
    pub fn with_names(names: PostureNames) -> Self {
        Self { names }
    }

    /// Summarize the rows of `date`.
    ///
    /// Callers check for an empty day first; an empty slice fails with
    /// [`PostureError::EmptyDaySelected`].
    pub fn summarize(
        &self,
        date: NaiveDate,
        rows: &[SessionRow],
    ) -> Result<DailySummary, PostureError> {
        if rows.is_empty() {
            return Err(PostureError::EmptyDaySelected(date));
        }

        let mut counts: BTreeMap<&PostureCode, u32> = BTreeMap::new();
        let mut quality_counts: BTreeMap<QualityLevel, u32> = BTreeMap::new();
        let mut dwell_seconds: BTreeMap<PostureCode, f64> = BTreeMap::new();
        let mut hourly: BTreeMap<(u32, &PostureCode), u32> = BTreeMap::new();
        let mut transitions = 0u32;

        for row in rows {
            *counts.entry(&row.code).or_insert(0) += 1;
            *quality_counts.entry(row.quality).or_insert(0) += 1;
            *dwell_seconds.entry(row.code.clone()).or_insert(0.0) += row.dwell_seconds;
            *hourly.entry((row.hour, &row.code)).or_insert(0) += 1;
            if row.transition {
                transitions += 1;
            }
        }

        let row_count = rows.len() as u32;

        Ok(DailySummary {
            date,
            row_count,
            frequency: self.frequency_table(counts),
            quality: quality_shares(quality_counts, row_count),
            dwell_seconds,
            hourly: hourly
                .into_iter()
                .map(|((hour, code), count)| HourlyCount {
                    hour,
                    code: code.clone(),
                    count,
                })
                .collect(),
            transitions,
        })
    }

    fn frequency_table(&self, counts: BTreeMap<&PostureCode, u32>) -> Vec<PostureCount> {
        let mut frequency: Vec<PostureCount> = counts
            .into_iter()
            .map(|(code, count)| PostureCount {
                name: self.names.name_of(code).map(str::to_string),
                code: code.clone(),
                count,
            })
            .collect();
        // stable: equal counts stay in code order
        frequency.sort_by(|a, b| b.count.cmp(&a.count));
        frequency
    }
}

fn quality_shares(counts: BTreeMap<QualityLevel, u32>, row_count: u32) -> Vec<QualityShare> {
    counts
        .into_iter()
        .map(|(quality, count)| QualityShare {
            quality,
            count,
            proportion: count as f64 / row_count as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Observation, FEATURE_COUNT};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn row(hour: u32, code: &str, dwell_seconds: f64, transition: bool) -> SessionRow {
        let code = PostureCode::new(code);
        let quality = code.quality();
        SessionRow {
            observation: Observation {
                source_row: 0,
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
                features: [Some(0.0); FEATURE_COUNT],
                mpu_temp: None,
                humidity: None,
                dht_temp: None,
            },
            code,
            quality,
            quality_score: quality.score(),
            dwell_seconds,
            hour,
            transition,
        }
    }

    fn sample_day() -> Vec<SessionRow> {
        vec![
            row(9, "A", 0.0, false),
            row(9, "A", 10.0, false),
            row(9, "C", 10.0, true),
            row(10, "K", 20.0, true),
            row(10, "A", 5.0, true),
            row(10, "Z", 5.0, true),
        ]
    }

    #[test]
    fn test_frequency_is_complete_and_ordered() {
        let summary = Aggregator::new().summarize(date(), &sample_day()).unwrap();

        let frequency: Vec<(&str, u32)> = summary
            .frequency
            .iter()
            .map(|f| (f.code.as_str(), f.count))
            .collect();
        assert_eq!(frequency, vec![("A", 3), ("C", 1), ("K", 1), ("Z", 1)]);
        assert_eq!(summary.row_count, 6);
    }

    #[test]
    fn test_quality_shares_include_unknown() {
        let summary = Aggregator::new().summarize(date(), &sample_day()).unwrap();

        let shares: Vec<(QualityLevel, u32)> =
            summary.quality.iter().map(|q| (q.quality, q.count)).collect();
        assert_eq!(
            shares,
            vec![
                (QualityLevel::Good, 3),
                (QualityLevel::Average, 1),
                (QualityLevel::Bad, 1),
                (QualityLevel::Unknown, 1),
            ]
        );
        assert!((summary.quality[0].proportion - 0.5).abs() < 1e-9);
        let total: f64 = summary.quality.iter().map(|q| q.proportion).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dwell_totals_partition_row_dwell() {
        let rows = sample_day();
        let summary = Aggregator::new().summarize(date(), &rows).unwrap();

        assert_eq!(summary.dwell_seconds[&PostureCode::new("A")], 15.0);
        assert_eq!(summary.dwell_seconds[&PostureCode::new("K")], 20.0);

        let by_posture: f64 = summary.dwell_seconds.values().sum();
        let by_row: f64 = rows.iter().map(|r| r.dwell_seconds).sum();
        assert_eq!(by_posture, by_row);
    }

    #[test]
    fn test_hourly_matrix_is_sparse() {
        let summary = Aggregator::new().summarize(date(), &sample_day()).unwrap();

        let cells: Vec<(u32, &str, u32)> = summary
            .hourly
            .iter()
            .map(|c| (c.hour, c.code.as_str(), c.count))
            .collect();
        assert_eq!(
            cells,
            vec![
                (9, "A", 2),
                (9, "C", 1),
                (10, "A", 1),
                (10, "K", 1),
                (10, "Z", 1)
            ]
        );
    }

    #[test]
    fn test_transition_count() {
        let summary = Aggregator::new().summarize(date(), &sample_day()).unwrap();
        assert_eq!(summary.transitions, 4);
        assert!(summary.transitions <= summary.row_count - 1);
    }

    #[test]
    fn test_names_attach_to_frequency() {
        let names = PostureNames::new().with_name("A", "Upright");
        let summary = Aggregator::with_names(names)
            .summarize(date(), &sample_day())
            .unwrap();

        assert_eq!(summary.frequency[0].name.as_deref(), Some("Upright"));
        assert_eq!(summary.frequency[1].name, None);
    }

    #[test]
    fn test_empty_day_fails_fast() {
        let err = Aggregator::new().summarize(date(), &[]).unwrap_err();
        assert!(matches!(err, PostureError::EmptyDaySelected(d) if d == date()));
    }
}

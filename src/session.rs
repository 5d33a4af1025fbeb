//! Quality and session derivation
//!
//! Enriches classified observations with the per-row session columns:
//! quality level and score, dwell seconds, hour of day, and transition flag.
//!
//! Rows are stable-sorted by timestamp first, so dwell and transitions are
//! computed in chronological order even if the source table was not.

use crate::normalizer::local_hour;
use crate::posture::PostureCode;
use crate::types::{ClassifiedObservation, SessionRow};
use chrono::{DateTime, FixedOffset, Utc};

/// Deriver for session rows
#[derive(Debug, Clone, Copy)]
pub struct SessionDeriver {
    offset: FixedOffset,
}

impl SessionDeriver {
    /// Hour of day is taken at `offset`
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Derive session rows from one table of classified observations
    pub fn derive(&self, mut rows: Vec<ClassifiedObservation>) -> Vec<SessionRow> {
        rows.sort_by_key(|r| r.observation.timestamp);

        let mut previous: Option<(DateTime<Utc>, PostureCode)> = None;
        let mut session = Vec::with_capacity(rows.len());

        for row in rows {
            let timestamp = row.observation.timestamp;
            let (dwell_seconds, transition) = match &previous {
                Some((prev_ts, prev_code)) => {
                    (dwell_between(*prev_ts, timestamp), *prev_code != row.code)
                }
                None => (0.0, false),
            };
            previous = Some((timestamp, row.code.clone()));

            let quality = row.code.quality();
            session.push(SessionRow {
                hour: local_hour(&timestamp, self.offset),
                quality,
                quality_score: quality.score(),
                dwell_seconds,
                transition,
                code: row.code,
                observation: row.observation,
            });
        }

        session
    }
}

/// Seconds elapsed from `previous` to `current`, never negative
fn dwell_between(previous: DateTime<Utc>, current: DateTime<Utc>) -> f64 {
    let millis = (current - previous).num_milliseconds();
    (millis as f64 / 1000.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::utc_offset;
    use crate::posture::QualityLevel;
    use crate::types::{Observation, FEATURE_COUNT};
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn classified(offset_secs: i64, code: &str) -> ClassifiedObservation {
        ClassifiedObservation {
            observation: Observation {
                source_row: offset_secs as usize,
                timestamp: base() + Duration::seconds(offset_secs),
                features: [Some(0.0); FEATURE_COUNT],
                mpu_temp: None,
                humidity: None,
                dht_temp: None,
            },
            code: PostureCode::new(code),
        }
    }

    fn deriver() -> SessionDeriver {
        SessionDeriver::new(utc_offset())
    }

    #[test]
    fn test_single_row_is_all_zero() {
        let rows = deriver().derive(vec![classified(0, "A")]);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].dwell_seconds, 0.0);
        assert!(!rows[0].transition);
        assert_eq!(rows[0].hour, 9);
        assert_eq!(rows[0].quality, QualityLevel::Good);
        assert_eq!(rows[0].quality_score, Some(2));
    }

    #[test]
    fn test_dwell_and_transitions() {
        let rows = deriver().derive(vec![
            classified(0, "A"),
            classified(30, "B"),
            classified(45, "B"),
            classified(105, "C"),
        ]);

        let dwell: Vec<f64> = rows.iter().map(|r| r.dwell_seconds).collect();
        assert_eq!(dwell, vec![0.0, 30.0, 15.0, 60.0]);

        let transitions: Vec<bool> = rows.iter().map(|r| r.transition).collect();
        assert_eq!(transitions, vec![false, true, false, true]);

        let qualities: Vec<QualityLevel> = rows.iter().map(|r| r.quality).collect();
        assert_eq!(
            qualities,
            vec![
                QualityLevel::Good,
                QualityLevel::Bad,
                QualityLevel::Bad,
                QualityLevel::Average
            ]
        );
    }

    #[test]
    fn test_rows_are_sorted_before_derivation() {
        let rows = deriver().derive(vec![
            classified(60, "B"),
            classified(0, "A"),
            classified(30, "A"),
        ]);

        let order: Vec<usize> = rows.iter().map(|r| r.observation.source_row).collect();
        assert_eq!(order, vec![0, 30, 60]);
        assert!(rows.iter().all(|r| r.dwell_seconds >= 0.0));
        assert_eq!(rows.iter().filter(|r| r.transition).count(), 1);
    }

    #[test]
    fn test_equal_timestamps_keep_source_order() {
        let mut first = classified(10, "A");
        first.observation.source_row = 1;
        let mut second = classified(10, "D");
        second.observation.source_row = 2;

        let rows = deriver().derive(vec![first, second]);

        assert_eq!(rows[0].code.as_str(), "A");
        assert_eq!(rows[1].code.as_str(), "D");
        assert_eq!(rows[1].dwell_seconds, 0.0);
        assert!(rows[1].transition);
    }

    #[test]
    fn test_unknown_code_degrades_to_unknown_quality() {
        let rows = deriver().derive(vec![classified(0, "Z"), classified(5, "Z")]);

        assert!(rows.iter().all(|r| r.quality == QualityLevel::Unknown));
        assert!(rows.iter().all(|r| r.quality_score.is_none()));
        assert!(!rows[1].transition);
    }

    #[test]
    fn test_hour_uses_offset() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let rows = SessionDeriver::new(offset).derive(vec![classified(0, "A")]);
        assert_eq!(rows[0].hour, 4);
    }

    #[test]
    fn test_sub_second_dwell() {
        let start = base();
        assert_eq!(
            dwell_between(start, start + Duration::milliseconds(1500)),
            1.5
        );
        assert_eq!(dwell_between(start + Duration::seconds(5), start), 0.0);
    }
}

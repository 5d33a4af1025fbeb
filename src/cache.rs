//! Time-bounded snapshot of the raw table
//!
//! The raw sensor table is refetched at most once per staleness window.
//! Within the window every query reuses the same immutable snapshot.

use crate::adapter::RawTable;
use crate::error::PostureError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default staleness window in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

#[derive(Debug, Clone)]
struct Snapshot {
    table: Arc<RawTable>,
    fetched_at: Instant,
}

/// Cache holding the last fetched raw table
#[derive(Debug, Clone)]
pub struct TableCache {
    ttl: Duration,
    snapshot: Option<Snapshot>,
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }
}

impl TableCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: None,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached table, fetching a new one if it is missing or stale
    pub fn get_or_refresh<F>(&mut self, fetch: F) -> Result<Arc<RawTable>, PostureError>
    where
        F: FnOnce() -> Result<RawTable, PostureError>,
    {
        self.get_or_refresh_at(Instant::now(), fetch)
    }

    /// Same as [`TableCache::get_or_refresh`] with an explicit clock.
    ///
    /// A failed fetch leaves the previous snapshot in place.
    pub fn get_or_refresh_at<F>(
        &mut self,
        now: Instant,
        fetch: F,
    ) -> Result<Arc<RawTable>, PostureError>
    where
        F: FnOnce() -> Result<RawTable, PostureError>,
    {
        if let Some(snapshot) = &self.snapshot {
            if now.saturating_duration_since(snapshot.fetched_at) < self.ttl {
                debug!("Reusing cached raw table");
                return Ok(Arc::clone(&snapshot.table));
            }
        }

        let table = Arc::new(fetch()?);
        info!(rows = table.len(), "Fetched raw table");
        self.snapshot = Some(Snapshot {
            table: Arc::clone(&table),
            fetched_at: now,
        });
        Ok(table)
    }

    /// Whether a snapshot exists and is younger than the ttl at `now`
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|s| now.saturating_duration_since(s.fetched_at) < self.ttl)
    }

    /// Drop the snapshot so the next query refetches
    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RawRow;
    use std::cell::Cell;

    fn table_of(rows: usize) -> RawTable {
        RawTable::new(vec![RawRow::new(); rows])
    }

    #[test]
    fn test_reuses_snapshot_within_ttl() {
        let mut cache = TableCache::new(Duration::from_secs(60));
        let start = Instant::now();
        let fetches = Cell::new(0);
        let fetch = || {
            fetches.set(fetches.get() + 1);
            Ok(table_of(fetches.get()))
        };

        let first = cache.get_or_refresh_at(start, fetch).unwrap();
        let second = cache
            .get_or_refresh_at(start + Duration::from_secs(59), fetch)
            .unwrap();

        assert_eq!(fetches.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.is_fresh_at(start + Duration::from_secs(30)));
    }

    #[test]
    fn test_refetches_after_ttl() {
        let mut cache = TableCache::new(Duration::from_secs(60));
        let start = Instant::now();

        cache.get_or_refresh_at(start, || Ok(table_of(1))).unwrap();
        assert!(!cache.is_fresh_at(start + Duration::from_secs(60)));

        let refreshed = cache
            .get_or_refresh_at(start + Duration::from_secs(60), || Ok(table_of(2)))
            .unwrap();
        assert_eq!(refreshed.len(), 2);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_snapshot() {
        let mut cache = TableCache::new(Duration::from_secs(60));
        let start = Instant::now();
        cache.get_or_refresh_at(start, || Ok(table_of(3))).unwrap();

        let later = start + Duration::from_secs(120);
        let err = cache.get_or_refresh_at(later, || Err(PostureError::Parse("offline".to_string())));
        assert!(err.is_err());

        // the first snapshot is still served inside its own window
        let retried = cache.get_or_refresh_at(start + Duration::from_secs(10), || {
            Ok(table_of(9))
        });
        assert_eq!(retried.unwrap().len(), 3);
    }

    #[test]
    fn test_invalidate_forces_refetch() {
        let mut cache = TableCache::default();
        let start = Instant::now();
        cache.get_or_refresh_at(start, || Ok(table_of(1))).unwrap();

        cache.invalidate();

        assert!(!cache.is_fresh_at(start));
        let table = cache.get_or_refresh_at(start, || Ok(table_of(4))).unwrap();
        assert_eq!(table.len(), 4);
    }
}

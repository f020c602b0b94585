//! Health snapshot for the enrichment fetcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EnrichmentHealth {
    pub backlog_size: usize,
    pub dropped_total: u64,
    pub fetched_total: u64,
    pub dropped_permanent_total: u64,
    pub rate_limit_paused_until: Option<DateTime<Utc>>,
}

/// Shared, cheaply-cloned (via `Arc`) health counters updated by every
/// worker task.
#[derive(Debug, Default)]
pub struct EnrichmentHealthTracker {
    fetched_total: AtomicU64,
    dropped_total: AtomicU64,
    dropped_permanent_total: AtomicU64,
    rate_limit_paused_until: Mutex<Option<DateTime<Utc>>>,
}

impl EnrichmentHealthTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetched(&self) {
        self.fetched_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_permanent(&self) {
        self.dropped_permanent_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_rate_limit_pause(&self, until: Option<DateTime<Utc>>) {
        *self
            .rate_limit_paused_until
            .lock()
            .expect("enrichment health mutex poisoned") = until;
    }

    #[must_use]
    pub fn snapshot(&self, backlog_size: usize) -> EnrichmentHealth {
        EnrichmentHealth {
            backlog_size,
            dropped_total: self.dropped_total.load(Ordering::Relaxed),
            fetched_total: self.fetched_total.load(Ordering::Relaxed),
            dropped_permanent_total: self.dropped_permanent_total.load(Ordering::Relaxed),
            rate_limit_paused_until: *self
                .rate_limit_paused_until
                .lock()
                .expect("enrichment health mutex poisoned"),
        }
    }
}

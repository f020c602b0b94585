//! Cursor tracking how far the pipeline has progressed through the upstream
//! event stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tracks the pipeline's read position against the upstream queue.
///
/// `last_event_time` is monotonically non-decreasing within a process
/// lifetime; it is the value the backfill gate (`now - last_event_time >
/// upstream_retention`) checks at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCursor {
    pub queue_id: u64,
    pub last_event_time: DateTime<Utc>,
    pub last_successful_poll_at: DateTime<Utc>,
}

impl PipelineCursor {
    #[must_use]
    pub fn new(queue_id: u64, at: DateTime<Utc>) -> Self {
        Self {
            queue_id,
            last_event_time: at,
            last_successful_poll_at: at,
        }
    }

    /// Advance `last_event_time` forward, never backward.
    pub fn observe_event_time(&mut self, event_time: DateTime<Utc>) {
        if event_time > self.last_event_time {
            self.last_event_time = event_time;
        }
    }

    pub fn observe_successful_poll(&mut self, at: DateTime<Utc>) {
        self.last_successful_poll_at = at;
    }

    /// Whether the gap since the last observed event exceeds the upstream
    /// queue's retention window, meaning a backfill is warranted.
    #[must_use]
    pub fn needs_backfill(&self, now: DateTime<Utc>, upstream_retention: chrono::Duration) -> bool {
        now - self.last_event_time > upstream_retention
    }
}

//! Per-endpoint health tracking: success rate, outage pause, suspect flag.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Consecutive failures spanning at least this long pause the queue.
const OUTAGE_FAILURE_THRESHOLD: u32 = 3;
const OUTAGE_SPAN_MINUTES: i64 = 5;
/// Window over which the rolling success rate is computed.
const SUCCESS_RATE_WINDOW_HOURS: i64 = 1;

/// Read-only snapshot of one profile's webhook endpoint health, surfaced by
/// the orchestrator's health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointHealth {
    pub queue_depth: usize,
    pub success_rate_1h: f64,
    pub last_successful_send_at: Option<DateTime<Utc>>,
    pub paused: bool,
    pub pause_reason: Option<String>,
    pub suspect: bool,
}

#[derive(Debug)]
struct Inner {
    sends: VecDeque<(DateTime<Utc>, bool)>,
    last_successful_send_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    first_failure_at: Option<DateTime<Utc>>,
    paused: bool,
    pause_reason: Option<String>,
    suspect: bool,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            sends: VecDeque::new(),
            last_successful_send_at: None,
            consecutive_failures: 0,
            first_failure_at: None,
            paused: false,
            pause_reason: None,
            suspect: false,
        }
    }
}

/// Owns one webhook endpoint's mutable health state; constructed per
/// profile by the dispatcher and handed to both the send loop and the
/// health surface, never a free-floating global (Design Notes).
#[derive(Debug, Default)]
pub struct EndpointHealthTracker {
    inner: Mutex<Inner>,
}

impl EndpointHealthTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, at: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("endpoint health mutex poisoned");
        inner.sends.push_back((at, true));
        prune(&mut inner.sends, at);
        inner.last_successful_send_at = Some(at);
        inner.consecutive_failures = 0;
        inner.first_failure_at = None;
        inner.paused = false;
        inner.pause_reason = None;
    }

    /// Record a failed send attempt. `reason` becomes the pause reason if
    /// this failure is the one that trips the outage threshold.
    pub fn record_failure(&self, at: DateTime<Utc>, reason: &str) {
        let mut inner = self.inner.lock().expect("endpoint health mutex poisoned");
        inner.sends.push_back((at, false));
        prune(&mut inner.sends, at);
        if inner.consecutive_failures == 0 {
            inner.first_failure_at = Some(at);
        }
        inner.consecutive_failures += 1;

        let spans_long_enough = inner
            .first_failure_at
            .is_some_and(|first| at - first >= Duration::minutes(OUTAGE_SPAN_MINUTES));
        if inner.consecutive_failures >= OUTAGE_FAILURE_THRESHOLD && spans_long_enough {
            inner.paused = true;
            inner.pause_reason = Some(reason.to_owned());
        }
    }

    pub fn mark_suspect(&self) {
        self.inner.lock().expect("endpoint health mutex poisoned").suspect = true;
    }

    #[must_use]
    pub fn snapshot(&self, at: DateTime<Utc>, queue_depth: usize) -> EndpointHealth {
        let inner = self.inner.lock().expect("endpoint health mutex poisoned");
        let mut window = inner.sends.clone();
        prune(&mut window, at);
        let success_rate_1h = if window.is_empty() {
            1.0
        } else {
            window.iter().filter(|(_, ok)| *ok).count() as f64 / window.len() as f64
        };
        EndpointHealth {
            queue_depth,
            success_rate_1h,
            last_successful_send_at: inner.last_successful_send_at,
            paused: inner.paused,
            pause_reason: inner.pause_reason.clone(),
            suspect: inner.suspect,
        }
    }
}

fn prune(sends: &mut VecDeque<(DateTime<Utc>, bool)>, now: DateTime<Utc>) {
    let cutoff = now - Duration::hours(SUCCESS_RATE_WINDOW_HOURS);
    while sends.front().is_some_and(|(at, _)| *at < cutoff) {
        sends.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn pauses_after_three_failures_spanning_five_minutes() {
        let tracker = EndpointHealthTracker::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        tracker.record_failure(t0, "transport error");
        tracker.record_failure(t0 + Duration::minutes(2), "transport error");
        tracker.record_failure(t0 + Duration::minutes(5), "transport error");
        let snap = tracker.snapshot(t0 + Duration::minutes(5), 0);
        assert!(snap.paused);
        assert_eq!(snap.pause_reason.as_deref(), Some("transport error"));
    }

    #[test]
    fn does_not_pause_if_failures_are_too_close_together() {
        let tracker = EndpointHealthTracker::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        tracker.record_failure(t0, "x");
        tracker.record_failure(t0 + Duration::seconds(10), "x");
        tracker.record_failure(t0 + Duration::seconds(20), "x");
        assert!(!tracker.snapshot(t0 + Duration::seconds(20), 0).paused);
    }

    #[test]
    fn success_clears_pause_and_resets_consecutive_failures() {
        let tracker = EndpointHealthTracker::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        tracker.record_failure(t0, "x");
        tracker.record_failure(t0 + Duration::minutes(2), "x");
        tracker.record_failure(t0 + Duration::minutes(5), "x");
        assert!(tracker.snapshot(t0 + Duration::minutes(5), 0).paused);
        tracker.record_success(t0 + Duration::minutes(6));
        let snap = tracker.snapshot(t0 + Duration::minutes(6), 0);
        assert!(!snap.paused);
        assert!(snap.pause_reason.is_none());
    }

    #[test]
    fn success_rate_over_window_is_a_simple_ratio() {
        let tracker = EndpointHealthTracker::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        tracker.record_success(t0);
        tracker.record_failure(t0 + Duration::seconds(1), "x");
        tracker.record_success(t0 + Duration::seconds(2));
        let snap = tracker.snapshot(t0 + Duration::seconds(2), 3);
        assert!((snap.success_rate_1h - (2.0 / 3.0)).abs() < 1e-9);
        assert_eq!(snap.queue_depth, 3);
    }

    #[test]
    fn stale_sends_age_out_of_the_window() {
        let tracker = EndpointHealthTracker::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        tracker.record_failure(t0, "x");
        let later = t0 + Duration::hours(2);
        tracker.record_success(later);
        let snap = tracker.snapshot(later, 0);
        assert_eq!(snap.success_rate_1h, 1.0);
    }
}

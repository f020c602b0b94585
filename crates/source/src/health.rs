//! State machine and health snapshot for the source client.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// State machine phase: `Idle -> Polling -> {Received, Empty, Error} -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePhase {
    Idle,
    Polling,
    Received,
    Empty,
    Error,
}

/// Read-only snapshot of the source client's health, exposed to the
/// orchestrator's health surface.
#[derive(Debug, Clone, Copy)]
pub struct SourceHealth {
    pub phase: SourcePhase,
    pub consecutive_errors: u32,
    pub first_error_at: Option<DateTime<Utc>>,
    pub last_successful_poll_at: Option<DateTime<Utc>>,
    pub auth_banned: bool,
}

impl SourceHealth {
    /// Health predicate component: source considered healthy when
    /// it has polled successfully within the last 5 minutes and has fewer
    /// than 3 consecutive errors and is not under a ban.
    #[must_use]
    pub fn is_healthy(&self, now: DateTime<Utc>) -> bool {
        if self.auth_banned || self.consecutive_errors >= 3 {
            return false;
        }
        match self.last_successful_poll_at {
            Some(at) => now - at <= chrono::Duration::minutes(5),
            None => false,
        }
    }
}

#[derive(Debug)]
struct Inner {
    phase: SourcePhase,
    consecutive_errors: u32,
    first_error_at: Option<DateTime<Utc>>,
    last_successful_poll_at: Option<DateTime<Utc>>,
    auth_banned: bool,
}

/// Owns the source client's mutable health state; cheap to clone via `Arc`
/// and safe to read from a different task than the one driving the poll
/// loop (Design Notes: no free-floating global — this is constructed by the
/// orchestrator and handed to both the poll loop and the health surface).
#[derive(Debug)]
pub struct SourceHealthTracker {
    inner: Mutex<Inner>,
}

impl Default for SourceHealthTracker {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: SourcePhase::Idle,
                consecutive_errors: 0,
                first_error_at: None,
                last_successful_poll_at: None,
                auth_banned: false,
            }),
        }
    }
}

impl SourceHealthTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_phase(&self, phase: SourcePhase) {
        self.inner.lock().expect("source health mutex poisoned").phase = phase;
    }

    pub fn record_success(&self, at: DateTime<Utc>, phase: SourcePhase) {
        let mut inner = self.inner.lock().expect("source health mutex poisoned");
        inner.phase = phase;
        inner.consecutive_errors = 0;
        inner.first_error_at = None;
        inner.last_successful_poll_at = Some(at);
    }

    pub fn record_error(&self, at: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("source health mutex poisoned");
        inner.phase = SourcePhase::Error;
        if inner.consecutive_errors == 0 {
            inner.first_error_at = Some(at);
        }
        inner.consecutive_errors += 1;
    }

    pub fn record_auth_ban(&self) {
        let mut inner = self.inner.lock().expect("source health mutex poisoned");
        inner.phase = SourcePhase::Error;
        inner.auth_banned = true;
    }

    #[must_use]
    pub fn snapshot(&self) -> SourceHealth {
        let inner = self.inner.lock().expect("source health mutex poisoned");
        SourceHealth {
            phase: inner.phase,
            consecutive_errors: inner.consecutive_errors,
            first_error_at: inner.first_error_at,
            last_successful_poll_at: inner.last_successful_poll_at,
            auth_banned: inner.auth_banned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_after_recent_success() {
        let tracker = SourceHealthTracker::new();
        let now = Utc::now();
        tracker.record_success(now, SourcePhase::Empty);
        assert!(tracker.snapshot().is_healthy(now));
    }

    #[test]
    fn unhealthy_after_three_consecutive_errors() {
        let tracker = SourceHealthTracker::new();
        let now = Utc::now();
        tracker.record_success(now, SourcePhase::Empty);
        tracker.record_error(now);
        tracker.record_error(now);
        tracker.record_error(now);
        assert!(!tracker.snapshot().is_healthy(now));
        assert_eq!(tracker.snapshot().consecutive_errors, 3);
    }

    #[test]
    fn unhealthy_when_auth_banned() {
        let tracker = SourceHealthTracker::new();
        let now = Utc::now();
        tracker.record_success(now, SourcePhase::Empty);
        tracker.record_auth_ban();
        assert!(!tracker.snapshot().is_healthy(now));
    }

    #[test]
    fn error_streak_resets_on_success() {
        let tracker = SourceHealthTracker::new();
        let now = Utc::now();
        tracker.record_error(now);
        tracker.record_error(now);
        tracker.record_success(now, SourcePhase::Received);
        assert_eq!(tracker.snapshot().consecutive_errors, 0);
    }
}

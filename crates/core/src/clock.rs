//! Clock abstraction.
//!
//! Detection windows, throttling, and backoff all reason about "now". Reading
//! [`chrono::Utc::now`] directly from inside that logic makes it impossible to
//! write a deterministic test for a 600-second rolling window. Every
//! component that needs the current time takes a `Arc<dyn Clock>` instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Return the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall-clock time via the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock whose value can be set and advanced explicitly. Used in tests that
/// need to assert on window boundaries, throttle expiry, and DST transitions
/// without depending on wall-clock timing.
#[derive(Debug)]
pub struct FixedClock {
    millis_since_epoch: AtomicI64,
}

impl FixedClock {
    /// Create a clock fixed at the given instant.
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            millis_since_epoch: AtomicI64::new(at.timestamp_millis()),
        }
    }

    /// Wrap in an `Arc` for sharing across components.
    #[must_use]
    pub fn shared(at: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self::new(at))
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, delta: chrono::Duration) {
        self.millis_since_epoch
            .fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }

    /// Set the clock to an explicit instant.
    pub fn set(&self, at: DateTime<Utc>) {
        self.millis_since_epoch
            .store(at.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis_since_epoch.load(Ordering::SeqCst))
            .expect("fixed clock millis always in range")
    }
}

/// Return a shared [`SystemClock`] for production use.
#[must_use]
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

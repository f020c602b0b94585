//! A simple async token bucket rate limiter.
//!
//! One instance guards each external API: the source-poll limiter, the
//! enrichment limiter, and one per webhook endpoint. Acquiring a token may
//! suspend the caller; release is implicit through time-based refill.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gatewatch_core::Clock;

/// Token bucket with a fixed capacity and refill rate.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    clock: Arc<dyn Clock>,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: chrono::DateTime<chrono::Utc>,
}

impl TokenBucket {
    /// Create a bucket that holds at most `capacity` tokens and refills at
    /// `refill_per_second` tokens/second, starting full.
    #[must_use]
    pub fn new(capacity: f64, refill_per_second: f64, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            capacity,
            refill_per_second,
            clock,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    fn refill_locked(&self, state: &mut BucketState) {
        let now = self.clock.now();
        let elapsed = (now - state.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
            state.last_refill = now;
        }
    }

    /// Try to take one token immediately, returning `false` without blocking
    /// if none is available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().expect("token bucket mutex poisoned");
        self.refill_locked(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// How long the caller should wait before a token becomes available, or
    /// `Duration::ZERO` if one is available now. Does not reserve the token.
    #[must_use]
    pub fn wait_hint(&self) -> Duration {
        let mut state = self.state.lock().expect("token bucket mutex poisoned");
        self.refill_locked(&mut state);
        if state.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let needed = 1.0 - state.tokens;
            Duration::from_secs_f64(needed / self.refill_per_second)
        }
    }

    /// Acquire a token, sleeping (real async sleep) as needed. Intended for
    /// production use with [`gatewatch_core::SystemClock`].
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            let wait = self.wait_hint();
            if wait.is_zero() {
                continue;
            }
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewatch_core::FixedClock;

    #[test]
    fn starts_full_and_drains() {
        let clock = FixedClock::shared(chrono::Utc::now());
        let bucket = TokenBucket::new(2.0, 1.0, clock);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn refills_over_time() {
        let clock = FixedClock::new(chrono::Utc::now());
        let clock = Arc::new(clock);
        let bucket = TokenBucket::new(1.0, 1.0, clock.clone());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        clock.advance(chrono::Duration::seconds(1));
        assert!(bucket.try_acquire());
    }

    #[test]
    fn wait_hint_reports_zero_when_available() {
        let clock = FixedClock::shared(chrono::Utc::now());
        let bucket = TokenBucket::new(5.0, 1.0, clock);
        assert_eq!(bucket.wait_hint(), Duration::ZERO);
    }

    #[test]
    fn respects_source_poll_ip_limit() {
        // Target <= 2 req/s per source IP.
        let clock = FixedClock::shared(chrono::Utc::now());
        let bucket = TokenBucket::new(2.0, 2.0, clock);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }
}

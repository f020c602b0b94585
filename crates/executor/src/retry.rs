//! Backoff strategies for retrying transient failures.
//!
//! Randomness used for jitter is injected through [`JitterSource`] rather
//! than read from a global RNG, so backoff timing is deterministic and
//! testable (Design Notes: no monkey-patching of clock/random in tests).

use std::time::Duration;

use rand::Rng;

/// Supplies jitter in `[0, max)` for a backoff delay.
pub trait JitterSource: Send + Sync + std::fmt::Debug {
    fn jitter(&self, max: Duration) -> Duration;
}

/// Jitter drawn from the thread-local RNG. Used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandJitter;

impl JitterSource for RandJitter {
    fn jitter(&self, max: Duration) -> Duration {
        if max.is_zero() {
            return Duration::ZERO;
        }
        let millis = max.as_millis().max(1) as u64;
        let picked = rand::thread_rng().gen_range(0..=millis);
        Duration::from_millis(picked)
    }
}

/// Jitter that always returns a fixed fraction of `max`. Used in tests that
/// need deterministic backoff delays.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter {
    pub fraction: f64,
}

impl FixedJitter {
    #[must_use]
    pub fn none() -> Self {
        Self { fraction: 0.0 }
    }
}

impl JitterSource for FixedJitter {
    fn jitter(&self, max: Duration) -> Duration {
        Duration::from_secs_f64(max.as_secs_f64() * self.fraction)
    }
}

/// Backoff delay computation, shared by the source client's poll retry, the
/// enrichment fetcher's requeue, and the webhook dispatcher's send retry.
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// A fixed delay on every attempt.
    Constant { delay: Duration },
    /// Doubles on each attempt starting from `base`, capped at `cap`, plus
    /// up to `jitter_max` of random jitter.
    Exponential {
        base: Duration,
        cap: Duration,
        jitter_max: Duration,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
            jitter_max: Duration::from_millis(250),
        }
    }
}

impl RetryStrategy {
    /// Compute the delay before the `attempt`-th retry (`attempt` is
    /// 1-indexed: the delay before the first retry uses `attempt == 1`).
    #[must_use]
    pub fn delay_for(&self, attempt: u32, jitter: &dyn JitterSource) -> Duration {
        match self {
            Self::Constant { delay } => *delay,
            Self::Exponential {
                base,
                cap,
                jitter_max,
            } => {
                let exp = attempt.saturating_sub(1).min(20);
                let scaled = base.as_millis().saturating_mul(1u128 << exp);
                let capped = scaled.min(cap.as_millis());
                let base_delay = Duration::from_millis(capped as u64);
                base_delay + jitter.jitter(*jitter_max)
            }
        }
    }
}

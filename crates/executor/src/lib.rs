//! Retry/backoff strategy and token-bucket rate limiting shared by the
//! enrichment fetcher, webhook dispatcher, and source client.
//!
//! Nothing here knows about HTTP, storage, or any specific external API; it
//! is pure scheduling policy so it can be unit tested without a network.

pub mod retry;
pub mod token_bucket;

pub use retry::{FixedJitter, JitterSource, RandJitter, RetryStrategy};
pub use token_bucket::TokenBucket;

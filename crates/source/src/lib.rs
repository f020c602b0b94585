//! Long-poll consumer of the upstream killmail queue.
//!
//! Produces `EventRef`s into a shared backlog; knows nothing about
//! enrichment, storage, or detection downstream.

pub mod client;
pub mod health;
pub mod payload;
pub mod run;

pub use client::{EventSource, HttpEventSource, PollOutcome, SourceClientConfig};
pub use health::{SourceHealth, SourceHealthTracker, SourcePhase};
pub use payload::{ParsedPayload, parse_queue_response};
pub use run::run as run_source_loop;

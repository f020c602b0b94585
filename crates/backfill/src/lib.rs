//! Startup backfill from the secondary historical API, bounded by event
//! count and upstream retention gap.

pub mod client;
pub mod error;
pub mod payload;
pub mod service;

pub use client::{HttpSecondaryHistoryApi, SecondaryHistoryApi};
pub use error::BackfillError;
pub use service::{BackfillConfig, BackfillReport, BackfillService};

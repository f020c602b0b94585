//! Enrichment fetcher: resolves event references into fully enriched events
//! under a bounded concurrency and rate-limit budget.

pub mod enricher;
pub mod error;
pub mod fetcher;
pub mod health;
pub mod region;

pub use enricher::{Enricher, HttpEnricher};
pub use error::FetchError;
pub use fetcher::{run as run_fetcher, FetcherConfig};
pub use health::{EnrichmentHealth, EnrichmentHealthTracker};
pub use region::{NullRegionLookup, RegionLookup, StaticRegionLookup};

//! Startup backfill: bounded historical recovery that bypasses the
//! Filter/Detector/Router entirely.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use gatewatch_core::RegionId;
use gatewatch_executor::TokenBucket;
use gatewatch_store::EventStore;

use crate::client::SecondaryHistoryApi;
use crate::error::BackfillError;

/// Tunables (defaults).
#[derive(Debug, Clone, Copy)]
pub struct BackfillConfig {
    pub max_events_per_run: usize,
    pub upstream_retention: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            max_events_per_run: 500,
            upstream_retention: Duration::from_secs(3 * 3600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    pub ran: bool,
    pub inserted: usize,
    pub regions_scanned: usize,
}

impl BackfillReport {
    fn skipped() -> Self {
        Self {
            ran: false,
            inserted: 0,
            regions_scanned: 0,
        }
    }
}

pub struct BackfillService {
    api: Arc<dyn SecondaryHistoryApi>,
    store: Arc<dyn EventStore>,
    token_bucket: Arc<TokenBucket>,
    config: BackfillConfig,
}

impl BackfillService {
    #[must_use]
    pub fn new(
        api: Arc<dyn SecondaryHistoryApi>,
        store: Arc<dyn EventStore>,
        token_bucket: Arc<TokenBucket>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            api,
            store,
            token_bucket,
            config,
        }
    }

    /// Run the gate check and, if triggered, fetch and insert history for
    /// every region in `regions`, stopping at `config.max_events_per_run`
    /// total or whenever a region's response crosses the cutoff.
    pub async fn run(
        &self,
        regions: &[RegionId],
        last_event_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<BackfillReport, BackfillError> {
        let gap = (now - last_event_time)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if gap <= self.config.upstream_retention {
            return Ok(BackfillReport::skipped());
        }

        info!(gap_seconds = gap.as_secs(), "backfill gate triggered");

        let mut inserted = 0usize;
        let mut regions_scanned = 0usize;
        let mut budget = self.config.max_events_per_run;

        for &region_id in regions {
            if budget == 0 {
                break;
            }

            self.token_bucket.acquire().await;
            regions_scanned += 1;

            let events = self.api.fetch_region(region_id, budget).await?;

            for event in events {
                if event.event_time < last_event_time {
                    // Newest-first iteration has crossed the cutoff.
                    break;
                }
                match self.store.insert_event(&event).await {
                    Ok(_) => {
                        inserted += 1;
                        budget -= 1;
                    }
                    Err(e) => warn!(error = %e, "backfill insert failed, continuing"),
                }
                if budget == 0 {
                    break;
                }
            }
        }

        info!(inserted, regions_scanned, "backfill complete");
        Ok(BackfillReport {
            ran: true,
            inserted,
            regions_scanned,
        })
    }
}

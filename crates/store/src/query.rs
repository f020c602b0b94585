use chrono::{DateTime, Utc};
use serde::Serialize;

use gatewatch_core::{LocationId, RegionId};

/// Parameters for [`crate::EventStore::query_events`].
///
/// `since` is required (the store never returns the full unbounded history);
/// `location_id` and `region_id` narrow further.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub since: DateTime<Utc>,
    pub location_id: Option<LocationId>,
    pub region_id: Option<RegionId>,
}

impl EventQuery {
    #[must_use]
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since,
            location_id: None,
            region_id: None,
        }
    }

    #[must_use]
    pub fn at_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    #[must_use]
    pub fn in_region(mut self, region_id: RegionId) -> Self {
        self.region_id = Some(region_id);
        self
    }
}

/// Event/finding counts by partition, used by the health surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub event_count: i64,
    pub finding_count_1h: i64,
}

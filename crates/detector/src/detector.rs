//! Async wrapper wiring the decision rule to the Event Store.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use gatewatch_core::{AreaEffectPlatforms, Clock, GatecampFinding, LocationId};
use gatewatch_store::{EventQuery, EventStore, StoreError};

use crate::rule::{evaluate, DetectorConfig};

/// Detects gatecamp patterns by querying the store's rolling window for a
/// location each time a new event lands there. Per-location work is
/// logically single-writer; this type holds no mutable state of
/// its own beyond its configuration, so sharding across locations is just a
/// matter of calling it from multiple tasks.
pub struct Detector {
    store: Arc<dyn EventStore>,
    area_effect: Arc<AreaEffectPlatforms>,
    clock: Arc<dyn Clock>,
    config: DetectorConfig,
}

impl Detector {
    #[must_use]
    pub fn new(
        store: Arc<dyn EventStore>,
        area_effect: Arc<AreaEffectPlatforms>,
        clock: Arc<dyn Clock>,
        config: DetectorConfig,
    ) -> Self {
        Self {
            store,
            area_effect,
            clock,
            config,
        }
    }

    /// Evaluate the window ending at `event_time` for `location_id`. If a
    /// finding results, it is recorded to the store before being returned so
    /// the caller (Notification Router) never has to.
    pub async fn on_event(
        &self,
        location_id: LocationId,
        event_time: DateTime<Utc>,
    ) -> Result<Option<GatecampFinding>, StoreError> {
        let window = chrono::Duration::from_std(self.config.window)
            .unwrap_or_else(|_| chrono::Duration::seconds(600));
        let since = event_time - window;

        let events = self
            .store
            .query_events(EventQuery::since(since).at_location(location_id))
            .await?;

        let now = self.clock.now();
        let finding = evaluate(&events, &self.area_effect, &self.config, now);

        if let Some(finding) = &finding {
            self.store.record_finding(finding).await?;
        }

        Ok(finding)
    }
}

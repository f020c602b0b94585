//! The notification router's output: a bounded, stateful [`Alert`] destined
//! for the webhook dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::TriggerKind;
use crate::types::{LocationId, ProfileId};

/// Lifecycle state of an alert. `Delivered`, `Failed`, and `Dropped` are
/// terminal; the dispatcher never transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Queued,
    Sending,
    Delivered,
    Failed,
    Dropped,
}

impl AlertState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed | Self::Dropped)
    }
}

/// An alert queued for delivery to a profile's webhook.
///
/// The notification router owns the alert's lifecycle up to `queued`; from
/// there the dispatcher mutates only `state` and `attempt_count` through
/// [`crate::alert::Alert::record_attempt`] and friends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: Uuid,
    pub profile_id: ProfileId,
    pub trigger_kind: TriggerKind,
    pub location_id: LocationId,
    /// Structured payload opaque to the dispatcher; rendered by an external
    /// persona/voice layer out of scope for this crate.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub state: AlertState,
}

impl Alert {
    #[must_use]
    pub fn new(
        profile_id: ProfileId,
        trigger_kind: TriggerKind,
        location_id: LocationId,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            profile_id,
            trigger_kind,
            location_id,
            payload,
            created_at,
            attempt_count: 0,
            state: AlertState::Queued,
        }
    }

    /// The throttling key this alert occupies: `(profile, location, trigger)`.
    #[must_use]
    pub fn throttle_key(&self) -> (ProfileId, LocationId, TriggerKind) {
        (
            self.profile_id.clone(),
            self.location_id,
            self.trigger_kind,
        )
    }

    pub fn mark_sending(&mut self) {
        self.state = AlertState::Sending;
    }

    pub fn record_attempt(&mut self) {
        self.attempt_count += 1;
    }

    pub fn mark_delivered(&mut self) {
        self.state = AlertState::Delivered;
    }

    pub fn mark_failed(&mut self) {
        self.state = AlertState::Failed;
    }

    pub fn mark_dropped(&mut self) {
        self.state = AlertState::Dropped;
    }
}

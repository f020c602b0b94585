//! Per-`(profile, location, trigger)` throttle table.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use gatewatch_core::{Confidence, LocationId, ProfileId, TriggerKind};

/// The throttling key: watchlist and gatecamp triggers for the same
/// location do not shadow each other, since `trigger_kind` is part of the
/// key.
pub type ThrottleKey = (ProfileId, LocationId, TriggerKind);

/// State recorded the last time an alert was queued for a given key.
/// `confidence` is only meaningful for `gatecamp_detected` entries, where it
/// lets a later, higher-confidence finding upgrade the pending alert's
/// payload in place instead of emitting a second one.
#[derive(Debug, Clone)]
pub struct ThrottleEntry {
    pub queued_at: DateTime<Utc>,
    pub alert_id: Uuid,
    pub confidence: Option<Confidence>,
}

/// Guards every `(profile_id, location_id, trigger_kind)` key behind its own
/// short critical section (a `DashMap` shard lock) rather than one global
/// mutex.
#[derive(Debug, Default)]
pub struct ThrottleTable {
    entries: DashMap<ThrottleKey, ThrottleEntry>,
}

impl ThrottleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a prior alert for `key` was queued within `window` of `now`.
    #[must_use]
    pub fn is_throttled(&self, key: &ThrottleKey, now: DateTime<Utc>, window: std::time::Duration) -> bool {
        let Some(entry) = self.entries.get(key) else {
            return false;
        };
        now - entry.queued_at < to_chrono(window)
    }

    /// The current entry for `key`, if the key has ever been recorded.
    #[must_use]
    pub fn get(&self, key: &ThrottleKey) -> Option<ThrottleEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    pub fn record(&self, key: ThrottleKey, entry: ThrottleEntry) {
        self.entries.insert(key, entry);
    }
}

fn to_chrono(window: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key() -> ThrottleKey {
        (ProfileId::new("alpha"), LocationId::new(1), TriggerKind::WatchlistActivity)
    }

    #[test]
    fn unseen_key_is_never_throttled() {
        let table = ThrottleTable::new();
        let now = Utc::now();
        assert!(!table.is_throttled(&key(), now, std::time::Duration::from_secs(300)));
    }

    #[test]
    fn recorded_key_is_throttled_within_window() {
        let table = ThrottleTable::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        table.record(
            key(),
            ThrottleEntry {
                queued_at: t0,
                alert_id: Uuid::new_v4(),
                confidence: None,
            },
        );
        assert!(table.is_throttled(&key(), t0 + chrono::Duration::seconds(30), std::time::Duration::from_secs(300)));
        assert!(!table.is_throttled(&key(), t0 + chrono::Duration::seconds(301), std::time::Duration::from_secs(300)));
    }

    #[test]
    fn different_trigger_kinds_do_not_shadow_each_other() {
        let table = ThrottleTable::new();
        let now = Utc::now();
        table.record(
            (ProfileId::new("alpha"), LocationId::new(1), TriggerKind::WatchlistActivity),
            ThrottleEntry {
                queued_at: now,
                alert_id: Uuid::new_v4(),
                confidence: None,
            },
        );
        let gatecamp_key = (ProfileId::new("alpha"), LocationId::new(1), TriggerKind::GatecampDetected);
        assert!(!table.is_throttled(&gatecamp_key, now, std::time::Duration::from_secs(300)));
    }
}

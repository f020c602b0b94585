//! The notification router proper.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use gatewatch_core::{
    Alert, Clock, Event, GatecampFinding, ProfileId, RegionLookup, TriggerKind, WatchlistProfile,
};

use crate::payload::{event_payload, finding_payload};
use crate::quiet_hours::is_quiet;
use crate::sink::AlertSink;
use crate::throttle::{ThrottleEntry, ThrottleTable};

/// A single `(profile_id, trigger_kind)` match produced by the filter
/// evaluator for one event. Mirrors `gatewatch_filter::classify::Match`
/// field-for-field so this crate doesn't need to depend on
/// `gatewatch-filter` just to call [`NotificationRouter::on_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMatch {
    pub profile_id: ProfileId,
    pub trigger_kind: TriggerKind,
}

/// Routes matched events and detector findings into throttled, quiet-hours
/// aware alerts, handed to an [`AlertSink`] for delivery.
pub struct NotificationRouter {
    profiles: RwLock<Arc<HashMap<ProfileId, WatchlistProfile>>>,
    throttle: ThrottleTable,
    sink: Arc<dyn AlertSink>,
    region_lookup: Arc<dyn RegionLookup>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for NotificationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRouter")
            .field("profile_count", &self.profile_count())
            .finish_non_exhaustive()
    }
}

impl NotificationRouter {
    #[must_use]
    pub fn new(
        profiles: Vec<WatchlistProfile>,
        sink: Arc<dyn AlertSink>,
        region_lookup: Arc<dyn RegionLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profiles: RwLock::new(Arc::new(index_by_profile_id(profiles))),
            throttle: ThrottleTable::new(),
            sink,
            region_lookup,
            clock,
        }
    }

    /// Swap in a new profile set. Mirrors `gatewatch_filter::Evaluator::reload`;
    /// the orchestrator reloads both snapshots together.
    pub fn reload(&self, profiles: Vec<WatchlistProfile>) {
        *self.profiles.write().expect("router lock poisoned") = Arc::new(index_by_profile_id(profiles));
    }

    #[must_use]
    pub fn profile_count(&self) -> usize {
        self.profiles.read().expect("router lock poisoned").len()
    }

    /// Handle one enriched event against the matches the filter evaluator
    /// produced for it.
    pub fn on_event(&self, event: &Event, matches: &[EventMatch]) {
        let profiles = self.profiles.read().expect("router lock poisoned").clone();
        let now = self.clock.now();

        for m in matches {
            let Some(profile) = profiles.get(&m.profile_id) else {
                continue;
            };
            if !profile.enabled {
                continue;
            }
            if profile.quiet_hours.as_ref().is_some_and(|qh| is_quiet(qh, now)) {
                debug!(profile = %profile.name, "event alert suppressed by quiet hours");
                continue;
            }

            let key = (m.profile_id.clone(), event.location_id, m.trigger_kind);
            if self.throttle.is_throttled(&key, now, profile.throttle_window) {
                debug!(profile = %profile.name, trigger = %m.trigger_kind, "event alert throttled");
                continue;
            }

            let payload = event_payload(event, m.trigger_kind);
            let alert = Alert::new(m.profile_id.clone(), m.trigger_kind, event.location_id, payload, now);
            self.throttle.record(
                key,
                ThrottleEntry {
                    queued_at: now,
                    alert_id: alert.alert_id,
                    confidence: None,
                },
            );
            info!(profile = %profile.name, trigger = %m.trigger_kind, "alert queued");
            self.sink.enqueue(alert);
        }
    }

    /// Handle a gatecamp finding: dispatched to every enabled profile whose
    /// `location_scope` includes the finding's region.
    pub fn on_finding(&self, finding: &GatecampFinding) {
        let Some(region_id) = self.region_lookup.region_for(finding.location_id) else {
            warn!(location_id = %finding.location_id, "finding at unresolvable region, dropping");
            return;
        };
        let profiles = self.profiles.read().expect("router lock poisoned").clone();
        let now = self.clock.now();

        for profile in profiles.values() {
            if !profile.enabled || !profile.triggers.gatecamp_detected {
                continue;
            }
            if !profile.location_scope.contains(&region_id) {
                continue;
            }
            if profile.quiet_hours.as_ref().is_some_and(|qh| is_quiet(qh, now)) {
                debug!(profile = %profile.name, "gatecamp alert suppressed by quiet hours");
                continue;
            }

            let profile_id = ProfileId::new(profile.name.clone());
            let key = (profile_id.clone(), finding.location_id, TriggerKind::GatecampDetected);

            if let Some(existing) = self.throttle.get(&key) {
                if now - existing.queued_at < to_chrono(profile.throttle_window) {
                    self.upgrade_in_place(profile, &key, &existing, finding);
                    continue;
                }
            }

            let payload = finding_payload(finding);
            let alert = Alert::new(profile_id, TriggerKind::GatecampDetected, finding.location_id, payload, now);
            self.throttle.record(
                key,
                ThrottleEntry {
                    queued_at: now,
                    alert_id: alert.alert_id,
                    confidence: Some(finding.confidence),
                },
            );
            info!(profile = %profile.name, confidence = %finding.confidence, "gatecamp alert queued");
            self.sink.enqueue(alert);
        }
    }

    /// A new finding arrived for a key that's still within its throttle
    /// window. Never emits a second alert; if the new finding outranks the
    /// one the pending alert was built from, rewrite that alert's payload
    /// in place instead (dedup/upgrade).
    fn upgrade_in_place(
        &self,
        profile: &WatchlistProfile,
        key: &crate::throttle::ThrottleKey,
        existing: &ThrottleEntry,
        finding: &GatecampFinding,
    ) {
        let outranks = existing.confidence.is_none_or(|c| finding.confidence > c);
        if !outranks {
            return;
        }
        let payload = finding_payload(finding);
        if self.sink.try_update_payload(existing.alert_id, payload) {
            self.throttle.record(
                key.clone(),
                ThrottleEntry {
                    queued_at: existing.queued_at,
                    alert_id: existing.alert_id,
                    confidence: Some(finding.confidence),
                },
            );
            info!(profile = %profile.name, confidence = %finding.confidence, "gatecamp alert upgraded in place");
        }
    }
}

fn index_by_profile_id(profiles: Vec<WatchlistProfile>) -> HashMap<ProfileId, WatchlistProfile> {
    profiles.into_iter().map(|p| (ProfileId::new(p.name.clone()), p)).collect()
}

fn to_chrono(window: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::test_support::RecordingSink;
    use gatewatch_core::{
        Confidence, EntityId, EventId, FixedClock, LocationId, NullRegionLookup, OrgId, RegionId,
        StaticRegionLookup, VehicleTypeId,
    };
    use std::collections::{BTreeSet, HashMap as StdHashMap};
    use std::time::Duration;

    fn profile(name: &str) -> WatchlistProfile {
        WatchlistProfile {
            schema_version: gatewatch_core::CURRENT_SCHEMA_VERSION,
            name: name.into(),
            display_name: name.into(),
            enabled: true,
            webhook_url: "https://example.com/hook".into(),
            triggers: gatewatch_core::Triggers::default(),
            throttle_window: Duration::from_secs(300),
            quiet_hours: None,
            location_scope: BTreeSet::new(),
            watched_orgs: BTreeSet::new(),
            watched_alliances: BTreeSet::new(),
            rate_limit_policy: gatewatch_core::RateLimitPolicy::default(),
            delivery_policy: gatewatch_core::DeliveryPolicy::default(),
        }
    }

    fn event() -> Event {
        let mut vehicles = BTreeSet::new();
        vehicles.insert(VehicleTypeId::new(1));
        Event::new(
            EventId::new(1),
            chrono::Utc::now(),
            LocationId::new(10),
            RegionId::new(1),
            EntityId::new(1),
            OrgId::new(100),
            None,
            1,
            BTreeSet::new(),
            BTreeSet::new(),
            vehicles,
            VehicleTypeId::new(1),
            0.0,
            false,
            chrono::Utc::now(),
        )
        .unwrap()
    }

    fn finding(location_id: LocationId, confidence: Confidence) -> GatecampFinding {
        GatecampFinding {
            location_id,
            window_seconds: 600,
            kill_count: 3,
            attacker_org_ids: BTreeSet::new(),
            attacker_vehicle_type_ids: BTreeSet::new(),
            confidence,
            last_event_time: chrono::Utc::now(),
            is_chain_area_attack: false,
            force_asymmetry: 5.0,
            detected_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn on_event_queues_one_alert_for_a_single_matching_profile() {
        let sink = Arc::new(RecordingSink::default());
        let router = NotificationRouter::new(
            vec![profile("alpha")],
            sink.clone(),
            Arc::new(NullRegionLookup),
            FixedClock::shared(chrono::Utc::now()),
        );
        let matches = vec![EventMatch {
            profile_id: ProfileId::new("alpha"),
            trigger_kind: TriggerKind::WatchlistActivity,
        }];
        router.on_event(&event(), &matches);
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
    }

    #[test]
    fn second_event_within_throttle_window_is_suppressed() {
        let sink = Arc::new(RecordingSink::default());
        let clock = FixedClock::shared(chrono::Utc::now());
        let router = NotificationRouter::new(vec![profile("alpha")], sink.clone(), Arc::new(NullRegionLookup), clock.clone());
        let matches = vec![EventMatch {
            profile_id: ProfileId::new("alpha"),
            trigger_kind: TriggerKind::WatchlistActivity,
        }];
        router.on_event(&event(), &matches);
        clock.advance(chrono::Duration::seconds(60));
        router.on_event(&event(), &matches);
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
    }

    #[test]
    fn disabled_profile_never_produces_an_alert() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = profile("alpha");
        p.enabled = false;
        let router = NotificationRouter::new(
            vec![p],
            sink.clone(),
            Arc::new(NullRegionLookup),
            FixedClock::shared(chrono::Utc::now()),
        );
        let matches = vec![EventMatch {
            profile_id: ProfileId::new("alpha"),
            trigger_kind: TriggerKind::WatchlistActivity,
        }];
        router.on_event(&event(), &matches);
        assert!(sink.alerts.lock().unwrap().is_empty());
    }

    #[test]
    fn quiet_hours_suppress_event_alerts() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = profile("alpha");
        p.quiet_hours = Some(gatewatch_core::QuietHours {
            enabled: true,
            start: "00:00".into(),
            end: "23:59".into(),
            timezone: "UTC".into(),
        });
        let router = NotificationRouter::new(
            vec![p],
            sink.clone(),
            Arc::new(NullRegionLookup),
            FixedClock::shared(chrono::Utc::now()),
        );
        let matches = vec![EventMatch {
            profile_id: ProfileId::new("alpha"),
            trigger_kind: TriggerKind::WatchlistActivity,
        }];
        router.on_event(&event(), &matches);
        assert!(sink.alerts.lock().unwrap().is_empty());
    }

    #[test]
    fn on_finding_dispatches_to_profiles_whose_scope_includes_the_region() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = profile("alpha");
        p.triggers.gatecamp_detected = true;
        p.location_scope.insert(RegionId::new(42));
        let mut table = StdHashMap::new();
        table.insert(10, 42);
        let router = NotificationRouter::new(
            vec![p],
            sink.clone(),
            Arc::new(StaticRegionLookup::new(table)),
            FixedClock::shared(chrono::Utc::now()),
        );
        router.on_finding(&finding(LocationId::new(10), Confidence::Medium));
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
    }

    #[test]
    fn on_finding_skips_profiles_outside_location_scope() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = profile("alpha");
        p.triggers.gatecamp_detected = true;
        p.location_scope.insert(RegionId::new(999));
        let mut table = StdHashMap::new();
        table.insert(10, 42);
        let router = NotificationRouter::new(
            vec![p],
            sink.clone(),
            Arc::new(StaticRegionLookup::new(table)),
            FixedClock::shared(chrono::Utc::now()),
        );
        router.on_finding(&finding(LocationId::new(10), Confidence::Medium));
        assert!(sink.alerts.lock().unwrap().is_empty());
    }

    #[test]
    fn higher_confidence_finding_upgrades_pending_alert_instead_of_queuing_a_second_one() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = profile("alpha");
        p.triggers.gatecamp_detected = true;
        p.location_scope.insert(RegionId::new(42));
        let mut table = StdHashMap::new();
        table.insert(10, 42);
        let clock = FixedClock::shared(chrono::Utc::now());
        let router = NotificationRouter::new(vec![p], sink.clone(), Arc::new(StaticRegionLookup::new(table)), clock.clone());

        router.on_finding(&finding(LocationId::new(10), Confidence::Low));
        clock.advance(chrono::Duration::seconds(30));
        router.on_finding(&finding(LocationId::new(10), Confidence::High));

        let alerts = sink.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].payload["confidence"], "high");
    }

    #[test]
    fn lower_or_equal_confidence_finding_within_window_does_not_touch_pending_alert() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = profile("alpha");
        p.triggers.gatecamp_detected = true;
        p.location_scope.insert(RegionId::new(42));
        let mut table = StdHashMap::new();
        table.insert(10, 42);
        let clock = FixedClock::shared(chrono::Utc::now());
        let router = NotificationRouter::new(vec![p], sink.clone(), Arc::new(StaticRegionLookup::new(table)), clock.clone());

        router.on_finding(&finding(LocationId::new(10), Confidence::High));
        clock.advance(chrono::Duration::seconds(30));
        router.on_finding(&finding(LocationId::new(10), Confidence::Medium));

        let alerts = sink.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].payload["confidence"], "high");
    }

    #[test]
    fn reload_swaps_profile_snapshot() {
        let sink = Arc::new(RecordingSink::default());
        let router = NotificationRouter::new(vec![profile("alpha")], sink, Arc::new(NullRegionLookup), FixedClock::shared(chrono::Utc::now()));
        assert_eq!(router.profile_count(), 1);
        router.reload(vec![profile("alpha"), profile("beta")]);
        assert_eq!(router.profile_count(), 2);
    }
}

//! Event classification against a watchlist profile snapshot.

use gatewatch_core::{Event, ProfileId, TriggerKind, WatchlistProfile};

/// A single matched `(profile_id, trigger_kind)` pair for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub profile_id: ProfileId,
    pub trigger_kind: TriggerKind,
}

/// Evaluate one profile's triggers against one event. Returns every trigger
/// kind that matches; a profile may appear multiple times in the caller's
/// aggregated result (once per matching trigger).
#[must_use]
pub fn classify_against(profile: &WatchlistProfile, event: &Event) -> Vec<TriggerKind> {
    if !profile.enabled {
        return Vec::new();
    }

    let mut matches = Vec::new();
    let t = &profile.triggers;

    if t.watchlist_activity && watchlist_activity_matches(profile, event) {
        matches.push(TriggerKind::WatchlistActivity);
    }
    if t.high_value_threshold > 0 && event.total_value >= t.high_value_threshold as f64 {
        matches.push(TriggerKind::HighValue);
    }
    if !profile.location_scope.is_empty() && profile.location_scope.contains(&event.region_id) {
        matches.push(TriggerKind::LocationScope);
    }
    if t.war_activity && war_activity_matches(profile, event) {
        matches.push(TriggerKind::WarActivity);
    }
    if t.npc_faction_kill.is_enabled() && npc_faction_kill_matches(profile, event) {
        matches.push(TriggerKind::NpcFactionKill);
    }

    matches
}

fn watchlist_activity_matches(profile: &WatchlistProfile, event: &Event) -> bool {
    if profile.watched_orgs.contains(&event.victim_org_id) {
        return true;
    }
    if let Some(alliance) = event.victim_alliance_id {
        if profile.watched_alliances.contains(&alliance) {
            return true;
        }
    }
    if !profile.watched_orgs.is_disjoint(&event.attacker_org_ids) {
        return true;
    }
    !profile
        .watched_alliances
        .is_disjoint(&event.attacker_alliance_ids)
}

/// A watched org/alliance appears on the attacker side of an event whose
/// victim is not also watched: the watched side is the aggressor.
fn war_activity_matches(profile: &WatchlistProfile, event: &Event) -> bool {
    let attacker_side_watched = !profile.watched_orgs.is_disjoint(&event.attacker_org_ids)
        || !profile
            .watched_alliances
            .is_disjoint(&event.attacker_alliance_ids);
    if !attacker_side_watched {
        return false;
    }
    let victim_watched = profile.watched_orgs.contains(&event.victim_org_id)
        || event
            .victim_alliance_id
            .is_some_and(|a| profile.watched_alliances.contains(&a));
    !victim_watched
}

fn npc_faction_kill_matches(profile: &WatchlistProfile, event: &Event) -> bool {
    let faction_ids = match &profile.triggers.npc_faction_kill {
        gatewatch_core::NpcFactionKillTrigger::Detailed { faction_ids, .. } => faction_ids,
        _ => return false,
    };
    event
        .attacker_org_ids
        .iter()
        .any(|org| faction_ids.contains(&org.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gatewatch_core::{
        AllianceId, EntityId, EventId, LocationId, NpcFactionKillTrigger, OrgId, RegionId,
        Triggers, VehicleTypeId,
    };
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn base_profile() -> WatchlistProfile {
        WatchlistProfile {
            schema_version: gatewatch_core::CURRENT_SCHEMA_VERSION,
            name: "alpha".into(),
            display_name: "Alpha".into(),
            enabled: true,
            webhook_url: "https://example.com/hook".into(),
            triggers: Triggers::default(),
            throttle_window: Duration::from_secs(300),
            quiet_hours: None,
            location_scope: BTreeSet::new(),
            watched_orgs: BTreeSet::new(),
            watched_alliances: BTreeSet::new(),
            rate_limit_policy: gatewatch_core::RateLimitPolicy::default(),
            delivery_policy: gatewatch_core::DeliveryPolicy::default(),
        }
    }

    fn base_event() -> Event {
        let mut vehicles = BTreeSet::new();
        vehicles.insert(VehicleTypeId::new(600));
        Event::new(
            EventId::new(1),
            Utc::now(),
            LocationId::new(1),
            RegionId::new(10),
            EntityId::new(1),
            OrgId::new(100),
            None,
            1,
            BTreeSet::from([OrgId::new(200)]),
            BTreeSet::new(),
            vehicles,
            VehicleTypeId::new(600),
            1_000_000.0,
            false,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn disabled_profile_never_matches() {
        let mut profile = base_profile();
        profile.enabled = false;
        profile.triggers.watchlist_activity = true;
        profile.watched_orgs.insert(OrgId::new(100));
        assert!(classify_against(&profile, &base_event()).is_empty());
    }

    #[test]
    fn watchlist_activity_matches_victim_org() {
        let mut profile = base_profile();
        profile.triggers.watchlist_activity = true;
        profile.watched_orgs.insert(OrgId::new(100));
        assert_eq!(
            classify_against(&profile, &base_event()),
            vec![TriggerKind::WatchlistActivity]
        );
    }

    #[test]
    fn high_value_threshold_zero_disables() {
        let mut profile = base_profile();
        profile.triggers.high_value_threshold = 0;
        assert!(classify_against(&profile, &base_event()).is_empty());
    }

    #[test]
    fn high_value_threshold_matches_at_or_above() {
        let mut profile = base_profile();
        profile.triggers.high_value_threshold = 1_000_000;
        assert_eq!(
            classify_against(&profile, &base_event()),
            vec![TriggerKind::HighValue]
        );
    }

    #[test]
    fn location_scope_matches_region() {
        let mut profile = base_profile();
        profile.location_scope.insert(RegionId::new(10));
        assert_eq!(
            classify_against(&profile, &base_event()),
            vec![TriggerKind::LocationScope]
        );
    }

    #[test]
    fn war_activity_requires_watched_side_be_aggressor() {
        let mut profile = base_profile();
        profile.triggers.war_activity = true;
        profile.watched_orgs.insert(OrgId::new(200));
        assert_eq!(
            classify_against(&profile, &base_event()),
            vec![TriggerKind::WarActivity]
        );
    }

    #[test]
    fn war_activity_does_not_match_when_victim_also_watched() {
        let mut profile = base_profile();
        profile.triggers.war_activity = true;
        profile.watched_orgs.insert(OrgId::new(200));
        profile.watched_orgs.insert(OrgId::new(100));
        assert!(classify_against(&profile, &base_event()).is_empty());
    }

    #[test]
    fn npc_faction_kill_matches_configured_faction_id() {
        let mut profile = base_profile();
        profile.triggers.npc_faction_kill = NpcFactionKillTrigger::Detailed {
            enabled: true,
            faction_ids: BTreeSet::from([200]),
        };
        assert_eq!(
            classify_against(&profile, &base_event()),
            vec![TriggerKind::NpcFactionKill]
        );
    }

    #[test]
    fn npc_faction_kill_bare_bool_never_matches_without_faction_ids() {
        let mut profile = base_profile();
        profile.triggers.npc_faction_kill = NpcFactionKillTrigger::Enabled(true);
        assert!(classify_against(&profile, &base_event()).is_empty());
    }

    #[test]
    fn alliance_match_is_checked_for_watchlist_activity() {
        let mut profile = base_profile();
        profile.triggers.watchlist_activity = true;
        profile.watched_alliances.insert(AllianceId::new(5));
        let mut event = base_event();
        event.victim_alliance_id = Some(AllianceId::new(5));
        assert_eq!(
            classify_against(&profile, &event),
            vec![TriggerKind::WatchlistActivity]
        );
    }
}

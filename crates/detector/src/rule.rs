//! The gatecamp decision rule and confidence scoring, as pure functions over
//! an already-fetched event window.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};

use gatewatch_core::{
    AreaEffectPlatforms, Confidence, Event, GatecampFinding, OrgId, VehicleTypeId,
};

/// Detection window/threshold tunables (defaults).
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    pub window: Duration,
    pub min_events: usize,
    pub area_window: Duration,
    pub area_min_events: usize,
    pub force_asymmetry_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(600),
            min_events: 3,
            area_window: Duration::from_secs(60),
            area_min_events: 3,
            force_asymmetry_threshold: 5.0,
        }
    }
}

/// Apply the decision rule to one location's event window. `events` must
/// already be filtered to the rolling window and share a `location_id`.
/// Returns `None` when fewer than `min_events` are present or the camp test
/// fails (a lone small group losing ships fast, per the edge policy).
#[must_use]
pub fn evaluate(
    events: &[Event],
    area_effect: &AreaEffectPlatforms,
    config: &DetectorConfig,
    now: DateTime<Utc>,
) -> Option<GatecampFinding> {
    if events.len() < config.min_events {
        return None;
    }

    let distinct_victim_orgs: std::collections::HashSet<OrgId> =
        events.iter().map(|e| e.victim_org_id).collect();

    let mut attacker_org_freq: HashMap<OrgId, u32> = HashMap::new();
    let mut attacker_org_ids: BTreeSet<OrgId> = BTreeSet::new();
    let mut attacker_vehicle_type_ids: BTreeSet<VehicleTypeId> = BTreeSet::new();
    let mut minor_count = 0usize;

    for event in events {
        for org in &event.attacker_org_ids {
            *attacker_org_freq.entry(*org).or_insert(0) += 1;
            attacker_org_ids.insert(*org);
        }
        attacker_vehicle_type_ids.extend(event.attacker_vehicle_type_ids.iter().copied());
        if event.is_minor_kill {
            minor_count += 1;
        }
    }

    let event_count = events.len();
    let mean_attacker_count =
        events.iter().map(Event::attacker_count_f64).sum::<f64>() / event_count as f64;

    let is_camp =
        distinct_victim_orgs.len() > 1 || mean_attacker_count >= config.force_asymmetry_threshold;
    if !is_camp {
        return None;
    }

    let non_minor_count = event_count - minor_count;
    let minor_kill_ratio = minor_count as f64 / non_minor_count.max(1) as f64;

    let most_frequent_count = attacker_org_freq.values().copied().max().unwrap_or(0);
    let dominant_attacker_share = f64::from(most_frequent_count) / event_count as f64;

    let is_area_attack = area_attack_detected(events, area_effect, config);
    let high_force_asymmetry = mean_attacker_count >= config.force_asymmetry_threshold;

    let mut score = if event_count >= 5 { 2 } else { 1 };
    if minor_kill_ratio >= 0.5 {
        score += 1;
    }
    if dominant_attacker_share >= 0.7 {
        score += 1;
    }
    if is_area_attack {
        score += 1;
    }
    if high_force_asymmetry {
        score += 1;
    }

    let last_event_time = events
        .iter()
        .map(|e| e.event_time)
        .max()
        .expect("events non-empty, checked above");

    Some(GatecampFinding {
        location_id: events[0].location_id,
        window_seconds: config.window.as_secs(),
        kill_count: event_count,
        attacker_org_ids,
        attacker_vehicle_type_ids,
        confidence: Confidence::from_score(score),
        last_event_time,
        is_chain_area_attack: is_area_attack,
        force_asymmetry: mean_attacker_count,
        detected_at: now,
    })
}

fn area_attack_detected(
    events: &[Event],
    area_effect: &AreaEffectPlatforms,
    config: &DetectorConfig,
) -> bool {
    if events.len() < config.area_min_events {
        return false;
    }
    let any_area_platform = events
        .iter()
        .any(|e| area_effect.intersects(e.attacker_vehicle_type_ids.iter()));
    if !any_area_platform {
        return false;
    }
    let min_t = events.iter().map(|e| e.event_time).min().unwrap();
    let max_t = events.iter().map(|e| e.event_time).max().unwrap();
    let spread = (max_t - min_t).to_std().unwrap_or(Duration::MAX);
    spread <= config.area_window
}

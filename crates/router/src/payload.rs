//! Alert payload construction. The payload schema itself is opaque to the
//! webhook dispatcher (`Alert.payload`); a separate persona/voice
//! renderer, out of scope for this pipeline, turns it into message text.

use gatewatch_core::{Event, GatecampFinding, TriggerKind};

/// Build the payload for an alert triggered by a matched event.
#[must_use]
pub fn event_payload(event: &Event, trigger_kind: TriggerKind) -> serde_json::Value {
    serde_json::json!({
        "trigger_kind": trigger_kind.to_string(),
        "event_id": event.event_id.value(),
        "event_time": event.event_time,
        "location_id": event.location_id.value(),
        "region_id": event.region_id.value(),
        "victim_entity_id": event.victim_entity_id.value(),
        "victim_org_id": event.victim_org_id.value(),
        "victim_alliance_id": event.victim_alliance_id.map(|a| a.value()),
        "attacker_count": event.attacker_count,
        "attacker_org_ids": event.attacker_org_ids.iter().map(|o| o.value()).collect::<Vec<_>>(),
        "final_attacker_vehicle_type_id": event.final_attacker_vehicle_type_id.value(),
        "total_value": event.total_value,
        "is_minor_kill": event.is_minor_kill,
    })
}

/// Build the payload for a `gatecamp_detected` alert.
#[must_use]
pub fn finding_payload(finding: &GatecampFinding) -> serde_json::Value {
    serde_json::json!({
        "trigger_kind": "gatecamp_detected",
        "location_id": finding.location_id.value(),
        "window_seconds": finding.window_seconds,
        "kill_count": finding.kill_count,
        "attacker_org_ids": finding.attacker_org_ids.iter().map(|o| o.value()).collect::<Vec<_>>(),
        "attacker_vehicle_type_ids": finding.attacker_vehicle_type_ids.iter().map(|v| v.value()).collect::<Vec<_>>(),
        "confidence": finding.confidence.to_string(),
        "last_event_time": finding.last_event_time,
        "is_chain_area_attack": finding.is_chain_area_attack,
        "force_asymmetry": finding.force_asymmetry,
    })
}

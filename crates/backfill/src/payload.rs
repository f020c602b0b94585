//! Wire shape returned by the secondary historical API.
//!
//! Unlike the per-event enrichment API, a region query already knows its own
//! `region_id`, so each record is self-describing and needs no separate
//! lookup.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use gatewatch_core::{
    AllianceId, EntityId, Event, EventId, EventValidationError, LocationId, OrgId, RegionId,
    VehicleTypeId,
};

#[derive(Debug, Deserialize)]
pub struct HistoricalEvent {
    #[serde(rename = "killID")]
    event_id: u64,
    #[serde(rename = "killmail_time")]
    event_time: DateTime<Utc>,
    solar_system_id: u64,
    region_id: u64,
    victim: VictimBlock,
    attackers: Vec<AttackerBlock>,
    zkb: ZkbBlock,
}

#[derive(Debug, Deserialize)]
struct VictimBlock {
    character_id: Option<u64>,
    corporation_id: u64,
    alliance_id: Option<u64>,
    ship_type_id: u64,
}

#[derive(Debug, Deserialize)]
struct AttackerBlock {
    corporation_id: Option<u64>,
    alliance_id: Option<u64>,
    ship_type_id: Option<u64>,
    #[serde(default)]
    final_blow: bool,
}

#[derive(Debug, Deserialize)]
struct ZkbBlock {
    #[serde(default)]
    total_value: f64,
}

/// Parse the newest-first list returned by a region query.
pub fn parse_region_response(body: &str) -> Result<Vec<HistoricalEvent>, serde_json::Error> {
    serde_json::from_str(body)
}

/// Convert one wire record into a validated domain event. `ingested_at` is
/// stamped at conversion time, same as the live enrichment path.
pub fn build_event(
    raw: HistoricalEvent,
    ingested_at: DateTime<Utc>,
) -> Result<Event, EventValidationError> {
    let attacker_org_ids: BTreeSet<OrgId> = raw
        .attackers
        .iter()
        .filter_map(|a| a.corporation_id)
        .map(OrgId::new)
        .collect();
    let attacker_alliance_ids: BTreeSet<AllianceId> = raw
        .attackers
        .iter()
        .filter_map(|a| a.alliance_id)
        .map(AllianceId::new)
        .collect();
    let attacker_vehicle_type_ids: BTreeSet<VehicleTypeId> = raw
        .attackers
        .iter()
        .filter_map(|a| a.ship_type_id)
        .map(VehicleTypeId::new)
        .collect();

    let final_attacker_vehicle_type_id = raw
        .attackers
        .iter()
        .find(|a| a.final_blow)
        .and_then(|a| a.ship_type_id)
        .or_else(|| raw.attackers.first().and_then(|a| a.ship_type_id))
        .map(VehicleTypeId::new)
        .unwrap_or_else(|| VehicleTypeId::new(0));

    Event::new(
        EventId::new(raw.event_id),
        raw.event_time,
        LocationId::new(raw.solar_system_id),
        RegionId::new(raw.region_id),
        EntityId::new(raw.victim.character_id.unwrap_or(0)),
        OrgId::new(raw.victim.corporation_id),
        raw.victim.alliance_id.map(AllianceId::new),
        raw.attackers.len() as u32,
        attacker_org_ids,
        attacker_alliance_ids,
        attacker_vehicle_type_ids,
        final_attacker_vehicle_type_id,
        raw.zkb.total_value,
        false,
        ingested_at,
    )
}

//! The event entity, in its two lifecycle stages: an unresolved [`EventRef`]
//! fresh off the queue, and a fully [`Event`] resolved against the
//! enrichment API.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AllianceId, EntityId, EventId, LocationId, OrgId, VehicleTypeId};

/// A reference to an event on the upstream queue: an id and an opaque hash
/// that together let the enrichment API resolve the full record.
///
/// `EventRef` is never persisted; it lives only in the in-memory backlog
/// between the source client and the enrichment fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    /// Globally unique event identifier.
    pub event_id: EventId,
    /// Opaque hash used to authorize the enrichment fetch.
    pub hash: String,
}

impl EventRef {
    #[must_use]
    pub fn new(event_id: impl Into<EventId>, hash: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            hash: hash.into(),
        }
    }
}

/// A fully enriched combat event.
///
/// `event_id` is the primary key; the store silently discards duplicates.
/// Invariants enforced at construction by [`Event::new`]:
/// - `attacker_count >= 1`
/// - `final_attacker_vehicle_type_id` is a member of `attacker_vehicle_type_ids`
/// - `event_time <= ingested_at`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub event_time: DateTime<Utc>,
    pub location_id: LocationId,
    pub region_id: RegionIdHint,
    pub victim_entity_id: EntityId,
    pub victim_org_id: OrgId,
    pub victim_alliance_id: Option<AllianceId>,
    pub attacker_count: u32,
    pub attacker_org_ids: BTreeSet<OrgId>,
    pub attacker_alliance_ids: BTreeSet<AllianceId>,
    pub attacker_vehicle_type_ids: BTreeSet<VehicleTypeId>,
    pub final_attacker_vehicle_type_id: VehicleTypeId,
    pub total_value: f64,
    pub is_minor_kill: bool,
    pub ingested_at: DateTime<Utc>,
}

/// The region a location belongs to, resolved from the static reference
/// lookup table the Orchestrator loads at startup (out of scope for this
/// crate; see [`crate::region::RegionLookup`]).
pub type RegionIdHint = crate::types::RegionId;

/// Error produced when constructing an [`Event`] from raw enrichment fields
/// that violate an invariant.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventValidationError {
    #[error("attacker_count must be >= 1, got {0}")]
    ZeroAttackers(u32),
    #[error("final_attacker_vehicle_type_id {0} is not a member of attacker_vehicle_type_ids")]
    FinalVehicleNotInSet(u64),
    #[error("event_time {event_time} is after ingested_at {ingested_at}")]
    EventTimeAfterIngestion {
        event_time: DateTime<Utc>,
        ingested_at: DateTime<Utc>,
    },
    #[error("total_value must be non-negative, got {0}")]
    NegativeValue(f64),
}

#[allow(clippy::too_many_arguments)]
impl Event {
    /// Construct an `Event`, validating the invariants documented on the
    /// type. Returns an error rather than panicking: a malformed enrichment
    /// response should be dropped with a warning, not crash the fetcher.
    pub fn new(
        event_id: EventId,
        event_time: DateTime<Utc>,
        location_id: LocationId,
        region_id: RegionIdHint,
        victim_entity_id: EntityId,
        victim_org_id: OrgId,
        victim_alliance_id: Option<AllianceId>,
        attacker_count: u32,
        attacker_org_ids: BTreeSet<OrgId>,
        attacker_alliance_ids: BTreeSet<AllianceId>,
        attacker_vehicle_type_ids: BTreeSet<VehicleTypeId>,
        final_attacker_vehicle_type_id: VehicleTypeId,
        total_value: f64,
        is_minor_kill: bool,
        ingested_at: DateTime<Utc>,
    ) -> Result<Self, EventValidationError> {
        if attacker_count < 1 {
            return Err(EventValidationError::ZeroAttackers(attacker_count));
        }
        if !attacker_vehicle_type_ids.contains(&final_attacker_vehicle_type_id) {
            return Err(EventValidationError::FinalVehicleNotInSet(
                final_attacker_vehicle_type_id.value(),
            ));
        }
        if event_time > ingested_at {
            return Err(EventValidationError::EventTimeAfterIngestion {
                event_time,
                ingested_at,
            });
        }
        if total_value < 0.0 {
            return Err(EventValidationError::NegativeValue(total_value));
        }
        Ok(Self {
            event_id,
            event_time,
            location_id,
            region_id,
            victim_entity_id,
            victim_org_id,
            victim_alliance_id,
            attacker_count,
            attacker_org_ids,
            attacker_alliance_ids,
            attacker_vehicle_type_ids,
            final_attacker_vehicle_type_id,
            total_value,
            is_minor_kill,
            ingested_at,
        })
    }

    /// Average attackers per event is always just `attacker_count` for a
    /// single event; the detector aggregates this across a window.
    #[must_use]
    pub fn attacker_count_f64(&self) -> f64 {
        f64::from(self.attacker_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn make_event(attacker_count: u32, total_value: f64) -> Result<Event, EventValidationError> {
        let mut vehicles = BTreeSet::new();
        vehicles.insert(VehicleTypeId::new(600));
        Event::new(
            EventId::new(1),
            base_time(),
            LocationId::new(30_000_142),
            RegionIdHint::new(10_000_002),
            EntityId::new(100),
            OrgId::new(200),
            None,
            attacker_count,
            BTreeSet::new(),
            BTreeSet::new(),
            vehicles,
            VehicleTypeId::new(600),
            total_value,
            false,
            base_time(),
        )
    }

    #[test]
    fn rejects_zero_attackers() {
        assert_eq!(
            make_event(0, 1.0).unwrap_err(),
            EventValidationError::ZeroAttackers(0)
        );
    }

    #[test]
    fn rejects_negative_value() {
        assert_eq!(
            make_event(1, -1.0).unwrap_err(),
            EventValidationError::NegativeValue(-1.0)
        );
    }

    #[test]
    fn rejects_final_vehicle_outside_set() {
        let mut vehicles = BTreeSet::new();
        vehicles.insert(VehicleTypeId::new(1));
        let err = Event::new(
            EventId::new(1),
            base_time(),
            LocationId::new(1),
            RegionIdHint::new(1),
            EntityId::new(1),
            OrgId::new(1),
            None,
            1,
            BTreeSet::new(),
            BTreeSet::new(),
            vehicles,
            VehicleTypeId::new(999),
            0.0,
            false,
            base_time(),
        )
        .unwrap_err();
        assert_eq!(err, EventValidationError::FinalVehicleNotInSet(999));
    }

    #[test]
    fn rejects_event_time_after_ingestion() {
        let mut vehicles = BTreeSet::new();
        vehicles.insert(VehicleTypeId::new(1));
        let err = Event::new(
            EventId::new(1),
            base_time() + chrono::Duration::seconds(5),
            LocationId::new(1),
            RegionIdHint::new(1),
            EntityId::new(1),
            OrgId::new(1),
            None,
            1,
            BTreeSet::new(),
            BTreeSet::new(),
            vehicles,
            VehicleTypeId::new(1),
            0.0,
            false,
            base_time(),
        )
        .unwrap_err();
        assert!(matches!(err, EventValidationError::EventTimeAfterIngestion { .. }));
    }

    #[test]
    fn accepts_valid_event() {
        assert!(make_event(5, 1_000_000.0).is_ok());
    }
}

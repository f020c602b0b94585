//! Resolving an `EventRef` into a fully enriched `Event`.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use gatewatch_core::{
    AllianceId, EntityId, Event, EventId, EventRef, LocationId, OrgId, VehicleTypeId,
};

use crate::error::FetchError;
use crate::region::RegionLookup;

/// Victim ship types treated as "minor" (pod-equivalent).
const MINOR_KILL_SHIP_TYPE_IDS: &[u64] = &[670, 33_328];

#[derive(Debug, Deserialize)]
struct EnrichmentResponse {
    #[serde(rename = "killmail_time")]
    event_time: DateTime<Utc>,
    solar_system_id: u64,
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

/// Resolves a reference into a full event. A trait boundary so the fetcher
/// worker pool is unit-testable without a network.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn fetch(&self, event_ref: &EventRef) -> Result<Event, FetchError>;
}

/// HTTP implementation backed by the game API's per-event fetch endpoint.
pub struct HttpEnricher {
    client: reqwest::Client,
    base_url: String,
    region_lookup: Arc<dyn RegionLookup>,
}

impl HttpEnricher {
    #[must_use]
    pub fn new(base_url: impl Into<String>, region_lookup: Arc<dyn RegionLookup>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            region_lookup,
        }
    }

    #[must_use]
    pub fn with_client(
        base_url: impl Into<String>,
        region_lookup: Arc<dyn RegionLookup>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            region_lookup,
        }
    }
}

#[async_trait]
impl Enricher for HttpEnricher {
    async fn fetch(&self, event_ref: &EventRef) -> Result<Event, FetchError> {
        let url = format!(
            "{}/{}/{}/",
            self.base_url.trim_end_matches('/'),
            event_ref.event_id,
            event_ref.hash
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Retryable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 420 {
            return Err(FetchError::RateLimited);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(FetchError::Retryable(format!("upstream status {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Permanent(format!("upstream status {status}")));
        }

        let body: EnrichmentResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Permanent(format!("malformed enrichment body: {e}")))?;

        build_event(event_ref.event_id, body, self.region_lookup.as_ref())
    }
}

fn build_event(
    event_id: EventId,
    body: EnrichmentResponse,
    region_lookup: &dyn RegionLookup,
) -> Result<Event, FetchError> {
    if body.attackers.is_empty() {
        return Err(FetchError::Permanent("event has no attackers".into()));
    }

    let location_id = LocationId::new(body.solar_system_id);
    let region_id = region_lookup
        .region_for(location_id)
        .unwrap_or(gatewatch_core::RegionId::new(0));

    let attacker_org_ids: BTreeSet<OrgId> = body
        .attackers
        .iter()
        .filter_map(|a| a.corporation_id)
        .map(OrgId::new)
        .collect();
    let attacker_alliance_ids: BTreeSet<AllianceId> = body
        .attackers
        .iter()
        .filter_map(|a| a.alliance_id)
        .map(AllianceId::new)
        .collect();
    let attacker_vehicle_type_ids: BTreeSet<VehicleTypeId> = body
        .attackers
        .iter()
        .filter_map(|a| a.ship_type_id)
        .map(VehicleTypeId::new)
        .collect();

    let final_attacker_vehicle_type_id = body
        .attackers
        .iter()
        .find(|a| a.final_blow)
        .and_then(|a| a.ship_type_id)
        .or_else(|| body.attackers.first().and_then(|a| a.ship_type_id))
        .map(VehicleTypeId::new)
        .ok_or_else(|| {
            FetchError::Permanent("no attacker carries a ship_type_id for final blow".into())
        })?;

    let is_minor_kill = MINOR_KILL_SHIP_TYPE_IDS.contains(&body.victim.ship_type_id);

    Event::new(
        event_id,
        body.event_time,
        location_id,
        region_id,
        EntityId::new(body.victim.character_id.unwrap_or(0)),
        OrgId::new(body.victim.corporation_id),
        body.victim.alliance_id.map(AllianceId::new),
        body.attackers.len() as u32,
        attacker_org_ids,
        attacker_alliance_ids,
        attacker_vehicle_type_ids,
        final_attacker_vehicle_type_id,
        body.zkb.total_value,
        is_minor_kill,
        Utc::now(),
    )
    .map_err(|e| FetchError::Permanent(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::NullRegionLookup;

    fn sample_body() -> EnrichmentResponse {
        EnrichmentResponse {
            event_time: Utc::now(),
            solar_system_id: 30_000_142,
            victim: VictimBlock {
                character_id: Some(1),
                corporation_id: 2,
                alliance_id: None,
                ship_type_id: 670,
            },
            attackers: vec![
                AttackerBlock {
                    corporation_id: Some(10),
                    alliance_id: None,
                    ship_type_id: Some(600),
                    final_blow: true,
                },
                AttackerBlock {
                    corporation_id: Some(11),
                    alliance_id: None,
                    ship_type_id: Some(601),
                    final_blow: false,
                },
            ],
            zkb: ZkbBlock {
                total_value: 1_000_000.0,
            },
        }
    }

    #[test]
    fn builds_event_with_final_blow_vehicle() {
        let event = build_event(EventId::new(1), sample_body(), &NullRegionLookup).unwrap();
        assert_eq!(event.final_attacker_vehicle_type_id, VehicleTypeId::new(600));
        assert_eq!(event.attacker_count, 2);
        assert!(event.is_minor_kill);
    }

    #[test]
    fn rejects_event_with_no_attackers() {
        let mut body = sample_body();
        body.attackers.clear();
        let err = build_event(EventId::new(1), body, &NullRegionLookup).unwrap_err();
        assert!(matches!(err, FetchError::Permanent(_)));
    }

    #[test]
    fn falls_back_to_first_attacker_when_no_final_blow_flagged() {
        let mut body = sample_body();
        for a in &mut body.attackers {
            a.final_blow = false;
        }
        let event = build_event(EventId::new(1), body, &NullRegionLookup).unwrap();
        assert_eq!(event.final_attacker_vehicle_type_id, VehicleTypeId::new(600));
    }

    #[test]
    fn non_pod_victim_is_not_minor_kill() {
        let mut body = sample_body();
        body.victim.ship_type_id = 99999;
        let event = build_event(EventId::new(1), body, &NullRegionLookup).unwrap();
        assert!(!event.is_minor_kill);
    }
}

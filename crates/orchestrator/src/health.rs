//! Aggregate health/status snapshot exposed over `GET /health` and
//! `GET /status`.
//!
//! `StoreCounts` stays put in `gatewatch-store` rather than moving into
//! `gatewatch-core` as originally sketched — see DESIGN.md for why. This
//! type is the orchestrator-local aggregate that stitches every component's
//! own snapshot together; it owns no state of its own.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use gatewatch_core::ProfileId;
use gatewatch_enrichment::EnrichmentHealth;
use gatewatch_source::SourceHealth;
use gatewatch_store::StoreCounts;
use gatewatch_webhook::EndpointHealth;
use serde::Serialize;

/// Full pipeline health, assembled by the orchestrator from its
/// components' individual trackers on every request — nothing here is
/// cached between polls.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineHealth {
    pub source: SourceHealthView,
    pub enrichment: EnrichmentHealth,
    pub store: StoreCounts,
    pub findings_last_hour: i64,
    pub webhooks: BTreeMap<ProfileId, EndpointHealth>,
    pub healthy: bool,
}

/// Serializable projection of [`SourceHealth`] (which itself is `Copy`,
/// not `Serialize`, since it lives in a crate without a `serde` dependency).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SourceHealthView {
    pub consecutive_errors: u32,
    pub last_successful_poll_at: Option<DateTime<Utc>>,
    pub auth_banned: bool,
    pub healthy: bool,
}

impl SourceHealthView {
    #[must_use]
    pub fn from_source_health(health: &SourceHealth, now: DateTime<Utc>) -> Self {
        Self {
            consecutive_errors: health.consecutive_errors,
            last_successful_poll_at: health.last_successful_poll_at,
            auth_banned: health.auth_banned,
            healthy: health.is_healthy(now),
        }
    }
}

impl PipelineHealth {
    /// Overall health predicate: the pipeline is healthy iff
    /// the source client is, and no webhook endpoint is currently paused.
    #[must_use]
    pub fn compute_healthy(source_healthy: bool, webhooks: &BTreeMap<ProfileId, EndpointHealth>) -> bool {
        source_healthy && webhooks.values().all(|w| !w.paused)
    }
}

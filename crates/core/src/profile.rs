//! On-disk notification profile schema.
//!
//! A profile is loaded from a single TOML file. Unknown fields are ignored
//! by serde's default behavior; a profile that fails to parse or carries the
//! wrong `schema_version` is rejected by [`WatchlistProfile::validate`] but
//! must never abort the loader for the remaining profiles.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{AllianceId, OrgId, RegionId};
use crate::webhook_url::WebhookUrl;

/// The only schema version this build understands.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// The kinds of condition a profile can trigger an alert on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    WatchlistActivity,
    HighValue,
    LocationScope,
    WarActivity,
    NpcFactionKill,
    GatecampDetected,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::WatchlistActivity => "watchlist_activity",
            Self::HighValue => "high_value",
            Self::LocationScope => "location_scope",
            Self::WarActivity => "war_activity",
            Self::NpcFactionKill => "npc_faction_kill",
            Self::GatecampDetected => "gatecamp_detected",
        };
        f.write_str(s)
    }
}

/// Which trigger kinds are active for a profile, and their parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Triggers {
    #[serde(default)]
    pub watchlist_activity: bool,
    #[serde(default)]
    pub gatecamp_detected: bool,
    /// Minimum `total_value` to trigger a high-value alert. `0` disables it.
    #[serde(default)]
    pub high_value_threshold: u64,
    #[serde(default)]
    pub war_activity: bool,
    #[serde(default)]
    pub npc_faction_kill: NpcFactionKillTrigger,
}

/// `npc_faction_kill` may be a bare bool or a table with subfields; both
/// forms are accepted to keep the wire format forgiving.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NpcFactionKillTrigger {
    #[default]
    Disabled,
    Enabled(bool),
    Detailed {
        enabled: bool,
        #[serde(default)]
        faction_ids: BTreeSet<u64>,
    },
}

impl NpcFactionKillTrigger {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Disabled => false,
            Self::Enabled(b) => *b,
            Self::Detailed { enabled, .. } => *enabled,
        }
    }
}

/// Local-time quiet-hours window during which alerts are suppressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietHours {
    #[serde(default)]
    pub enabled: bool,
    /// `HH:MM` local start of the quiet window.
    pub start: String,
    /// `HH:MM` local end of the quiet window.
    pub end: String,
    /// IANA timezone name, e.g. `"America/New_York"`.
    pub timezone: String,
}

/// Backoff applied when a profile's webhook is rolling up many kills into
/// one notification instead of flooding the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Number of matching events within `throttle_window` after which
    /// subsequent events are rolled up into a summary rather than sent
    /// individually.
    #[serde(default = "default_rollup_threshold")]
    pub rollup_threshold: u32,
    /// Maximum number of kills to enumerate in a rollup summary.
    #[serde(default = "default_max_rollup_kills")]
    pub max_rollup_kills: u32,
    /// Seconds to back off the profile's send rate after repeated throttle
    /// hits in a short span.
    #[serde(default)]
    pub backoff_seconds: u64,
}

fn default_rollup_threshold() -> u32 {
    5
}

fn default_max_rollup_kills() -> u32 {
    10
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            rollup_threshold: default_rollup_threshold(),
            max_rollup_kills: default_max_rollup_kills(),
            backoff_seconds: 0,
        }
    }
}

/// Delivery attempt policy for the webhook dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_secs", with = "duration_secs")]
    pub retry_delay: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> Duration {
    Duration::from_secs(1)
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay_secs(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// A complete, validated notification profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistProfile {
    pub schema_version: u32,
    pub name: String,
    pub display_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub webhook_url: WebhookUrl,
    #[serde(default)]
    pub triggers: Triggers,
    #[serde(default = "default_throttle_window", with = "duration_secs")]
    pub throttle_window: Duration,
    pub quiet_hours: Option<QuietHours>,
    #[serde(default)]
    pub location_scope: BTreeSet<RegionId>,
    #[serde(default)]
    pub watched_orgs: BTreeSet<OrgId>,
    #[serde(default)]
    pub watched_alliances: BTreeSet<AllianceId>,
    #[serde(default)]
    pub rate_limit_policy: RateLimitPolicy,
    #[serde(default)]
    pub delivery_policy: DeliveryPolicy,
}

fn default_true() -> bool {
    true
}

fn default_throttle_window() -> Duration {
    Duration::from_secs(300)
}

/// Error raised when a parsed profile fails validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProfileValidationError {
    #[error("unsupported schema_version {found}, expected {expected}")]
    SchemaVersionMismatch { found: u32, expected: u32 },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl WatchlistProfile {
    /// Validate required fields and schema version. Called after
    /// deserialization; a profile that fails this never reaches the
    /// evaluator or router.
    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        if self.schema_version != CURRENT_SCHEMA_VERSION {
            return Err(ProfileValidationError::SchemaVersionMismatch {
                found: self.schema_version,
                expected: CURRENT_SCHEMA_VERSION,
            });
        }
        if self.name.trim().is_empty() {
            return Err(ProfileValidationError::MissingField("name"));
        }
        if self.webhook_url.is_empty() {
            return Err(ProfileValidationError::MissingField("webhook_url"));
        }
        Ok(())
    }
}

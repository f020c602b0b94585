//! Shared domain types, clock abstraction, and error taxonomy for the
//! gatewatch real-time killmail intelligence pipeline.
//!
//! This crate has no knowledge of HTTP, storage, or scheduling — it only
//! defines the core domain entities and the small set of cross-cutting
//! utilities (clock, bounded drop-oldest queue) that every other crate in
//! the workspace builds on.

pub mod alert;
pub mod area_effect;
pub mod backlog;
pub mod clock;
pub mod cursor;
pub mod error;
pub mod event;
pub mod finding;
pub mod profile;
pub mod region;
pub mod types;
pub mod webhook_url;

pub use alert::{Alert, AlertState};
pub use area_effect::AreaEffectPlatforms;
pub use backlog::DropOldestQueue;
pub use clock::{Clock, FixedClock, SystemClock, system_clock};
pub use cursor::PipelineCursor;
pub use error::GatewatchError;
pub use event::{Event, EventRef, EventValidationError};
pub use finding::{Confidence, GatecampFinding};
pub use profile::{
    CURRENT_SCHEMA_VERSION, DeliveryPolicy, NpcFactionKillTrigger, ProfileValidationError,
    QuietHours, RateLimitPolicy, TriggerKind, Triggers, WatchlistProfile,
};
pub use region::{NullRegionLookup, RegionLookup, StaticRegionLookup};
pub use types::{
    AllianceId, EntityId, EventId, LocationId, OrgId, ProfileId, RegionId, VehicleTypeId,
};
pub use webhook_url::WebhookUrl;

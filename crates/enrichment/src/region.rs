//! `location_id -> region_id` lookup, shared with the notification router.
//!
//! The trait and implementations live in `gatewatch-core` since both this
//! crate (resolving `Event::region_id`) and `gatewatch-router` (scoping
//! `gatecamp_detected` alerts to a finding's region) need the same seam;
//! re-exported here so existing call sites in this crate don't change.

pub use gatewatch_core::{NullRegionLookup, RegionLookup, StaticRegionLookup};

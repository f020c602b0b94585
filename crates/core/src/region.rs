//! Read-only `location_id -> region_id` lookup.
//!
//! Static reference data builds are out of scope for this pipeline;
//! this trait is the seam a real deployment plugs the authoritative
//! table into. Both the enrichment fetcher (resolving `Event::region_id`)
//! and the notification router (scoping `gatecamp_detected` alerts to a
//! finding's region) depend on it, so it lives here rather than in either
//! crate.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::{LocationId, RegionId};

pub trait RegionLookup: Send + Sync {
    fn region_for(&self, location_id: LocationId) -> Option<RegionId>;
}

/// A lookup backed by a loaded table, swappable at runtime via `reload`.
#[derive(Debug, Default)]
pub struct StaticRegionLookup {
    table: RwLock<HashMap<u64, u64>>,
}

impl StaticRegionLookup {
    #[must_use]
    pub fn new(table: HashMap<u64, u64>) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    pub fn reload(&self, table: HashMap<u64, u64>) {
        *self.table.write().expect("region lookup mutex poisoned") = table;
    }
}

impl RegionLookup for StaticRegionLookup {
    fn region_for(&self, location_id: LocationId) -> Option<RegionId> {
        self.table
            .read()
            .expect("region lookup mutex poisoned")
            .get(&location_id.value())
            .copied()
            .map(RegionId::new)
    }
}

/// A lookup that never resolves anything; used where no reference table is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRegionLookup;

impl RegionLookup for NullRegionLookup {
    fn region_for(&self, _location_id: LocationId) -> Option<RegionId> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_lookup_resolves_known_location() {
        let mut table = HashMap::new();
        table.insert(30_000_142, 10_000_002);
        let lookup = StaticRegionLookup::new(table);
        assert_eq!(
            lookup.region_for(LocationId::new(30_000_142)),
            Some(RegionId::new(10_000_002))
        );
        assert_eq!(lookup.region_for(LocationId::new(1)), None);
    }

    #[test]
    fn reload_replaces_table_atomically() {
        let lookup = StaticRegionLookup::default();
        assert_eq!(lookup.region_for(LocationId::new(1)), None);
        let mut table = HashMap::new();
        table.insert(1, 99);
        lookup.reload(table);
        assert_eq!(lookup.region_for(LocationId::new(1)), Some(RegionId::new(99)));
    }

    #[test]
    fn null_lookup_never_resolves() {
        assert_eq!(NullRegionLookup.region_for(LocationId::new(1)), None);
    }
}

//! The set of vehicle types capable of simultaneous area damage.
//!
//! Membership in this set is treated as data, not code:
//! it changes as game balance patches land. [`AreaEffectPlatforms`] is a
//! plain runtime set the orchestrator loads from configuration (falling back
//! to a small seed list) rather than a hardcoded match arm, so an operator
//! can update it without a rebuild.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::VehicleTypeId;

/// Runtime-configurable set of area-effect-capable vehicle type IDs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaEffectPlatforms {
    ids: BTreeSet<u64>,
}

impl AreaEffectPlatforms {
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = VehicleTypeId>) -> Self {
        Self {
            ids: ids.into_iter().map(VehicleTypeId::value).collect(),
        }
    }

    /// A minimal built-in seed list, used only when no configuration file is
    /// present. Operators are expected to supply an up-to-date list.
    #[must_use]
    pub fn seed_default() -> Self {
        // Representative smartbomb/area-damage-capable hull type IDs.
        // Data, not policy — revisit when game metadata changes.
        Self::new([
            VehicleTypeId::new(11_567), // Revelation
            VehicleTypeId::new(19_720), // Naglfar
            VehicleTypeId::new(23_773), // Moros
            VehicleTypeId::new(28_352), // Chemosh (smartbomb-fit typical hull)
        ])
    }

    #[must_use]
    pub fn contains(&self, vehicle_type_id: VehicleTypeId) -> bool {
        self.ids.contains(&vehicle_type_id.value())
    }

    /// True if any id in `vehicle_type_ids` is an area-effect platform.
    #[must_use]
    pub fn intersects<'a>(&self, vehicle_type_ids: impl IntoIterator<Item = &'a VehicleTypeId>) -> bool {
        vehicle_type_ids
            .into_iter()
            .any(|v| self.ids.contains(&v.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_default_contains_known_hull() {
        let set = AreaEffectPlatforms::seed_default();
        assert!(set.contains(VehicleTypeId::new(23_773)));
        assert!(!set.contains(VehicleTypeId::new(1)));
    }

    #[test]
    fn intersects_matches_any_member() {
        let set = AreaEffectPlatforms::new([VehicleTypeId::new(100)]);
        let vehicles = vec![VehicleTypeId::new(1), VehicleTypeId::new(100)];
        assert!(set.intersects(vehicles.iter()));
        let none = vec![VehicleTypeId::new(1), VehicleTypeId::new(2)];
        assert!(!set.intersects(none.iter()));
    }
}

//! Strongly-typed identifiers for the entities flowing through the pipeline.
//!
//! All identifiers are stable integers assigned by the upstream game API; we
//! never mint our own. Wrapping them in newtypes prevents a `location_id`
//! from being passed where an `org_id` is expected, a mistake that is easy
//! to make when every ID in sight is a bare `u64`.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! newtype_u64 {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new instance from a raw `u64`.
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Return the inner value.
            #[must_use]
            pub const fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }

        impl From<$name> for u64 {
            fn from(v: $name) -> Self {
                v.0
            }
        }
    };
}

newtype_u64!(EventId, "Unique identifier of a single combat event (a \"killmail\").");
newtype_u64!(LocationId, "Stable identifier of a discrete in-game location.");
newtype_u64!(RegionId, "Stable identifier of a region grouping locations.");
newtype_u64!(EntityId, "Stable identifier of a player or NPC character/structure.");
newtype_u64!(OrgId, "Stable identifier of a player organization (corporation).");
newtype_u64!(AllianceId, "Stable identifier of a player alliance.");
newtype_u64!(VehicleTypeId, "Stable identifier of a ship/vehicle type.");

/// A notification profile identifier, assigned from its filename/`name` field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ProfileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

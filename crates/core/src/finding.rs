//! The detector's output: a [`GatecampFinding`] describing a coordinated
//! hostile activity pattern at one location.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{LocationId, OrgId, VehicleTypeId};

/// Confidence grade assigned to a finding by the detector's multi-factor
/// scoring (see [`crate::confidence`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Map a raw score (sum of scoring factors) to a confidence grade.
    #[must_use]
    pub fn from_score(score: u32) -> Self {
        if score >= 4 {
            Self::High
        } else if score >= 2 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// A detected coordinated hostile activity pattern ("gatecamp") at a single
/// location. Produced by the pattern detector; never mutated once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatecampFinding {
    pub location_id: LocationId,
    pub window_seconds: u64,
    pub kill_count: usize,
    pub attacker_org_ids: BTreeSet<OrgId>,
    pub attacker_vehicle_type_ids: BTreeSet<VehicleTypeId>,
    pub confidence: Confidence,
    pub last_event_time: DateTime<Utc>,
    pub is_chain_area_attack: bool,
    /// Average attackers per event in the window; always >= 1.0.
    pub force_asymmetry: f64,
    /// Wall-clock time the finding was produced, for findings retention.
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_thresholds() {
        assert_eq!(Confidence::from_score(0), Confidence::Low);
        assert_eq!(Confidence::from_score(1), Confidence::Low);
        assert_eq!(Confidence::from_score(2), Confidence::Medium);
        assert_eq!(Confidence::from_score(3), Confidence::Medium);
        assert_eq!(Confidence::from_score(4), Confidence::High);
        assert_eq!(Confidence::from_score(10), Confidence::High);
    }

    #[test]
    fn confidence_ordering() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }
}

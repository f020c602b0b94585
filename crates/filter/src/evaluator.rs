//! Atomically-reloadable watchlist evaluator.

use std::sync::{Arc, RwLock};

use gatewatch_core::{Event, WatchlistProfile};

use crate::classify::{classify_against, Match};

/// Holds the current profile set behind a snapshot that swaps atomically on
/// `reload`. In-flight classifications always see one consistent snapshot
/// end to end, never a torn read of a concurrent reload.
#[derive(Debug, Default)]
pub struct Evaluator {
    snapshot: RwLock<Arc<Vec<WatchlistProfile>>>,
}

impl Evaluator {
    #[must_use]
    pub fn new(profiles: Vec<WatchlistProfile>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(profiles)),
        }
    }

    /// Swap in a new profile set. Classifications already in progress keep
    /// using the `Arc` they cloned out before the swap.
    pub fn reload(&self, profiles: Vec<WatchlistProfile>) {
        *self.snapshot.write().expect("evaluator lock poisoned") = Arc::new(profiles);
    }

    #[must_use]
    pub fn profile_count(&self) -> usize {
        self.snapshot.read().expect("evaluator lock poisoned").len()
    }

    /// Classify one event against every enabled profile's triggers.
    #[must_use]
    pub fn classify(&self, event: &Event) -> Vec<Match> {
        let profiles = self.snapshot.read().expect("evaluator lock poisoned").clone();
        profiles
            .iter()
            .flat_map(|profile| {
                classify_against(profile, event)
                    .into_iter()
                    .map(move |trigger_kind| Match {
                        profile_id: profile.name.as_str().into(),
                        trigger_kind,
                    })
            })
            .collect()
    }
}

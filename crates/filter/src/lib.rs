//! Filter & watchlist evaluator: annotates enriched events with the set of
//! `(profile_id, trigger_kind)` matches.

pub mod classify;
pub mod evaluator;

pub use classify::{classify_against, Match};
pub use evaluator::Evaluator;

//! Persistent, retention-bounded cache of recent enriched events and
//! detector findings.
//!
//! Backed by SQLite through `sqlx`; schema and migrations use plain
//! `CREATE TABLE IF NOT EXISTS` statements run at startup rather than
//! compile-time-checked queries.

pub mod config;
pub mod error;
pub mod event_store;
pub mod migrations;
pub mod query;

pub use config::StoreConfig;
pub use error::StoreError;
pub use event_store::{EventStore, SqliteEventStore, spawn_retention_sweeper};
pub use query::{EventQuery, StoreCounts};

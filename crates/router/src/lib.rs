//! Notification router: matches enriched events and detector findings
//! against profile triggers, applies per-key throttling and quiet hours,
//! and hands the resulting bounded [`gatewatch_core::Alert`]s to an
//! [`AlertSink`] for delivery.
//!
//! This crate owns the `AlertSink` trait rather than depending on
//! `gatewatch-webhook` directly, so the router has no knowledge of how an
//! alert is actually delivered.

pub mod payload;
pub mod quiet_hours;
pub mod router;
pub mod sink;
pub mod throttle;

pub use payload::{event_payload, finding_payload};
pub use quiet_hours::is_quiet;
pub use router::{EventMatch, NotificationRouter};
pub use sink::AlertSink;
pub use throttle::{ThrottleEntry, ThrottleKey, ThrottleTable};

//! Webhook dispatcher: delivers queued alerts to external chat webhooks
//! under a bounded, rate-limited, retrying FIFO-per-profile send loop.
//!
//! Implements `gatewatch_router::AlertSink` so the notification router
//! never depends on this crate's transport details.

pub mod dispatcher;
pub mod error;
pub mod health;
pub mod sender;

pub use dispatcher::{DispatcherConfig, WebhookDispatcher};
pub use error::DispatchError;
pub use health::{EndpointHealth, EndpointHealthTracker};
pub use sender::{HttpWebhookSender, WebhookSender};

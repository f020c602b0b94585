//! The `EventSource` trait and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use gatewatch_core::{EventRef, GatewatchError, RegionId};

use crate::payload::{ParsedPayload, parse_queue_response};

/// Outcome of one `poll_once` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Event(EventRef),
    Empty,
}

/// Produces a lazy sequence of [`EventRef`] by long-polling the upstream
/// queue. A trait boundary so the run loop (`crate::run`) is testable
/// against a scripted fake without a network.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn poll_once(&self) -> Result<PollOutcome, GatewatchError>;
}

/// Stable per-installation configuration for the long-poll client.
#[derive(Debug, Clone)]
pub struct SourceClientConfig {
    pub base_url: String,
    pub queue_id: String,
    /// Time-to-wait, clamped to `[1, 10]` seconds .
    pub ttw: u8,
    pub region_filter: Option<RegionId>,
}

impl SourceClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, queue_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            queue_id: queue_id.into(),
            ttw: 10,
            region_filter: None,
        }
    }

    #[must_use]
    pub fn ttw_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttw.clamp(1, 10)))
    }
}

/// HTTP long-poll client for the upstream killmail queue.
pub struct HttpEventSource {
    client: reqwest::Client,
    config: SourceClientConfig,
}

impl HttpEventSource {
    #[must_use]
    pub fn new(config: SourceClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::default())
            .timeout(config.ttw_duration() + Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");
        Self { client, config }
    }

    #[must_use]
    pub fn with_client(config: SourceClientConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn poll_once(&self) -> Result<PollOutcome, GatewatchError> {
        let mut request = self
            .client
            .get(&self.config.base_url)
            .query(&[("queueID", self.config.queue_id.as_str())])
            .query(&[("ttw", self.config.ttw.clamp(1, 10).to_string())]);

        if let Some(region) = self.config.region_filter {
            request = request.query(&[("regionID", region.value().to_string())]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                GatewatchError::Transport(e.to_string())
            } else {
                GatewatchError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(GatewatchError::AuthBan(format!(
                "upstream queue returned {status}"
            )));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewatchError::Retryable(format!(
                "upstream queue rate limited: {status}"
            )));
        }
        if !status.is_success() {
            return Err(GatewatchError::Transport(format!(
                "upstream queue responded {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GatewatchError::Transport(e.to_string()))?;

        match parse_queue_response(&body) {
            Ok(ParsedPayload::Event(event_ref)) => Ok(PollOutcome::Event(event_ref)),
            Ok(ParsedPayload::Empty) => Ok(PollOutcome::Empty),
            Err(e) => Err(GatewatchError::InvalidPayload(e.to_string())),
        }
    }
}

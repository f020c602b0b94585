//! The actual HTTP transport for a webhook send.
//!
//! A `reqwest::Client` built once with a fixed timeout and the default
//! redirect policy, status-code handling split into success / rate-limited
//! / unauthorized / server / client buckets.

use std::time::Duration;

use async_trait::async_trait;

use gatewatch_core::WebhookUrl;

use crate::error::DispatchError;

/// Hard per-request timeout: every external request has a hard timeout,
/// 30s default.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends one alert payload to one webhook endpoint.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, url: &WebhookUrl, payload: &serde_json::Value) -> Result<(), DispatchError>;
}

/// Production sender backed by `reqwest`.
pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl Default for HttpWebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpWebhookSender {
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::default())
            .build()
            .expect("failed to build webhook HTTP client");
        Self { client }
    }

    /// Build a sender around a caller-supplied client, for tests that point
    /// it at a local mock server.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, url: &WebhookUrl, payload: &serde_json::Value) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(url.expose())
            .json(payload)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let code = status.as_u16();

        if code == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(DispatchError::RateLimited { retry_after });
        }
        if code == 401 || code == 403 {
            return Err(DispatchError::Unauthorized { status: code });
        }
        if status.is_server_error() {
            return Err(DispatchError::ServerError { status: code });
        }
        Err(DispatchError::ClientError { status: code })
    }
}

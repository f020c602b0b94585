//! HTTP client for the secondary historical API.

use async_trait::async_trait;
use chrono::Utc;

use gatewatch_core::{Event, RegionId};

use crate::error::BackfillError;
use crate::payload::{build_event, parse_region_response};

/// Newest-first historical event source for one region, bounded by `limit`.
#[async_trait]
pub trait SecondaryHistoryApi: Send + Sync {
    async fn fetch_region(
        &self,
        region_id: RegionId,
        limit: usize,
    ) -> Result<Vec<Event>, BackfillError>;
}

pub struct HttpSecondaryHistoryApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSecondaryHistoryApi {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SecondaryHistoryApi for HttpSecondaryHistoryApi {
    async fn fetch_region(
        &self,
        region_id: RegionId,
        limit: usize,
    ) -> Result<Vec<Event>, BackfillError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("regionID", region_id.value().to_string())])
            .query(&[("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| BackfillError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackfillError::Transport(format!(
                "upstream status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackfillError::Transport(e.to_string()))?;

        let raw_events =
            parse_region_response(&body).map_err(|e| BackfillError::InvalidPayload(e.to_string()))?;

        let now = Utc::now();
        raw_events
            .into_iter()
            .take(limit)
            .map(|raw| build_event(raw, now).map_err(|e| BackfillError::InvalidPayload(e.to_string())))
            .collect()
    }
}

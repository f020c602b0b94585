//! Bounded-concurrency worker pool that drains the pending-refs backlog
//! through an [`Enricher`] and publishes resolved events downstream.
//!
//! Mirrors the source client's loop shape (single `tokio::select!` driver,
//! `CancellationToken` for shutdown) but fans each ref out to one of up to
//! `concurrency` concurrent fetches, each gated by a shared [`TokenBucket`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chrono::{DateTime, Utc};
use gatewatch_core::{Clock, DropOldestQueue, Event, EventRef};
use gatewatch_executor::TokenBucket;

use crate::enricher::Enricher;
use crate::error::FetchError;
use crate::health::EnrichmentHealthTracker;

/// Tunables for the worker pool (defaults).
#[derive(Debug, Clone, Copy)]
pub struct FetcherConfig {
    pub concurrency: usize,
    pub rate_per_second: f64,
    pub backlog_capacity: usize,
    pub rate_limit_pause: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            rate_per_second: 20.0,
            backlog_capacity: 1000,
            rate_limit_pause: Duration::from_secs(60),
        }
    }
}

/// Drive the fetch loop until `cancel` fires. Resolved events are sent on
/// `output`; the receiver side typically feeds the filter & watchlist
/// evaluator.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    enricher: Arc<dyn Enricher>,
    backlog: Arc<DropOldestQueue<EventRef>>,
    backlog_notify: Arc<Notify>,
    output: mpsc::Sender<Event>,
    health: Arc<EnrichmentHealthTracker>,
    cancel: CancellationToken,
    clock: Arc<dyn Clock>,
    config: FetcherConfig,
) {
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let token_bucket = Arc::new(TokenBucket::new(
        config.rate_per_second,
        config.rate_per_second,
        clock.clone(),
    ));
    let paused_until: Arc<AsyncMutex<Option<DateTime<Utc>>>> = Arc::new(AsyncMutex::new(None));

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if let Some(until) = *paused_until.lock().await {
            let now = clock.now();
            if now < until {
                let wait = (until - now).to_std().unwrap_or(Duration::ZERO);
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(wait) => {}
                }
                continue;
            }
            *paused_until.lock().await = None;
            health.set_rate_limit_pause(None);
        }

        let Some(event_ref) = backlog.pop() else {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = backlog_notify.notified() => {}
                () = tokio::time::sleep(Duration::from_secs(5)) => {}
            }
            continue;
        };

        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => permit.expect("semaphore never closed"),
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = token_bucket.acquire() => {}
        }

        let enricher = enricher.clone();
        let output = output.clone();
        let health = health.clone();
        let backlog_for_retry = backlog.clone();
        let paused_until = paused_until.clone();
        let clock = clock.clone();
        let pause_for = config.rate_limit_pause;

        tokio::spawn(async move {
            let _permit = permit;
            match enricher.fetch(&event_ref).await {
                Ok(event) => {
                    health.record_fetched();
                    if output.send(event).await.is_err() {
                        warn!("enrichment output channel closed, dropping resolved event");
                    }
                }
                Err(FetchError::RateLimited) => {
                    let until = clock.now() + chrono::Duration::from_std(pause_for).unwrap();
                    *paused_until.lock().await = Some(until);
                    health.set_rate_limit_pause(Some(until));
                    warn!("enrichment API rate limit hit, pausing fetcher");
                    if let Some(dropped) = backlog_for_retry.push_front(event_ref) {
                        health.record_dropped();
                        warn!(event_id = %dropped.event_id, "backlog full, dropped rate-limited ref");
                    }
                }
                Err(FetchError::Retryable(reason)) => {
                    warn!(event_id = %event_ref.event_id, reason, "retryable fetch error, requeued");
                    if let Some(dropped) = backlog_for_retry.push_front(event_ref) {
                        health.record_dropped();
                        warn!(event_id = %dropped.event_id, "backlog full, dropped retried ref");
                    }
                }
                Err(FetchError::NotFound) => {
                    info!(event_id = %event_ref.event_id, "event no longer exists upstream, dropped");
                }
                Err(FetchError::Permanent(reason)) => {
                    health.record_dropped_permanent();
                    warn!(event_id = %event_ref.event_id, reason, "permanent fetch error, dropped");
                }
            }
        });
    }

    info!("enrichment fetcher loop stopped");
}

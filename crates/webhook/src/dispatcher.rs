//! The bounded, per-profile webhook sender.
//!
//! One [`DropOldestQueue`] and one background send loop per registered
//! profile endpoint, mirroring the source client's and enrichment
//! fetcher's `CancellationToken`-driven run-loop shape. Ordering is FIFO
//! within a profile; cross-profile ordering is never guaranteed, since each
//! endpoint drains on its own task at its own pace.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use gatewatch_core::{Alert, Clock, DropOldestQueue, ProfileId, WatchlistProfile, WebhookUrl};
use gatewatch_executor::{JitterSource, RetryStrategy, TokenBucket};
use gatewatch_router::AlertSink;

use crate::error::DispatchError;
use crate::health::{EndpointHealth, EndpointHealthTracker};
use crate::sender::WebhookSender;

/// Tunables shared by every endpoint (defaults).
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub queue_capacity: usize,
    pub rate_per_second: f64,
    /// Retry backoff ceiling; per-profile `delivery_policy.retry_delay`
    /// supplies the starting delay, this caps how large it can grow.
    pub retry_cap: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            rate_per_second: 5.0,
            retry_cap: Duration::from_secs(60),
        }
    }
}

struct Endpoint {
    url: RwLock<WebhookUrl>,
    queue: Arc<DropOldestQueue<Alert>>,
    notify: Arc<Notify>,
    health: Arc<EndpointHealthTracker>,
}

/// Owns one background send loop per registered profile. Implements
/// [`AlertSink`] so the notification router can hand it alerts without
/// knowing anything about HTTP delivery.
pub struct WebhookDispatcher {
    sender: Arc<dyn WebhookSender>,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn JitterSource>,
    config: DispatcherConfig,
    cancel: CancellationToken,
    endpoints: DashMap<ProfileId, Arc<Endpoint>>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl WebhookDispatcher {
    #[must_use]
    pub fn new(
        sender: Arc<dyn WebhookSender>,
        clock: Arc<dyn Clock>,
        jitter: Arc<dyn JitterSource>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            sender,
            clock,
            jitter,
            config,
            cancel: CancellationToken::new(),
            endpoints: DashMap::new(),
            tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register (or update) the endpoint for one profile and, the first
    /// time this profile is seen, spawn its background sender loop.
    ///
    /// Called by the orchestrator at startup and after every
    /// `reload_profiles`; an already-registered profile just gets its URL
    /// swapped in, the existing queue and task keep running.
    pub fn register_endpoint(&self, profile: &WatchlistProfile) {
        let profile_id = ProfileId::from(profile.name.as_str());
        let url = profile.webhook_url.clone();

        if let Some(existing) = self.endpoints.get(&profile_id) {
            *existing.url.write().expect("endpoint url lock poisoned") = url;
            return;
        }

        let endpoint = Arc::new(Endpoint {
            url: RwLock::new(url),
            queue: Arc::new(DropOldestQueue::new(self.config.queue_capacity)),
            notify: Arc::new(Notify::new()),
            health: Arc::new(EndpointHealthTracker::new()),
        });
        self.endpoints.insert(profile_id.clone(), endpoint.clone());

        let retry_strategy = RetryStrategy::Exponential {
            base: profile.delivery_policy.retry_delay,
            cap: self.config.retry_cap,
            jitter_max: Duration::from_millis(250),
        };
        let token_bucket = Arc::new(TokenBucket::new(
            self.config.rate_per_second,
            self.config.rate_per_second,
            self.clock.clone(),
        ));

        let handle = tokio::spawn(run_endpoint(
            profile_id,
            endpoint,
            self.sender.clone(),
            token_bucket,
            self.clock.clone(),
            self.jitter.clone(),
            retry_strategy,
            profile.delivery_policy.max_attempts,
            self.cancel.clone(),
        ));
        self.tasks.lock().expect("dispatcher tasks lock poisoned").push(handle);
    }

    /// Read-only health snapshot for one profile, for the health surface
    ///. Returns `None` if no endpoint is registered for it.
    #[must_use]
    pub fn endpoint_health(&self, profile_id: &ProfileId) -> Option<EndpointHealth> {
        self.endpoints.get(profile_id).map(|e| {
            let now = self.clock.now();
            e.health.snapshot(now, e.queue.len())
        })
    }

    /// Cancel every endpoint's send loop and wait for it to drain, up to
    /// `deadline` (the webhook dispatcher drains until empty or a
    /// 10s deadline). Any task still running past the deadline is
    /// abandoned; no store state can be half-written by a webhook send, so
    /// abandoning is safe.
    pub async fn shutdown(&self, deadline: Duration) {
        self.cancel.cancel();
        let handles = std::mem::take(&mut *self.tasks.lock().expect("dispatcher tasks lock poisoned"));
        let joined = tokio::time::timeout(deadline, futures::future::join_all(handles)).await;
        if joined.is_err() {
            warn!(deadline_secs = deadline.as_secs(), "webhook dispatcher shutdown deadline exceeded");
        }
    }
}

impl AlertSink for WebhookDispatcher {
    fn enqueue(&self, alert: Alert) {
        let Some(endpoint) = self.endpoints.get(&alert.profile_id) else {
            warn!(profile = %alert.profile_id, "no webhook endpoint registered for profile, dropping alert");
            return;
        };
        if let Some(dropped) = endpoint.queue.push(alert) {
            warn!(profile = %dropped.profile_id, alert_id = %dropped.alert_id, "webhook queue full, dropped oldest alert");
        }
        endpoint.notify.notify_one();
    }

    fn try_update_payload(&self, alert_id: Uuid, payload: serde_json::Value) -> bool {
        for entry in self.endpoints.iter() {
            if entry.value().queue.update_matching(|a| a.alert_id == alert_id, |a| a.payload = payload.clone()) {
                return true;
            }
        }
        false
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_endpoint(
    profile_id: ProfileId,
    endpoint: Arc<Endpoint>,
    sender: Arc<dyn WebhookSender>,
    token_bucket: Arc<TokenBucket>,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn JitterSource>,
    retry_strategy: RetryStrategy,
    max_attempts: u32,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let Some(mut alert) = endpoint.queue.pop() else {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = endpoint.notify.notified() => {}
                () = tokio::time::sleep(Duration::from_secs(5)) => {}
            }
            continue;
        };

        alert.mark_sending();
        let mut attempts: u32 = 0;

        'send: loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break 'send,
                () = token_bucket.acquire() => {}
            }

            let url = endpoint.url.read().expect("endpoint url lock poisoned").clone();
            alert.record_attempt();

            match sender.send(&url, &alert.payload).await {
                Ok(()) => {
                    endpoint.health.record_success(clock.now());
                    alert.mark_delivered();
                    break 'send;
                }
                Err(DispatchError::RateLimited { retry_after }) => {
                    let wait = retry_after.unwrap_or(Duration::from_secs(1));
                    warn!(profile = %profile_id, wait_secs = wait.as_secs(), "webhook rate limited, honoring retry-after");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break 'send,
                        () = tokio::time::sleep(wait) => {}
                    }
                }
                Err(e @ (DispatchError::Transport(_) | DispatchError::ServerError { .. })) => {
                    attempts += 1;
                    if attempts >= max_attempts {
                        endpoint.health.record_failure(clock.now(), &e.to_string());
                        alert.mark_failed();
                        warn!(profile = %profile_id, attempts, error = %e, "webhook delivery failed, dropped after max attempts");
                        break 'send;
                    }
                    let delay = retry_strategy.delay_for(attempts, jitter.as_ref());
                    warn!(profile = %profile_id, attempts, error = %e, "webhook send failed, retrying");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break 'send,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e @ DispatchError::Unauthorized { .. }) => {
                    endpoint.health.record_failure(clock.now(), &e.to_string());
                    endpoint.health.mark_suspect();
                    alert.mark_failed();
                    warn!(profile = %profile_id, error = %e, "webhook unauthorized, marked suspect");
                    break 'send;
                }
                Err(e @ DispatchError::ClientError { .. }) => {
                    endpoint.health.record_failure(clock.now(), &e.to_string());
                    alert.mark_dropped();
                    warn!(profile = %profile_id, error = %e, "webhook client error, dropped after single attempt");
                    break 'send;
                }
            }
        }
    }

    info!(profile = %profile_id, "webhook sender loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gatewatch_core::{FixedClock, TriggerKind};
    use gatewatch_executor::FixedJitter;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    fn profile(name: &str, url: &str) -> WatchlistProfile {
        WatchlistProfile {
            schema_version: gatewatch_core::CURRENT_SCHEMA_VERSION,
            name: name.into(),
            display_name: name.into(),
            enabled: true,
            webhook_url: WebhookUrl::from(url),
            triggers: gatewatch_core::Triggers::default(),
            throttle_window: StdDuration::from_secs(300),
            quiet_hours: None,
            location_scope: BTreeSet::new(),
            watched_orgs: BTreeSet::new(),
            watched_alliances: BTreeSet::new(),
            rate_limit_policy: gatewatch_core::RateLimitPolicy::default(),
            delivery_policy: gatewatch_core::DeliveryPolicy::default(),
        }
    }

    fn sample_alert(profile_name: &str) -> Alert {
        Alert::new(
            ProfileId::from(profile_name),
            TriggerKind::WatchlistActivity,
            gatewatch_core::LocationId::new(1),
            serde_json::json!({"msg": "hello"}),
            chrono::Utc::now(),
        )
    }

    struct ScriptedSender {
        responses: tokio::sync::Mutex<Vec<Result<(), DispatchError>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WebhookSender for ScriptedSender {
        async fn send(&self, _url: &WebhookUrl, _payload: &serde_json::Value) -> Result<(), DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().await;
            if responses.is_empty() {
                Ok(())
            } else {
                responses.remove(0)
            }
        }
    }

    fn dispatcher(sender: Arc<dyn WebhookSender>) -> WebhookDispatcher {
        let clock: Arc<dyn Clock> = FixedClock::shared(chrono::Utc::now());
        WebhookDispatcher::new(sender, clock, Arc::new(FixedJitter::none()), DispatcherConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_without_registration_is_dropped_silently() {
        let sender = Arc::new(ScriptedSender {
            responses: tokio::sync::Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        });
        let dispatcher = dispatcher(sender.clone());
        dispatcher.enqueue(sample_alert("unregistered"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_send_delivers_and_records_health() {
        let sender = Arc::new(ScriptedSender {
            responses: tokio::sync::Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        });
        let dispatcher = dispatcher(sender.clone());
        dispatcher.register_endpoint(&profile("alpha", "https://example.com/hook"));
        dispatcher.enqueue(sample_alert("alpha"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);
        let health = dispatcher
            .endpoint_health(&ProfileId::from("alpha"))
            .expect("endpoint registered");
        assert!(health.last_successful_send_at.is_some());
        assert!(!health.paused);

        dispatcher.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transport_errors_up_to_max_attempts() {
        let sender = Arc::new(ScriptedSender {
            responses: tokio::sync::Mutex::new(vec![
                Err(DispatchError::Transport("boom".into())),
                Err(DispatchError::Transport("boom".into())),
                Ok(()),
            ]),
            calls: AtomicUsize::new(0),
        });
        let dispatcher = dispatcher(sender.clone());
        dispatcher.register_endpoint(&profile("alpha", "https://example.com/hook"));
        dispatcher.enqueue(sample_alert("alpha"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sender.calls.load(Ordering::SeqCst), 3);
        let health = dispatcher.endpoint_health(&ProfileId::from("alpha")).unwrap();
        assert!(health.last_successful_send_at.is_some());

        dispatcher.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_marks_suspect_without_retry() {
        let sender = Arc::new(ScriptedSender {
            responses: tokio::sync::Mutex::new(vec![Err(DispatchError::Unauthorized { status: 401 })]),
            calls: AtomicUsize::new(0),
        });
        let dispatcher = dispatcher(sender.clone());
        dispatcher.register_endpoint(&profile("alpha", "https://example.com/hook"));
        dispatcher.enqueue(sample_alert("alpha"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);
        let health = dispatcher.endpoint_health(&ProfileId::from("alpha")).unwrap();
        assert!(health.suspect);

        dispatcher.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn try_update_payload_rewrites_still_queued_alert() {
        let sender = Arc::new(ScriptedSender {
            responses: tokio::sync::Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        });
        let dispatcher = dispatcher(sender);
        dispatcher.register_endpoint(&profile("alpha", "https://example.com/hook"));
        let alert = sample_alert("alpha");
        let alert_id = alert.alert_id;

        // Cancel immediately so the send loop never drains the queue, then
        // assert the in-place update lands on the still-queued alert.
        dispatcher.cancel.cancel();
        dispatcher.enqueue(alert);
        let updated = dispatcher.try_update_payload(alert_id, serde_json::json!({"upgraded": true}));
        assert!(updated);
    }

    #[tokio::test(start_paused = true)]
    async fn outage_pause_clears_on_next_success() {
        let sender = Arc::new(ScriptedSender {
            responses: tokio::sync::Mutex::new(vec![
                Err(DispatchError::ClientError { status: 400 }),
            ]),
            calls: AtomicUsize::new(0),
        });
        let dispatcher = dispatcher(sender.clone());
        dispatcher.register_endpoint(&profile("alpha", "https://example.com/hook"));
        dispatcher.enqueue(sample_alert("alpha"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let health = dispatcher.endpoint_health(&ProfileId::from("alpha")).unwrap();
        assert!(!health.paused);

        dispatcher.shutdown(Duration::from_secs(1)).await;
    }
}

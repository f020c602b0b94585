//! The source client's run loop: poll, backlog push, backoff, cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gatewatch_core::{DropOldestQueue, EventRef};
use gatewatch_executor::{JitterSource, RetryStrategy};

use crate::client::{EventSource, PollOutcome};
use crate::health::{SourceHealthTracker, SourcePhase};

/// Drive the long-poll loop until `cancel` fires.
///
/// at most one outstanding request per `queue_id` (guaranteed by
/// this being a single sequential loop), cancellation unblocks within
/// `ttw + 1s`, exponential backoff with jitter on error starting at 1s
/// capped at 60s and reset on success.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    source: Arc<dyn EventSource>,
    backlog: Arc<DropOldestQueue<EventRef>>,
    backlog_notify: Arc<Notify>,
    health: Arc<SourceHealthTracker>,
    cancel: CancellationToken,
    retry_strategy: RetryStrategy,
    jitter: Arc<dyn JitterSource>,
    ttw: Duration,
) {
    let mut attempt: u32 = 0;
    let poll_timeout = ttw + Duration::from_secs(1);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        health.set_phase(SourcePhase::Polling);

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = tokio::time::timeout(poll_timeout, source.poll_once()) => result,
        };

        match outcome {
            Ok(Ok(PollOutcome::Event(event_ref))) => {
                attempt = 0;
                health.record_success(chrono::Utc::now(), SourcePhase::Received);
                push_event(&backlog, &backlog_notify, event_ref);
            }
            Ok(Ok(PollOutcome::Empty)) => {
                attempt = 0;
                health.record_success(chrono::Utc::now(), SourcePhase::Empty);
            }
            Ok(Err(e)) if e.is_sticky() => {
                health.record_auth_ban();
                warn!(error = %e, "source client auth banned, pausing until operator intervention");
                break;
            }
            Ok(Err(e)) if matches!(e, gatewatch_core::GatewatchError::InvalidPayload(_)) => {
                // Responded, just malformed: does not count as a transport
                // failure but is worth a warning (counted, logged,
                // dropped).
                attempt = 0;
                health.record_success(chrono::Utc::now(), SourcePhase::Empty);
                warn!(error = %e, "invalid upstream payload, skipped");
            }
            Ok(Err(e)) => {
                attempt += 1;
                health.record_error(chrono::Utc::now());
                warn!(error = %e, attempt, "source poll failed, backing off");
                if !sleep_or_cancel(&retry_strategy, attempt, jitter.as_ref(), &cancel).await {
                    break;
                }
            }
            Err(_elapsed) => {
                attempt += 1;
                health.record_error(chrono::Utc::now());
                warn!(attempt, "source poll exceeded ttw+1s deadline, backing off");
                if !sleep_or_cancel(&retry_strategy, attempt, jitter.as_ref(), &cancel).await {
                    break;
                }
            }
        }
    }

    health.set_phase(SourcePhase::Idle);
    info!("source client loop stopped");
}

fn push_event(backlog: &DropOldestQueue<EventRef>, notify: &Notify, event_ref: EventRef) {
    if let Some(dropped) = backlog.push(event_ref) {
        warn!(event_id = %dropped.event_id, "enrichment backlog full, dropped oldest ref");
    }
    notify.notify_one();
}

/// Sleep for the backoff delay, racing the cancellation token. Returns
/// `false` if cancellation fired first (caller should stop the loop).
async fn sleep_or_cancel(
    strategy: &RetryStrategy,
    attempt: u32,
    jitter: &dyn JitterSource,
    cancel: &CancellationToken,
) -> bool {
    let delay = strategy.delay_for(attempt, jitter);
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gatewatch_core::GatewatchError;
    use gatewatch_executor::FixedJitter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    struct ScriptedSource {
        outcomes: AsyncMutex<Vec<Result<PollOutcome, GatewatchError>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn poll_once(&self) -> Result<PollOutcome, GatewatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().await;
            if outcomes.is_empty() {
                Ok(PollOutcome::Empty)
            } else {
                outcomes.remove(0)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn event_is_pushed_to_backlog() {
        let source = Arc::new(ScriptedSource {
            outcomes: AsyncMutex::new(vec![Ok(PollOutcome::Event(EventRef::new(1u64, "h")))]),
            calls: AtomicUsize::new(0),
        });
        let backlog = Arc::new(DropOldestQueue::new(10));
        let notify = Arc::new(Notify::new());
        let health = Arc::new(SourceHealthTracker::new());
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        let backlog_clone = backlog.clone();
        let handle = tokio::spawn(run(
            source,
            backlog_clone,
            notify,
            health.clone(),
            cancel.clone(),
            RetryStrategy::default(),
            Arc::new(FixedJitter::none()),
            Duration::from_secs(1),
        ));

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel_clone.cancel();
        handle.await.unwrap();

        assert_eq!(backlog.len(), 1);
        assert!(health.snapshot().last_successful_poll_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn auth_ban_stops_loop() {
        let source = Arc::new(ScriptedSource {
            outcomes: AsyncMutex::new(vec![Err(GatewatchError::AuthBan("420".into()))]),
            calls: AtomicUsize::new(0),
        });
        let backlog = Arc::new(DropOldestQueue::new(10));
        let notify = Arc::new(Notify::new());
        let health = Arc::new(SourceHealthTracker::new());
        let cancel = CancellationToken::new();

        run(
            source,
            backlog,
            notify,
            health.clone(),
            cancel,
            RetryStrategy::default(),
            Arc::new(FixedJitter::none()),
            Duration::from_secs(1),
        )
        .await;

        assert!(health.snapshot().auth_banned);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_unblocks_promptly() {
        struct HangingSource;
        #[async_trait]
        impl EventSource for HangingSource {
            async fn poll_once(&self) -> Result<PollOutcome, GatewatchError> {
                std::future::pending().await
            }
        }

        let backlog = Arc::new(DropOldestQueue::new(10));
        let notify = Arc::new(Notify::new());
        let health = Arc::new(SourceHealthTracker::new());
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let handle = tokio::spawn(run(
            Arc::new(HangingSource),
            backlog,
            notify,
            health,
            cancel,
            RetryStrategy::default(),
            Arc::new(FixedJitter::none()),
            Duration::from_secs(2),
        ));

        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel_clone.cancel();
        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("loop should stop within cancellation deadline")
            .unwrap();
    }
}

//! The per-event fan-out: store, classify, route, detect.
//!
//! One task owns this loop, reading resolved [`Event`]s off the channel the
//! enrichment fetcher publishes to. Running it single-threaded keeps the
//! store write ordering simple without needing a per-location lock here —
//! `SqliteEventStore` already serializes writes through its own pool.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{error, warn};

use gatewatch_core::{Event, PipelineCursor};
use gatewatch_detector::Detector;
use gatewatch_filter::Evaluator;
use gatewatch_router::{EventMatch, NotificationRouter};
use gatewatch_store::EventStore;

/// Drain `events` until the channel closes (the enrichment fetcher dropped
/// its sender, which only happens on shutdown).
///
/// A store write failure is retried once; if the retry also
/// fails, the event is dropped and logged rather than blocking the whole
/// pipeline on one bad insert; downstream processing still runs from memory
/// using the `Event` already in hand.
///
/// `cursor` tracks read progress against the upstream queue (the
/// backfill gate reads it back at the next startup); advanced and persisted
/// here since this loop is the single place every ingested event passes
/// through exactly once.
pub async fn run(
    mut events: mpsc::Receiver<Event>,
    store: Arc<dyn EventStore>,
    evaluator: Arc<Evaluator>,
    router: Arc<NotificationRouter>,
    detector: Arc<Detector>,
    cursor: Arc<AsyncMutex<PipelineCursor>>,
) {
    while let Some(event) = events.recv().await {
        if let Err(err) = insert_with_one_retry(store.as_ref(), &event).await {
            error!(event_id = %event.event_id, error = %err, "event store insert failed twice, continuing from memory");
        }

        {
            let mut cursor = cursor.lock().await;
            cursor.observe_event_time(event.event_time);
            if let Err(err) = store.cursor_write(&cursor).await {
                warn!(error = %err, "failed to persist pipeline cursor");
            }
        }

        let matches: Vec<EventMatch> = evaluator
            .classify(&event)
            .into_iter()
            .map(|m| EventMatch {
                profile_id: m.profile_id,
                trigger_kind: m.trigger_kind,
            })
            .collect();

        if !matches.is_empty() {
            router.on_event(&event, &matches);
        }

        match detector.on_event(event.location_id, event.event_time).await {
            Ok(Some(finding)) => router.on_finding(&finding),
            Ok(None) => {}
            Err(err) => warn!(location_id = %event.location_id, error = %err, "gatecamp detection failed for this event"),
        }
    }

    warn!("pipeline fan-out stopped: upstream event channel closed");
}

async fn insert_with_one_retry(
    store: &dyn EventStore,
    event: &Event,
) -> Result<(), gatewatch_store::StoreError> {
    match store.insert_event(event).await {
        Ok(_) => Ok(()),
        Err(first_err) => {
            warn!(event_id = %event.event_id, error = %first_err, "event store insert failed, retrying once");
            store.insert_event(event).await.map(|_| ())
        }
    }
}

//! Wires every component together and owns the pipeline's lifecycle.
//!
//! Nothing here is a free-floating global: every component is constructed
//! once in [`Orchestrator::bootstrap`], held behind an `Arc`, and handed
//! explicitly to whatever needs it (Design Notes: replace global singleton
//! caches with explicit components owned by the orchestrator).

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gatewatch_backfill::{BackfillConfig as BackfillServiceConfig, BackfillReport, BackfillService, HttpSecondaryHistoryApi};
use gatewatch_core::{
    system_clock, AreaEffectPlatforms, Clock, DropOldestQueue, EventRef, PipelineCursor,
    ProfileId, RegionId, StaticRegionLookup, WatchlistProfile,
};
use gatewatch_detector::Detector;
use gatewatch_enrichment::{FetcherConfig, HttpEnricher};
use gatewatch_executor::{RandJitter, TokenBucket};
use gatewatch_filter::Evaluator;
use gatewatch_router::NotificationRouter;
use gatewatch_source::{HttpEventSource, SourceClientConfig, SourceHealthTracker};
use gatewatch_store::{spawn_retention_sweeper, EventStore, SqliteEventStore};
use gatewatch_webhook::{DispatcherConfig, HttpWebhookSender, WebhookDispatcher};

use crate::config::GatewatchConfig;
use crate::error::OrchestratorError;
use crate::health::{PipelineHealth, SourceHealthView};
use crate::profiles::{load_profiles, ProfileLoadReport};

/// Result of one control-surface command; every command is idempotent
/// and returns a structured result.
#[derive(Debug, Clone, Serialize)]
pub struct ControlResult {
    pub command: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl ControlResult {
    fn ok(command: &'static str, detail: impl Into<String>) -> Self {
        Self {
            command,
            ok: true,
            detail: detail.into(),
        }
    }
}

/// Owns every long-lived component and task handle for one pipeline
/// instance. Constructed once by [`Orchestrator::bootstrap`] from a loaded
/// [`GatewatchConfig`]; `start`/`stop` are idempotent .
pub struct Orchestrator {
    config: GatewatchConfig,
    queue_id: u64,

    store: Arc<dyn EventStore>,
    evaluator: Arc<Evaluator>,
    router: Arc<NotificationRouter>,
    detector: Arc<Detector>,
    dispatcher: Arc<WebhookDispatcher>,
    backfill: Arc<BackfillService>,
    region_lookup: Arc<StaticRegionLookup>,
    clock: Arc<dyn Clock>,

    source_health: Arc<SourceHealthTracker>,
    enrichment_health: Arc<gatewatch_enrichment::EnrichmentHealthTracker>,
    /// Set by `start` to the backlog the running fetcher is draining; `None`
    /// while stopped, reported as depth 0 by `health`.
    backlog: AsyncMutex<Option<Arc<DropOldestQueue<EventRef>>>>,

    cursor: Arc<AsyncMutex<PipelineCursor>>,
    profile_regions: AsyncMutex<BTreeSet<RegionId>>,
    profile_ids: AsyncMutex<Vec<ProfileId>>,

    running: AtomicBool,
    tasks: AsyncMutex<Vec<JoinHandle<()>>>,
    source_cancel: AsyncMutex<Option<CancellationToken>>,
    enrichment_cancel: AsyncMutex<Option<CancellationToken>>,
}

impl Orchestrator {
    /// Build every component from configuration but do not start any
    /// background task yet; call [`Orchestrator::start`] for that.
    pub async fn bootstrap(config: GatewatchConfig) -> Result<Arc<Self>, OrchestratorError> {
        let clock = system_clock();
        let jitter = Arc::new(RandJitter);

        let queue_id = stable_queue_id(&config);

        let store_config = gatewatch_store::StoreConfig {
            data_dir: config.instance.data_dir.clone(),
            event_retention: config.store.event_retention(),
            finding_retention: config.store.finding_retention(),
            sweep_interval: config.store.sweep_interval(),
        };
        let store: Arc<dyn EventStore> = Arc::new(SqliteEventStore::open(&store_config).await?);

        let area_effect = Arc::new(load_area_effect(config.instance.area_effect_platforms_path.as_deref()));
        let region_lookup = Arc::new(load_region_table(config.instance.region_table_path.as_deref()));

        let ProfileLoadReport { profiles, rejected } = load_profiles(&config.instance.profiles_dir);
        if !rejected.is_empty() {
            warn!(count = rejected.len(), "some profiles failed to load at startup");
        }
        let profile_regions = union_of_location_scopes(&profiles);
        let profile_ids: Vec<ProfileId> = profiles.iter().map(|p| ProfileId::new(p.name.clone())).collect();

        let evaluator = Arc::new(Evaluator::new(profiles.clone()));

        let dispatcher = Arc::new(WebhookDispatcher::new(
            Arc::new(HttpWebhookSender::new()),
            clock.clone(),
            jitter.clone(),
            DispatcherConfig {
                queue_capacity: config.webhook.queue_capacity,
                rate_per_second: config.webhook.rate_per_second,
                ..DispatcherConfig::default()
            },
        ));
        for profile in &profiles {
            dispatcher.register_endpoint(profile);
        }

        let router = Arc::new(NotificationRouter::new(
            profiles,
            dispatcher.clone(),
            region_lookup.clone() as Arc<dyn gatewatch_core::RegionLookup>,
            clock.clone(),
        ));

        let detector = Arc::new(Detector::new(
            store.clone(),
            area_effect,
            clock.clone(),
            config.detector.to_rule_config(),
        ));

        let backfill_token_bucket = Arc::new(TokenBucket::new(
            config.backfill.rate_per_second,
            config.backfill.rate_per_second,
            clock.clone(),
        ));
        let backfill = Arc::new(BackfillService::new(
            Arc::new(HttpSecondaryHistoryApi::new(config.backfill.base_url.clone())),
            store.clone(),
            backfill_token_bucket,
            BackfillServiceConfig {
                max_events_per_run: config.backfill.max_events_per_run,
                upstream_retention: config.backfill.upstream_retention(),
            },
        ));

        let cursor = load_or_init_cursor(store.as_ref(), queue_id, clock.as_ref()).await?;

        Ok(Arc::new(Self {
            config,
            queue_id,
            store,
            evaluator,
            router,
            detector,
            dispatcher,
            backfill,
            region_lookup,
            clock,
            source_health: Arc::new(SourceHealthTracker::new()),
            enrichment_health: Arc::new(gatewatch_enrichment::EnrichmentHealthTracker::new()),
            backlog: AsyncMutex::new(None),
            cursor: Arc::new(AsyncMutex::new(cursor)),
            profile_regions: AsyncMutex::new(profile_regions),
            profile_ids: AsyncMutex::new(profile_ids),
            running: AtomicBool::new(false),
            tasks: AsyncMutex::new(Vec::new()),
            source_cancel: AsyncMutex::new(None),
            enrichment_cancel: AsyncMutex::new(None),
        }))
    }

    #[must_use]
    pub fn queue_id(&self) -> u64 {
        self.queue_id
    }

    /// Start the pipeline: run backfill if the gate triggers, then spin up
    /// the source client, enrichment fetcher, per-event fan-out, and
    /// retention sweeper tasks. Idempotent: calling this while already
    /// running is a no-op.
    pub async fn start(self: &Arc<Self>) -> ControlResult {
        if self.running.swap(true, Ordering::SeqCst) {
            return ControlResult::ok("start", "already running");
        }

        let regions: Vec<RegionId> = self.profile_regions.lock().await.iter().copied().collect();
        let now = self.clock.now();
        let last_event_time = { self.cursor.lock().await.last_event_time };
        match self.backfill.run(&regions, last_event_time, now).await {
            Ok(report) if report.ran => info!(inserted = report.inserted, "startup backfill complete"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "startup backfill failed, continuing to live polling"),
        }

        let backlog = Arc::new(DropOldestQueue::new(self.config.enrichment.backlog_capacity));
        let backlog_notify = Arc::new(Notify::new());

        let source_cancel = CancellationToken::new();
        let Some(queue_id) = self.config.source.queue_id.clone() else {
            self.running.store(false, Ordering::SeqCst);
            return ControlResult {
                command: "start",
                ok: false,
                detail: "source.queue_id is not configured".into(),
            };
        };
        let source = Arc::new(HttpEventSource::new(SourceClientConfig::new(
            self.config.source.base_url.clone(),
            queue_id,
        )));
        let source_handle = tokio::spawn(gatewatch_source::run_source_loop(
            source,
            backlog.clone(),
            backlog_notify.clone(),
            self.source_health.clone(),
            source_cancel.clone(),
            gatewatch_executor::RetryStrategy::default(),
            Arc::new(RandJitter),
            self.config.source.ttw_duration(),
        ));

        let enrichment_cancel = CancellationToken::new();
        let region_lookup: Arc<dyn gatewatch_core::RegionLookup> = self.region_lookup.clone();
        let enricher = Arc::new(HttpEnricher::new(self.config.enrichment.base_url.clone(), region_lookup));
        let (event_tx, event_rx) = mpsc::channel(self.config.enrichment.backlog_capacity.max(1));
        let fetcher_handle = tokio::spawn(gatewatch_enrichment::run_fetcher(
            enricher,
            backlog.clone(),
            backlog_notify.clone(),
            event_tx,
            self.enrichment_health.clone(),
            enrichment_cancel.clone(),
            self.clock.clone(),
            FetcherConfig {
                concurrency: self.config.enrichment.concurrency,
                rate_per_second: self.config.enrichment.rate_per_second,
                backlog_capacity: self.config.enrichment.backlog_capacity,
                rate_limit_pause: Duration::from_secs(60),
            },
        ));

        let pipeline_handle = tokio::spawn(crate::pipeline::run(
            event_rx,
            self.store.clone(),
            self.evaluator.clone(),
            self.router.clone(),
            self.detector.clone(),
            self.cursor.clone(),
        ));

        let sweeper_handle = spawn_retention_sweeper(
            self.store.clone(),
            chrono::Duration::from_std(self.config.store.event_retention()).unwrap_or_default(),
            chrono::Duration::from_std(self.config.store.finding_retention()).unwrap_or_default(),
            self.config.store.sweep_interval(),
        );

        *self.source_cancel.lock().await = Some(source_cancel);
        *self.enrichment_cancel.lock().await = Some(enrichment_cancel);
        *self.tasks.lock().await = vec![source_handle, fetcher_handle, pipeline_handle, sweeper_handle];
        *self.backlog.lock().await = Some(backlog);

        info!("pipeline started");
        ControlResult::ok("start", "pipeline started")
    }

    /// Ordered shutdown : stop the source client, drain the
    /// enrichment fetcher with a deadline, let the store's own writes
    /// complete (every write already commits before returning), drain the
    /// webhook dispatcher until empty or its deadline, then stop.
    pub async fn stop(self: &Arc<Self>) -> ControlResult {
        if !self.running.swap(false, Ordering::SeqCst) {
            return ControlResult::ok("stop", "already stopped");
        }

        let deadline = Duration::from_secs(self.config.server.shutdown_timeout_secs);

        if let Some(token) = self.source_cancel.lock().await.take() {
            token.cancel();
        }
        if let Some(token) = self.enrichment_cancel.lock().await.take() {
            token.cancel();
        }

        let handles = std::mem::take(&mut *self.tasks.lock().await);
        if tokio::time::timeout(deadline, futures::future::join_all(handles)).await.is_err() {
            warn!(deadline_secs = deadline.as_secs(), "pipeline task shutdown deadline exceeded, abandoning stragglers");
        }

        self.dispatcher.shutdown(deadline).await;
        *self.backlog.lock().await = None;

        info!("pipeline stopped");
        ControlResult::ok("stop", "pipeline stopped")
    }

    /// Re-read the profiles directory and atomically swap the new snapshot
    /// into the filter evaluator, router, and webhook dispatcher. Does not
    /// restart any running task.
    pub async fn reload_profiles(&self) -> ControlResult {
        let ProfileLoadReport { profiles, rejected } = load_profiles(&self.config.instance.profiles_dir);
        let loaded = profiles.len();
        for profile in &profiles {
            self.dispatcher.register_endpoint(profile);
        }
        self.evaluator.reload(profiles.clone());
        self.router.reload(profiles.clone());
        *self.profile_regions.lock().await = union_of_location_scopes(&profiles);
        *self.profile_ids.lock().await = profiles.iter().map(|p| ProfileId::new(p.name.clone())).collect();

        ControlResult::ok(
            "reload_profiles",
            format!("loaded {loaded} profiles, {} rejected", rejected.len()),
        )
    }

    /// Force a backfill run regardless of the gate, per the operator-facing
    /// `backfill_now` control command. Bypasses the normal
    /// `now - cursor.last_event_time > upstream_retention` check by framing
    /// the cutoff as already past the retention window.
    pub async fn backfill_now(&self) -> Result<BackfillReport, OrchestratorError> {
        let regions: Vec<RegionId> = self.profile_regions.lock().await.iter().copied().collect();
        let now = self.clock.now();
        let forced_cutoff = now
            - chrono::Duration::from_std(self.config.backfill.upstream_retention())
                .unwrap_or_default()
            - chrono::Duration::seconds(1);
        self.backfill
            .run(&regions, forced_cutoff, now)
            .await
            .map_err(OrchestratorError::from)
    }

    /// Read-only status snapshot for the health surface and external
    /// interface: degraded state is reported, never an error.
    pub async fn health(&self) -> PipelineHealth {
        let now = self.clock.now();
        let source_snapshot = self.source_health.snapshot();
        let source = SourceHealthView::from_source_health(&source_snapshot, now);

        let store_counts = self.store.counts().await.unwrap_or_default();
        let findings_last_hour = self
            .store
            .recent_findings(now - chrono::Duration::hours(1))
            .await
            .map(|f| f.len() as i64)
            .unwrap_or(0);

        let mut webhooks = std::collections::BTreeMap::new();
        for profile_id in self.profile_ids.lock().await.iter() {
            if let Some(health) = self.dispatcher.endpoint_health(profile_id) {
                webhooks.insert(profile_id.clone(), health);
            }
        }

        let healthy = PipelineHealth::compute_healthy(source.healthy, &webhooks);

        let backlog_size = match self.backlog.lock().await.as_ref() {
            Some(backlog) => backlog.len(),
            None => 0,
        };

        PipelineHealth {
            source,
            enrichment: self.enrichment_health.snapshot(backlog_size),
            store: store_counts,
            findings_last_hour,
            webhooks,
            healthy,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn union_of_location_scopes(profiles: &[WatchlistProfile]) -> BTreeSet<RegionId> {
    profiles.iter().flat_map(|p| p.location_scope.iter().copied()).collect()
}

/// A stable per-installation queue id, derived from the data directory path
/// rather than a random value so the same instance always resumes the same
/// cursor row (`queueID` is stable per installation).
fn stable_queue_id(config: &GatewatchConfig) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    config.instance.data_dir.hash(&mut hasher);
    hasher.finish()
}

async fn load_or_init_cursor(
    store: &dyn EventStore,
    queue_id: u64,
    clock: &dyn Clock,
) -> Result<PipelineCursor, OrchestratorError> {
    match store.cursor_read(queue_id).await? {
        Some(cursor) => Ok(cursor),
        None => Ok(PipelineCursor::new(queue_id, clock.now())),
    }
}

fn load_area_effect(path: Option<&Path>) -> AreaEffectPlatforms {
    let Some(path) = path else {
        return AreaEffectPlatforms::seed_default();
    };
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<AreaEffectPlatforms>(&contents) {
            Ok(set) => set,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "area-effect platforms file invalid, using seed default");
                AreaEffectPlatforms::seed_default()
            }
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "area-effect platforms file unreadable, using seed default");
            AreaEffectPlatforms::seed_default()
        }
    }
}

fn load_region_table(path: Option<&Path>) -> StaticRegionLookup {
    let Some(path) = path else {
        return StaticRegionLookup::default();
    };
    let Ok(contents) = std::fs::read_to_string(path) else {
        warn!(path = %path.display(), "region table file unreadable, starting with an empty table");
        return StaticRegionLookup::default();
    };
    match toml::from_str::<std::collections::HashMap<String, u64>>(&contents) {
        Ok(raw) => {
            let table = raw
                .into_iter()
                .filter_map(|(k, v)| k.parse::<u64>().ok().map(|loc| (loc, v)))
                .collect();
            StaticRegionLookup::new(table)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "region table file invalid, starting with an empty table");
            StaticRegionLookup::default()
        }
    }
}

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use gatewatch_core::{
    AllianceId, Confidence, Event, EventId, GatecampFinding, LocationId, OrgId, PipelineCursor,
    RegionId, VehicleTypeId,
};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::migrations::run_migrations;
use crate::query::{EventQuery, StoreCounts};

fn ids_to_json(ids: &BTreeSet<u64>) -> String {
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}

fn json_to_ids(raw: &str) -> BTreeSet<u64> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Durable, queryable cache of recent events and detector findings, backed by
/// a single SQLite database file under the instance data directory.
///
/// Readers and writers need the platform's standard transactional semantics
/// for concurrent writers; SQLite's own locking (serialized writers, WAL
/// for concurrent readers) provides that directly, which is stricter than
/// strictly-per-location serialization. This type assumes it is the single
/// writer for its database file — additional instances should open a
/// read-only connection instead of a second `EventStore`.
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Open (creating if necessary) the store at `config.database_path()`
    /// and run migrations.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            StoreError::Migration(format!(
                "failed to create data directory {}: {e}",
                config.data_dir.display()
            ))
        })?;

        let options = SqliteConnectOptions::from_str(&config.connection_string())
            .map_err(StoreError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(StoreError::Database)?;

        run_migrations(&pool).await?;
        debug!(path = %config.database_path().display(), "event store opened");
        Ok(Self { pool })
    }

    /// Build a store from an existing pool; migrations are still run.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }
}

/// Durable cache of recent events and detector findings.
///
/// Trait boundary exists so the detector, filter evaluator, and backfill
/// service can be unit tested against an in-memory fake without a SQLite
/// file.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Idempotent by `event_id`; returns `true` if newly inserted, `false`
    /// if the event already existed (a no-op).
    async fn insert_event(&self, event: &Event) -> Result<bool, StoreError>;

    /// Events matching `query`, newest information implied by `since`;
    /// bounded by retention (older events are never returned regardless of
    /// `since`, since they no longer exist).
    async fn query_events(&self, query: EventQuery) -> Result<Vec<Event>, StoreError>;

    /// Delete events with `event_time < cutoff`. Returns the number deleted.
    async fn purge_events_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Append-only: findings are never mutated once recorded.
    async fn record_finding(&self, finding: &GatecampFinding) -> Result<(), StoreError>;

    /// Findings detected at or after `since`, most recent first.
    async fn recent_findings(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<GatecampFinding>, StoreError>;

    async fn purge_findings_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn cursor_read(&self, queue_id: u64) -> Result<Option<PipelineCursor>, StoreError>;

    async fn cursor_write(&self, cursor: &PipelineCursor) -> Result<(), StoreError>;

    /// Snapshot counts used by the health surface.
    async fn counts(&self) -> Result<StoreCounts, StoreError>;
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn insert_event(&self, event: &Event) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Database)?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO events (
                event_id, event_time, location_id, region_id, victim_entity_id,
                victim_org_id, victim_alliance_id, attacker_count, attacker_org_ids,
                attacker_alliance_ids, attacker_vehicle_type_ids,
                final_attacker_vehicle_type_id, total_value, is_minor_kill, ingested_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.event_id.value() as i64)
        .bind(event.event_time.to_rfc3339())
        .bind(event.location_id.value() as i64)
        .bind(event.region_id.value() as i64)
        .bind(event.victim_entity_id.value() as i64)
        .bind(event.victim_org_id.value() as i64)
        .bind(event.victim_alliance_id.map(|a| a.value() as i64))
        .bind(event.attacker_count as i64)
        .bind(ids_to_json(
            &event.attacker_org_ids.iter().map(OrgId::value).collect(),
        ))
        .bind(ids_to_json(
            &event
                .attacker_alliance_ids
                .iter()
                .map(AllianceId::value)
                .collect(),
        ))
        .bind(ids_to_json(
            &event
                .attacker_vehicle_type_ids
                .iter()
                .map(VehicleTypeId::value)
                .collect(),
        ))
        .bind(event.final_attacker_vehicle_type_id.value() as i64)
        .bind(event.total_value)
        .bind(i64::from(event.is_minor_kill))
        .bind(event.ingested_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::Database)?;

        let inserted = result.rows_affected() > 0;

        if inserted {
            for org in &event.attacker_org_ids {
                sqlx::query(
                    "INSERT OR IGNORE INTO event_attacker_orgs (event_id, org_id) VALUES (?, ?)",
                )
                .bind(event.event_id.value() as i64)
                .bind(org.value() as i64)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::Database)?;
            }
        }

        tx.commit().await.map_err(StoreError::Database)?;
        Ok(inserted)
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<Event>, StoreError> {
        let mut sql = String::from(
            "SELECT event_id, event_time, location_id, region_id, victim_entity_id,
                    victim_org_id, victim_alliance_id, attacker_count, attacker_org_ids,
                    attacker_alliance_ids, attacker_vehicle_type_ids,
                    final_attacker_vehicle_type_id, total_value, is_minor_kill, ingested_at
             FROM events WHERE event_time >= ?",
        );
        if query.location_id.is_some() {
            sql.push_str(" AND location_id = ?");
        }
        if query.region_id.is_some() {
            sql.push_str(" AND region_id = ?");
        }
        sql.push_str(" ORDER BY event_time ASC");

        let mut q = sqlx::query(&sql).bind(query.since.to_rfc3339());
        if let Some(loc) = query.location_id {
            q = q.bind(loc.value() as i64);
        }
        if let Some(region) = query.region_id {
            q = q.bind(region.value() as i64);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(StoreError::Database)?;
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(row_to_event(&row)?);
        }
        Ok(events)
    }

    async fn purge_events_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Database)?;

        sqlx::query(
            "DELETE FROM event_attacker_orgs WHERE event_id IN
                (SELECT event_id FROM events WHERE event_time < ?)",
        )
        .bind(cutoff.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::Database)?;

        let result = sqlx::query("DELETE FROM events WHERE event_time < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::Database)?;

        tx.commit().await.map_err(StoreError::Database)?;
        Ok(result.rows_affected())
    }

    async fn record_finding(&self, finding: &GatecampFinding) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO findings (
                location_id, window_seconds, kill_count, attacker_org_ids,
                attacker_vehicle_type_ids, confidence, last_event_time,
                is_chain_area_attack, force_asymmetry, detected_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(finding.location_id.value() as i64)
        .bind(finding.window_seconds as i64)
        .bind(finding.kill_count as i64)
        .bind(ids_to_json(
            &finding.attacker_org_ids.iter().map(OrgId::value).collect(),
        ))
        .bind(ids_to_json(
            &finding
                .attacker_vehicle_type_ids
                .iter()
                .map(VehicleTypeId::value)
                .collect(),
        ))
        .bind(finding.confidence.to_string())
        .bind(finding.last_event_time.to_rfc3339())
        .bind(i64::from(finding.is_chain_area_attack))
        .bind(finding.force_asymmetry)
        .bind(finding.detected_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;
        Ok(())
    }

    async fn recent_findings(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<GatecampFinding>, StoreError> {
        let rows = sqlx::query(
            "SELECT location_id, window_seconds, kill_count, attacker_org_ids,
                    attacker_vehicle_type_ids, confidence, last_event_time,
                    is_chain_area_attack, force_asymmetry, detected_at
             FROM findings WHERE detected_at >= ? ORDER BY detected_at DESC",
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        let mut findings = Vec::with_capacity(rows.len());
        for row in rows {
            findings.push(row_to_finding(&row)?);
        }
        Ok(findings)
    }

    async fn purge_findings_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM findings WHERE detected_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        Ok(result.rows_affected())
    }

    async fn cursor_read(&self, queue_id: u64) -> Result<Option<PipelineCursor>, StoreError> {
        let row = sqlx::query(
            "SELECT queue_id, last_event_time, last_successful_poll_at
             FROM pipeline_cursor WHERE queue_id = ?",
        )
        .bind(queue_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let last_event_time = parse_time(&row.get::<String, _>("last_event_time"))?;
        let last_successful_poll_at = parse_time(&row.get::<String, _>("last_successful_poll_at"))?;
        Ok(Some(PipelineCursor {
            queue_id: row.get::<i64, _>("queue_id") as u64,
            last_event_time,
            last_successful_poll_at,
        }))
    }

    async fn cursor_write(&self, cursor: &PipelineCursor) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO pipeline_cursor (queue_id, last_event_time, last_successful_poll_at)
             VALUES (?, ?, ?)
             ON CONFLICT(queue_id) DO UPDATE SET
                last_event_time = excluded.last_event_time,
                last_successful_poll_at = excluded.last_successful_poll_at",
        )
        .bind(cursor.queue_id as i64)
        .bind(cursor.last_event_time.to_rfc3339())
        .bind(cursor.last_successful_poll_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let event_count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM events")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Database)?
            .get("c");

        let one_hour_ago = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        let finding_count_1h: i64 =
            sqlx::query("SELECT COUNT(*) AS c FROM findings WHERE detected_at >= ?")
                .bind(one_hour_ago)
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::Database)?
                .get("c");

        Ok(StoreCounts {
            event_count,
            finding_count_1h,
        })
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp {raw:?}: {e}")))
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<Event, StoreError> {
    let event_time = parse_time(&row.get::<String, _>("event_time"))?;
    let ingested_at = parse_time(&row.get::<String, _>("ingested_at"))?;

    let attacker_org_ids = json_to_ids(&row.get::<String, _>("attacker_org_ids"))
        .into_iter()
        .map(OrgId::new)
        .collect();
    let attacker_alliance_ids = json_to_ids(&row.get::<String, _>("attacker_alliance_ids"))
        .into_iter()
        .map(AllianceId::new)
        .collect();
    let attacker_vehicle_type_ids = json_to_ids(&row.get::<String, _>("attacker_vehicle_type_ids"))
        .into_iter()
        .map(VehicleTypeId::new)
        .collect();

    let victim_alliance_id: Option<i64> = row.get("victim_alliance_id");

    Event::new(
        EventId::new(row.get::<i64, _>("event_id") as u64),
        event_time,
        LocationId::new(row.get::<i64, _>("location_id") as u64),
        RegionId::new(row.get::<i64, _>("region_id") as u64),
        gatewatch_core::EntityId::new(row.get::<i64, _>("victim_entity_id") as u64),
        OrgId::new(row.get::<i64, _>("victim_org_id") as u64),
        victim_alliance_id.map(|a| AllianceId::new(a as u64)),
        row.get::<i64, _>("attacker_count") as u32,
        attacker_org_ids,
        attacker_alliance_ids,
        attacker_vehicle_type_ids,
        VehicleTypeId::new(row.get::<i64, _>("final_attacker_vehicle_type_id") as u64),
        row.get("total_value"),
        row.get::<i64, _>("is_minor_kill") != 0,
        ingested_at,
    )
    .map_err(|e| {
        warn!(error = %e, "stored event failed re-validation on read");
        StoreError::Corrupt(e.to_string())
    })
}

fn row_to_finding(row: &sqlx::sqlite::SqliteRow) -> Result<GatecampFinding, StoreError> {
    let last_event_time = parse_time(&row.get::<String, _>("last_event_time"))?;
    let detected_at = parse_time(&row.get::<String, _>("detected_at"))?;
    let confidence = match row.get::<String, _>("confidence").as_str() {
        "low" => Confidence::Low,
        "medium" => Confidence::Medium,
        "high" => Confidence::High,
        other => return Err(StoreError::Corrupt(format!("unknown confidence {other:?}"))),
    };

    Ok(GatecampFinding {
        location_id: LocationId::new(row.get::<i64, _>("location_id") as u64),
        window_seconds: row.get::<i64, _>("window_seconds") as u64,
        kill_count: row.get::<i64, _>("kill_count") as usize,
        attacker_org_ids: json_to_ids(&row.get::<String, _>("attacker_org_ids"))
            .into_iter()
            .map(OrgId::new)
            .collect(),
        attacker_vehicle_type_ids: json_to_ids(&row.get::<String, _>("attacker_vehicle_type_ids"))
            .into_iter()
            .map(VehicleTypeId::new)
            .collect(),
        confidence,
        last_event_time,
        is_chain_area_attack: row.get::<i64, _>("is_chain_area_attack") != 0,
        force_asymmetry: row.get("force_asymmetry"),
        detected_at,
    })
}

/// Spawn the periodic retention sweeper (runs at least once per hour).
/// Returns a handle the orchestrator can abort on shutdown.
pub fn spawn_retention_sweeper(
    store: Arc<dyn EventStore>,
    event_retention: chrono::Duration,
    finding_retention: chrono::Duration,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            match store.purge_events_older_than(now - event_retention).await {
                Ok(n) if n > 0 => debug!(deleted = n, "retention sweep purged events"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "retention sweep failed to purge events"),
            }
            match store
                .purge_findings_older_than(now - finding_retention)
                .await
            {
                Ok(n) if n > 0 => debug!(deleted = n, "retention sweep purged findings"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "retention sweep failed to purge findings"),
            }
        }
    })
}

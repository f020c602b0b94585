use sqlx::SqlitePool;

use crate::error::StoreError;

/// Create the store's tables and indexes if they do not already exist.
///
/// Uses plain runtime-checked `sqlx::query` (no `query!` macro) so this
/// crate builds without a live database connection at compile time.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS events (
            event_id INTEGER PRIMARY KEY,
            event_time TEXT NOT NULL,
            location_id INTEGER NOT NULL,
            region_id INTEGER NOT NULL,
            victim_entity_id INTEGER NOT NULL,
            victim_org_id INTEGER NOT NULL,
            victim_alliance_id INTEGER,
            attacker_count INTEGER NOT NULL,
            attacker_org_ids TEXT NOT NULL,
            attacker_alliance_ids TEXT NOT NULL,
            attacker_vehicle_type_ids TEXT NOT NULL,
            final_attacker_vehicle_type_id INTEGER NOT NULL,
            total_value REAL NOT NULL,
            is_minor_kill INTEGER NOT NULL,
            ingested_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(e.to_string()))?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_events_location_time
            ON events (location_id, event_time)",
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(e.to_string()))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_time ON events (event_time)")
        .execute(pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS event_attacker_orgs (
            event_id INTEGER NOT NULL,
            org_id INTEGER NOT NULL,
            PRIMARY KEY (event_id, org_id)
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(e.to_string()))?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_attacker_orgs_org ON event_attacker_orgs (org_id)",
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(e.to_string()))?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS findings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            location_id INTEGER NOT NULL,
            window_seconds INTEGER NOT NULL,
            kill_count INTEGER NOT NULL,
            attacker_org_ids TEXT NOT NULL,
            attacker_vehicle_type_ids TEXT NOT NULL,
            confidence TEXT NOT NULL,
            last_event_time TEXT NOT NULL,
            is_chain_area_attack INTEGER NOT NULL,
            force_asymmetry REAL NOT NULL,
            detected_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(e.to_string()))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_findings_detected ON findings (detected_at)")
        .execute(pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS pipeline_cursor (
            queue_id INTEGER PRIMARY KEY,
            last_event_time TEXT NOT NULL,
            last_successful_poll_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(e.to_string()))?;

    Ok(())
}

//! HTTP control and health surface.
//!
//! No `utoipa` annotations here — this workspace doesn't carry an OpenAPI
//! generator dependency.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::orchestrator::{ControlResult, Orchestrator};

/// Shared application state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the Axum router exposing the health and control endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/control/start", post(start))
        .route("/control/stop", post(stop))
        .route("/control/reload_profiles", post(reload_profiles))
        .route("/control/backfill_now", post(backfill_now))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// `GET /health` -- liveness only, never reflects pipeline degradation.
async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// `GET /status` -- full pipeline health snapshot.
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.orchestrator.health().await;
    let code = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(health))
}

/// `POST /control/start` -- idempotent pipeline start.
async fn start(State(state): State<AppState>) -> impl IntoResponse {
    respond(state.orchestrator.start().await)
}

/// `POST /control/stop` -- ordered, idempotent pipeline shutdown.
async fn stop(State(state): State<AppState>) -> impl IntoResponse {
    respond(state.orchestrator.stop().await)
}

/// `POST /control/reload_profiles` -- re-read the profiles directory without
/// restarting any running task.
async fn reload_profiles(State(state): State<AppState>) -> impl IntoResponse {
    respond(state.orchestrator.reload_profiles().await)
}

/// `POST /control/backfill_now` -- force a backfill run regardless of the
/// gate.
async fn backfill_now(State(state): State<AppState>) -> impl IntoResponse {
    match state.orchestrator.backfill_now().await {
        Ok(report) => (StatusCode::OK, Json(ControlResult {
            command: "backfill_now",
            ok: true,
            detail: format!(
                "inserted {} events across {} regions",
                report.inserted, report.regions_scanned
            ),
        }))
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ControlResult {
                command: "backfill_now",
                ok: false,
                detail: err.to_string(),
            }),
        )
            .into_response(),
    }
}

fn respond(result: ControlResult) -> impl IntoResponse {
    let code = if result.ok {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    (code, Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewatchConfig;

    async fn test_state() -> AppState {
        let mut config = GatewatchConfig::default();
        let tmp = tempfile::tempdir().unwrap();
        config.instance.data_dir = tmp.path().join("data");
        config.instance.profiles_dir = tmp.path().join("profiles");
        std::fs::create_dir_all(&config.instance.data_dir).unwrap();
        std::fs::create_dir_all(&config.instance.profiles_dir).unwrap();
        let orchestrator = Orchestrator::bootstrap(config).await.unwrap();
        AppState { orchestrator }
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let state = test_state().await;
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        drop(state);
    }

    #[tokio::test]
    async fn status_reports_unhealthy_before_start() {
        let state = test_state().await;
        let response = status(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

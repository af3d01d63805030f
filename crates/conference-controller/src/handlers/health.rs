//! Health and readiness handlers.
//!
//! `/v1/health` is the liveness probe and always answers `OK` while the
//! process serves requests. `/v1/ready` pings the database and reports
//! readiness.

use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Readiness check response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// Service readiness status ("ready" or "not_ready").
    pub status: &'static str,

    /// Database connectivity status.
    pub database: &'static str,
}

/// Handler for GET /v1/health (liveness probe).
pub async fn health_check() -> &'static str {
    "OK"
}

/// Handler for GET /v1/ready (readiness probe).
#[instrument(skip_all, name = "conf.handlers.ready")]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                database: "ok",
            }),
        ),
        Err(e) => {
            tracing::warn!(
                target: "conf.handlers.health",
                error = %e,
                "Readiness probe failed on database ping"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    database: "unreachable",
                }),
            )
        }
    }
}

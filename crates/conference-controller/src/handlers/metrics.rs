//! Prometheus metrics endpoint.

use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use std::sync::Arc;

/// Handler for GET /metrics.
///
/// Renders the Prometheus exposition text. Returns 503 when no recorder
/// was installed (e.g. in embedded test servers).
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    match &state.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed\n".to_string(),
        ),
    }
}

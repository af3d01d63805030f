//! Call handlers.
//!
//! - `POST /v1/calls` - Initiate a one-to-one call
//! - `POST /v1/calls/{id}/ringing` - Callee client acknowledges
//! - `POST /v1/calls/{id}/answer` - Answer
//! - `POST /v1/calls/{id}/hangup` - Hang up (either party)
//! - `GET /v1/users/{user_id}/calls` - Paginated history, newest first

use crate::errors::ConfError;
use crate::models::{
    CallActionRequest, CallHistoryResponse, CallRow, InitiateCallRequest,
};
use crate::repositories::calls::DEFAULT_HISTORY_PAGE_SIZE;
use crate::routes::AppState;
use crate::services::CallService;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Query parameters for call history.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Zero-based page number.
    pub page: Option<i64>,
}

fn service(state: &Arc<AppState>) -> CallService {
    CallService::new(
        state.pool.clone(),
        state.bridge.clone(),
        state.events.clone(),
    )
}

/// Handler for POST /v1/calls
pub async fn initiate_call(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InitiateCallRequest>,
) -> Result<(StatusCode, Json<CallRow>), ConfError> {
    let call = service(&state).initiate(&request).await?;
    Ok((StatusCode::CREATED, Json(call)))
}

/// Handler for POST /v1/calls/{id}/ringing
pub async fn call_ringing(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<Uuid>,
    Json(request): Json<CallActionRequest>,
) -> Result<Json<CallRow>, ConfError> {
    let call = service(&state).ringing(call_id, request.user_id).await?;
    Ok(Json(call))
}

/// Handler for POST /v1/calls/{id}/answer
pub async fn answer_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<Uuid>,
    Json(request): Json<CallActionRequest>,
) -> Result<Json<CallRow>, ConfError> {
    let call = service(&state).answer(call_id, request.user_id).await?;
    Ok(Json(call))
}

/// Handler for POST /v1/calls/{id}/hangup
pub async fn hangup_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<Uuid>,
    Json(request): Json<CallActionRequest>,
) -> Result<Json<CallRow>, ConfError> {
    let call = service(&state).hangup(call_id, request.user_id).await?;
    Ok(Json(call))
}

/// Handler for GET /v1/users/{user_id}/calls
pub async fn call_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<CallHistoryResponse>, ConfError> {
    let page = query.page.unwrap_or(0).max(0);
    let calls = service(&state).history(user_id, page).await?;
    Ok(Json(CallHistoryResponse {
        calls,
        page,
        page_size: DEFAULT_HISTORY_PAGE_SIZE,
    }))
}

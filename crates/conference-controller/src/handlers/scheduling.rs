//! Scheduling handlers.
//!
//! - `POST /v1/conferences/schedule` - Schedule a future conference
//! - `POST /v1/conferences/quick` - Quick ad-hoc conference
//! - `POST /v1/chats/{chat_id}/conferences` - Ad-hoc conference from a chat
//! - `POST /v1/conferences/{id}/rsvp` - Update an RSVP
//! - `POST /v1/conferences/{id}/cancel` - Cancel (originator only)
//! - `GET /v1/users/{user_id}/upcoming` - Upcoming roster entries
//! - `GET /v1/reminders/pending` - Due reminders (external scheduler)
//! - `POST /v1/reminders/{id}/sent` - Mark a reminder delivered

use crate::errors::ConfError;
use crate::models::{
    AdHocFromChatRequest, CancelConferenceRequest, ConferenceRow, QuickAdHocRequest,
    ReminderRow, ScheduleConferenceRequest, UpdateRsvpRequest,
};
use crate::routes::AppState;
use crate::services::SchedulingService;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Query parameters for the pending-reminders poll.
#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    /// Poll instant; defaults to now.
    pub now: Option<DateTime<Utc>>,
}

fn service(state: &Arc<AppState>) -> SchedulingService {
    SchedulingService::new(
        state.pool.clone(),
        state.bridge.clone(),
        state.events.clone(),
        state.chat.clone(),
        state.invites.clone(),
    )
}

/// Handler for POST /v1/conferences/schedule
pub async fn schedule_conference(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScheduleConferenceRequest>,
) -> Result<(StatusCode, Json<ConferenceRow>), ConfError> {
    let conference = service(&state).schedule(&request).await?;
    Ok((StatusCode::CREATED, Json(conference)))
}

/// Handler for POST /v1/conferences/quick
pub async fn quick_adhoc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuickAdHocRequest>,
) -> Result<(StatusCode, Json<ConferenceRow>), ConfError> {
    let conference = service(&state).create_quick_adhoc(&request).await?;
    Ok((StatusCode::CREATED, Json(conference)))
}

/// Handler for POST /v1/chats/{chat_id}/conferences
pub async fn adhoc_from_chat(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
    Json(request): Json<AdHocFromChatRequest>,
) -> Result<(StatusCode, Json<ConferenceRow>), ConfError> {
    let conference = service(&state)
        .create_adhoc_from_chat(chat_id, &request)
        .await?;
    Ok((StatusCode::CREATED, Json(conference)))
}

/// Handler for POST /v1/conferences/{id}/rsvp
pub async fn update_rsvp(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
    Json(request): Json<UpdateRsvpRequest>,
) -> Result<StatusCode, ConfError> {
    service(&state).update_rsvp(conference_id, &request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /v1/conferences/{id}/cancel
pub async fn cancel_conference(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
    Json(request): Json<CancelConferenceRequest>,
) -> Result<StatusCode, ConfError> {
    service(&state).cancel(conference_id, &request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /v1/users/{user_id}/upcoming
pub async fn upcoming_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ConferenceRow>>, ConfError> {
    let conferences = service(&state).upcoming_for_user(user_id).await?;
    Ok(Json(conferences))
}

/// Handler for GET /v1/reminders/pending
pub async fn pending_reminders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<ReminderRow>>, ConfError> {
    let now = query.now.unwrap_or_else(Utc::now);
    let reminders = service(&state).pending_reminders(now).await?;
    Ok(Json(reminders))
}

/// Handler for POST /v1/reminders/{id}/sent
pub async fn mark_reminder_sent(
    State(state): State<Arc<AppState>>,
    Path(reminder_id): Path<Uuid>,
) -> Result<StatusCode, ConfError> {
    service(&state).mark_reminder_sent(reminder_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

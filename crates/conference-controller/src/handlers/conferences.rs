//! Conference handlers.
//!
//! Thin HTTP surface over the conference orchestrator:
//!
//! - `POST /v1/conferences` - Create an ad-hoc conference
//! - `GET /v1/conferences` - List active conferences
//! - `GET /v1/conferences/{id}` - Fetch with live participant count
//! - `GET /v1/conferences/by-room/{room_name}` - Fetch by bridge room name
//! - `POST /v1/conferences/{id}/join|leave|mute|kick|end` - Lifecycle
//! - `GET|POST /v1/conferences/{id}/participants` - Roster
//! - `DELETE /v1/conferences/{id}/participants` - Roster removal
//! - `PATCH /v1/conferences/{id}/participants/role` - Role change
//! - `GET /v1/conferences/{id}/moderator-actions` - Audit log
//!
//! Caller identity (`creator_id`, `actor_id`, `user_id`) is injected by
//! the authenticating gateway upstream of this service.

use crate::errors::ConfError;
use crate::models::{
    AddParticipantsRequest, ActorRequest, ConferenceResponse, ConferenceRow,
    CreateConferenceRequest, JoinConferenceRequest, KickParticipantRequest,
    LeaveConferenceRequest, ModeratorActionRow, MuteParticipantRequest,
    ParticipantConnectedRequest, ParticipantRow, RemoveParticipantRequest, UpdateRoleRequest,
};
use crate::repositories::moderator_actions::DEFAULT_AUDIT_PAGE_SIZE;
use crate::routes::AppState;
use crate::services::ConferenceService;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Query parameters for listing conferences.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Restrict the listing to one chat.
    pub chat_id: Option<Uuid>,
}

/// Query parameters for paginated listings.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Zero-based page number.
    pub page: Option<i64>,
}

fn service(state: &Arc<AppState>) -> ConferenceService {
    ConferenceService::new(
        state.pool.clone(),
        state.bridge.clone(),
        state.events.clone(),
        state.chat.clone(),
    )
}

/// Handler for POST /v1/conferences
pub async fn create_conference(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateConferenceRequest>,
) -> Result<(StatusCode, Json<ConferenceRow>), ConfError> {
    let conference = service(&state).create(&request).await?;
    Ok((StatusCode::CREATED, Json(conference)))
}

/// Handler for GET /v1/conferences
pub async fn list_conferences(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ConferenceRow>>, ConfError> {
    let conferences = service(&state).list_active(query.chat_id).await?;
    Ok(Json(conferences))
}

/// Handler for GET /v1/conferences/{id}
pub async fn get_conference(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
) -> Result<Json<ConferenceResponse>, ConfError> {
    let conference = service(&state).get(conference_id).await?;
    Ok(Json(conference))
}

/// Handler for GET /v1/conferences/by-room/{room_name}
pub async fn get_conference_by_room(
    State(state): State<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Result<Json<ConferenceResponse>, ConfError> {
    let conference = service(&state).get_by_room_name(&room_name).await?;
    Ok(Json(conference))
}

/// Handler for POST /v1/conferences/{id}/join
pub async fn join_conference(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
    Json(request): Json<JoinConferenceRequest>,
) -> Result<Json<ParticipantRow>, ConfError> {
    let participant = service(&state).join(conference_id, &request).await?;
    Ok(Json(participant))
}

/// Handler for POST /v1/conferences/{id}/leave
pub async fn leave_conference(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
    Json(request): Json<LeaveConferenceRequest>,
) -> Result<StatusCode, ConfError> {
    service(&state).leave(conference_id, request.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /v1/conferences/{id}/mute
pub async fn mute_participant(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
    Json(request): Json<MuteParticipantRequest>,
) -> Result<Json<ParticipantRow>, ConfError> {
    let participant = service(&state).mute(conference_id, &request).await?;
    Ok(Json(participant))
}

/// Handler for POST /v1/conferences/{id}/kick
pub async fn kick_participant(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
    Json(request): Json<KickParticipantRequest>,
) -> Result<StatusCode, ConfError> {
    service(&state).kick(conference_id, &request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /v1/conferences/{id}/end
pub async fn end_conference(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> Result<StatusCode, ConfError> {
    service(&state).end(conference_id, request.actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /v1/conferences/{id}/participants
pub async fn list_participants(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
) -> Result<Json<Vec<ParticipantRow>>, ConfError> {
    let participants = service(&state).list_participants(conference_id).await?;
    Ok(Json(participants))
}

/// Handler for POST /v1/conferences/{id}/participants
pub async fn add_participants(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
    Json(request): Json<AddParticipantsRequest>,
) -> Result<Json<Vec<ParticipantRow>>, ConfError> {
    let added = service(&state)
        .add_participants(conference_id, request.actor_id, &request.participant_ids)
        .await?;
    Ok(Json(added))
}

/// Handler for DELETE /v1/conferences/{id}/participants
pub async fn remove_participant(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
    Json(request): Json<RemoveParticipantRequest>,
) -> Result<StatusCode, ConfError> {
    service(&state)
        .remove_participant(conference_id, &request)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for PATCH /v1/conferences/{id}/participants/role
pub async fn update_participant_role(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<ParticipantRow>, ConfError> {
    let participant = service(&state).update_role(conference_id, &request).await?;
    Ok(Json(participant))
}

/// Handler for POST /v1/conferences/{id}/participants/{user_id}/connected
///
/// Bridge presence callback: transitions a connecting participant to
/// joined and records the live bridge handles.
pub async fn participant_connected(
    State(state): State<Arc<AppState>>,
    Path((conference_id, user_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ParticipantConnectedRequest>,
) -> Result<Json<ParticipantRow>, ConfError> {
    let participant = service(&state)
        .mark_connected(
            conference_id,
            user_id,
            &request.member_handle,
            request.channel_handle.as_deref(),
        )
        .await?;
    Ok(Json(participant))
}

/// Handler for GET /v1/conferences/{id}/moderator-actions
pub async fn list_moderator_actions(
    State(state): State<Arc<AppState>>,
    Path(conference_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ModeratorActionRow>>, ConfError> {
    let actions = service(&state)
        .list_moderator_actions(
            conference_id,
            query.page.unwrap_or(0).max(0),
            DEFAULT_AUDIT_PAGE_SIZE,
        )
        .await?;
    Ok(Json(actions))
}

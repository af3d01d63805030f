//! HTTP routes for the Conference Controller.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::services::{ChatClient, EventPublisher, InviteFanout, MediaBridge};
use axum::{
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
pub struct AppState {
    /// Database connection pool.
    pub pool: PgPool,

    /// Service configuration.
    pub config: Config,

    /// Media bridge client.
    pub bridge: Arc<dyn MediaBridge>,

    /// Domain event publisher.
    pub events: Arc<dyn EventPublisher>,

    /// Chat subsystem client.
    pub chat: Arc<dyn ChatClient>,

    /// Detached invitation fan-out.
    pub invites: Arc<InviteFanout>,

    /// Prometheus render handle, when a recorder is installed.
    pub metrics_handle: Option<PrometheusHandle>,
}

/// Build the application routes.
///
/// Creates an Axum router with the conference, call, and scheduling
/// surfaces plus health/readiness probes and the metrics endpoint,
/// wrapped in `TraceLayer` and a 30 second request timeout.
pub fn build_routes(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        // Probes and metrics
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        // Conferences
        .route(
            "/v1/conferences",
            post(handlers::conferences::create_conference)
                .get(handlers::conferences::list_conferences),
        )
        .route(
            "/v1/conferences/schedule",
            post(handlers::scheduling::schedule_conference),
        )
        .route(
            "/v1/conferences/quick",
            post(handlers::scheduling::quick_adhoc),
        )
        .route(
            "/v1/conferences/by-room/:room_name",
            get(handlers::conferences::get_conference_by_room),
        )
        .route(
            "/v1/conferences/:id",
            get(handlers::conferences::get_conference),
        )
        .route(
            "/v1/conferences/:id/join",
            post(handlers::conferences::join_conference),
        )
        .route(
            "/v1/conferences/:id/leave",
            post(handlers::conferences::leave_conference),
        )
        .route(
            "/v1/conferences/:id/mute",
            post(handlers::conferences::mute_participant),
        )
        .route(
            "/v1/conferences/:id/kick",
            post(handlers::conferences::kick_participant),
        )
        .route(
            "/v1/conferences/:id/end",
            post(handlers::conferences::end_conference),
        )
        .route(
            "/v1/conferences/:id/rsvp",
            post(handlers::scheduling::update_rsvp),
        )
        .route(
            "/v1/conferences/:id/cancel",
            post(handlers::scheduling::cancel_conference),
        )
        .route(
            "/v1/conferences/:id/participants",
            get(handlers::conferences::list_participants)
                .post(handlers::conferences::add_participants)
                .delete(handlers::conferences::remove_participant),
        )
        .route(
            "/v1/conferences/:id/participants/role",
            patch(handlers::conferences::update_participant_role),
        )
        .route(
            "/v1/conferences/:id/participants/:user_id/connected",
            post(handlers::conferences::participant_connected),
        )
        .route(
            "/v1/conferences/:id/moderator-actions",
            get(handlers::conferences::list_moderator_actions),
        )
        // Chat-attached conferences
        .route(
            "/v1/chats/:chat_id/conferences",
            post(handlers::scheduling::adhoc_from_chat),
        )
        // Calls
        .route("/v1/calls", post(handlers::calls::initiate_call))
        .route("/v1/calls/:id/ringing", post(handlers::calls::call_ringing))
        .route("/v1/calls/:id/answer", post(handlers::calls::answer_call))
        .route("/v1/calls/:id/hangup", post(handlers::calls::hangup_call))
        // Per-user listings
        .route("/v1/users/:user_id/calls", get(handlers::calls::call_history))
        .route(
            "/v1/users/:user_id/upcoming",
            get(handlers::scheduling::upcoming_for_user),
        )
        // Reminders (external scheduler)
        .route(
            "/v1/reminders/pending",
            get(handlers::scheduling::pending_reminders),
        )
        .route(
            "/v1/reminders/:id/sent",
            post(handlers::scheduling::mark_reminder_sent),
        )
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    routes
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

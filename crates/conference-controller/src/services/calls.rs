//! Call orchestrator.
//!
//! Owns the one-to-one call state machine:
//! `initiated -> ringing -> answered -> ended`, with
//! `initiated`/`ringing -> ended` as the cancel/reject short-circuit.
//! Exclusivity (one live call per user, either side) is enforced by the
//! store; the initiated event is how the callee's client learns of the
//! call - delivery is the message bus's job.

use crate::errors::ConfError;
use crate::models::{CallRow, InitiateCallRequest};
use crate::observability::metrics;
use crate::repositories::{calls::DEFAULT_HISTORY_PAGE_SIZE, CallsRepository};
use crate::services::bridge_client::MediaBridge;
use crate::services::event_publisher::{publish_best_effort, EventPublisher};
use chrono::Utc;
use common::events::CallEvent;
use common::types::{CallEndReason, CallId, CallStatus};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Call orchestrator.
pub struct CallService {
    pool: PgPool,
    bridge: Arc<dyn MediaBridge>,
    events: Arc<dyn EventPublisher>,
}

impl CallService {
    /// Create a new call orchestrator.
    pub fn new(pool: PgPool, bridge: Arc<dyn MediaBridge>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            pool,
            bridge,
            events,
        }
    }

    /// Initiate a call. Rejected with `Conflict` when either party already
    /// has a live call.
    #[instrument(
        skip_all,
        name = "conf.service.initiate_call",
        fields(caller_id = %request.caller_id, callee_id = %request.callee_id)
    )]
    pub async fn initiate(&self, request: &InitiateCallRequest) -> Result<CallRow, ConfError> {
        if request.caller_id == request.callee_id {
            return Err(ConfError::BadRequest(
                "Cannot call yourself".to_string(),
            ));
        }

        let call = CallsRepository::create_exclusive(
            &self.pool,
            request.caller_id,
            request.callee_id,
            request.chat_id,
        )
        .await?
        .ok_or_else(|| {
            ConfError::Conflict("One of the parties is already on a call".to_string())
        })?;

        metrics::adjust_active_calls(1);

        info!(
            target: "conf.services.calls",
            call_id = %call.call_id,
            "Call initiated"
        );

        publish_best_effort(
            self.events.as_ref(),
            CallEvent::Initiated {
                call_id: CallId(call.call_id),
                caller_id: call.caller_id,
                callee_id: call.callee_id,
                chat_id: call.chat_id,
            }
            .into(),
        )
        .await;

        Ok(call)
    }

    /// Record that the callee's client is ringing.
    #[instrument(skip_all, name = "conf.service.ringing", fields(call_id = %call_id))]
    pub async fn ringing(&self, call_id: Uuid, user_id: Uuid) -> Result<CallRow, ConfError> {
        let call = self.require_call(call_id).await?;
        if call.callee_id != user_id {
            return Err(ConfError::PermissionDenied(
                "Only the callee's client reports ringing".to_string(),
            ));
        }

        CallsRepository::mark_ringing(&self.pool, call_id)
            .await?
            .ok_or_else(|| ConfError::InvalidState("Call is not awaiting the callee".to_string()))
    }

    /// Answer a call. Only the callee may, and only from
    /// `initiated`/`ringing`.
    #[instrument(skip_all, name = "conf.service.answer", fields(call_id = %call_id, user_id = %user_id))]
    pub async fn answer(&self, call_id: Uuid, user_id: Uuid) -> Result<CallRow, ConfError> {
        let call = self.require_call(call_id).await?;
        if call.callee_id != user_id {
            return Err(ConfError::PermissionDenied(
                "Only the callee may answer".to_string(),
            ));
        }

        let answered = CallsRepository::mark_answered(&self.pool, call_id)
            .await?
            .ok_or_else(|| ConfError::InvalidState("Call cannot be answered".to_string()))?;

        publish_best_effort(
            self.events.as_ref(),
            CallEvent::Answered {
                call_id: CallId(call_id),
                caller_id: answered.caller_id,
                callee_id: answered.callee_id,
            }
            .into(),
        )
        .await;

        Ok(answered)
    }

    /// Hang up a call. Either party may; the end reason is derived from
    /// who hung up and whether the call had been answered.
    #[instrument(skip_all, name = "conf.service.hangup", fields(call_id = %call_id, user_id = %user_id))]
    pub async fn hangup(&self, call_id: Uuid, user_id: Uuid) -> Result<CallRow, ConfError> {
        let call = self.require_call(call_id).await?;
        if call.caller_id != user_id && call.callee_id != user_id {
            return Err(ConfError::PermissionDenied(
                "Not a party to this call".to_string(),
            ));
        }

        let status = call
            .call_status()
            .ok_or(ConfError::Internal)?;
        if status == CallStatus::Ended {
            return Err(ConfError::InvalidState("Call already ended".to_string()));
        }

        let reason = derive_end_reason(status, user_id == call.callee_id);
        let duration_seconds = call
            .answered_at
            .map_or(0, |answered| {
                (Utc::now() - answered).num_seconds().max(0)
            });

        if let Some(call_handle) = &call.call_handle {
            if let Err(e) = self.bridge.hangup(call_handle, reason.as_str()).await {
                warn!(
                    target: "conf.services.calls",
                    call_id = %call_id,
                    error = %e,
                    "Bridge hangup failed, store state stands"
                );
            }
        }

        let ended = CallsRepository::mark_ended(
            &self.pool,
            call_id,
            i32::try_from(duration_seconds).unwrap_or(i32::MAX),
            reason.as_str(),
        )
        .await?
        .ok_or_else(|| ConfError::InvalidState("Call already ended".to_string()))?;

        metrics::adjust_active_calls(-1);

        info!(
            target: "conf.services.calls",
            call_id = %call_id,
            reason = reason.as_str(),
            duration_seconds = duration_seconds,
            "Call ended"
        );

        publish_best_effort(
            self.events.as_ref(),
            CallEvent::Ended {
                call_id: CallId(call_id),
                caller_id: ended.caller_id,
                callee_id: ended.callee_id,
                reason,
                duration_seconds,
            }
            .into(),
        )
        .await;

        Ok(ended)
    }

    /// Paginated call history for a user, newest first.
    #[instrument(skip_all, name = "conf.service.call_history", fields(user_id = %user_id, page = page))]
    pub async fn history(&self, user_id: Uuid, page: i64) -> Result<Vec<CallRow>, ConfError> {
        CallsRepository::list_history(&self.pool, user_id, page.max(0), DEFAULT_HISTORY_PAGE_SIZE)
            .await
    }

    async fn require_call(&self, call_id: Uuid) -> Result<CallRow, ConfError> {
        CallsRepository::get(&self.pool, call_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Call not found".to_string()))
    }
}

/// Derive why a call ended from its status and which party hung up.
///
/// - Answered calls always end with `user_hangup`.
/// - Before answer, the callee hanging up is a rejection and the caller
///   hanging up is a cancellation.
#[must_use]
pub fn derive_end_reason(status: CallStatus, hung_up_by_callee: bool) -> CallEndReason {
    match status {
        CallStatus::Answered | CallStatus::Ended => CallEndReason::UserHangup,
        CallStatus::Initiated | CallStatus::Ringing => {
            if hung_up_by_callee {
                CallEndReason::Rejected
            } else {
                CallEndReason::Cancelled
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_end_reason_matrix() {
        // (status, hung up by callee, expected)
        let table = [
            (CallStatus::Initiated, true, CallEndReason::Rejected),
            (CallStatus::Initiated, false, CallEndReason::Cancelled),
            (CallStatus::Ringing, true, CallEndReason::Rejected),
            (CallStatus::Ringing, false, CallEndReason::Cancelled),
            (CallStatus::Answered, true, CallEndReason::UserHangup),
            (CallStatus::Answered, false, CallEndReason::UserHangup),
        ];

        for (status, by_callee, expected) in table {
            assert_eq!(
                derive_end_reason(status, by_callee),
                expected,
                "status={status:?} by_callee={by_callee}"
            );
        }
    }
}

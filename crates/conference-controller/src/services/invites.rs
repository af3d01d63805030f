//! Invitation fan-out.
//!
//! Rings a set of users into a conference via the media bridge,
//! concurrently and detached from the request that triggered it. One
//! user's unreachable device must not delay or fail invites to the
//! others; completion of the whole fan-out is only used for logging.

use crate::repositories::ContactsRepository;
use crate::services::bridge_client::MediaBridge;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Detached invitation fan-out.
///
/// Holds the process-shutdown cancellation scope so in-flight invites are
/// cut off deterministically on shutdown, and so tests can await or cancel
/// the spawned task via the returned handle.
pub struct InviteFanout {
    pool: PgPool,
    bridge: Arc<dyn MediaBridge>,
    cancel_token: CancellationToken,
}

impl InviteFanout {
    /// Create a new fan-out bound to a cancellation scope.
    pub fn new(pool: PgPool, bridge: Arc<dyn MediaBridge>, cancel_token: CancellationToken) -> Self {
        Self {
            pool,
            bridge,
            cancel_token,
        }
    }

    /// Spawn the fan-out as a detached background task.
    ///
    /// Returns the task handle; the caller is free to drop it (the task
    /// keeps running) or await it in tests.
    pub fn spawn(
        &self,
        conference_id: Uuid,
        room_name: String,
        user_ids: Vec<Uuid>,
    ) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let bridge = self.bridge.clone();
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            run_fanout(pool, bridge, cancel_token, conference_id, room_name, user_ids).await;
        })
    }
}

#[instrument(
    skip_all,
    name = "conf.service.invite_fanout",
    fields(conference_id = %conference_id, invited = user_ids.len())
)]
async fn run_fanout(
    pool: PgPool,
    bridge: Arc<dyn MediaBridge>,
    cancel_token: CancellationToken,
    conference_id: Uuid,
    room_name: String,
    user_ids: Vec<Uuid>,
) {
    if user_ids.is_empty() {
        return;
    }

    let contacts = match ContactsRepository::get_bridge_contacts(&pool, &user_ids).await {
        Ok(contacts) => contacts,
        Err(e) => {
            warn!(
                target: "conf.services.invites",
                conference_id = %conference_id,
                error = %e,
                "Could not resolve bridge contacts, skipping fan-out"
            );
            return;
        }
    };

    let skipped = user_ids.len() - contacts.len();
    if skipped > 0 {
        // No registered bridge address: skipped, not retried.
        warn!(
            target: "conf.services.invites",
            conference_id = %conference_id,
            skipped = skipped,
            "Users without a bridge contact were not invited"
        );
    }

    let mut invites = JoinSet::new();
    for contact in contacts {
        let bridge = bridge.clone();
        let room_name = room_name.clone();
        let cancel_token = cancel_token.clone();

        invites.spawn(async move {
            let label = contact
                .display_name
                .unwrap_or_else(|| contact.user_id.to_string());
            tokio::select! {
                () = cancel_token.cancelled() => false,
                result = bridge.invite_user(
                    &room_name,
                    &contact.bridge_address,
                    &contact.bridge_domain,
                    &label,
                ) => match result {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(
                            target: "conf.services.invites",
                            user_id = %contact.user_id,
                            error = %e,
                            "Invite delivery failed"
                        );
                        false
                    }
                },
            }
        });
    }

    // Wait-for-all is for this log line only; nothing downstream gates on it.
    let mut delivered = 0usize;
    let mut attempted = 0usize;
    while let Some(result) = invites.join_next().await {
        attempted += 1;
        if matches!(result, Ok(true)) {
            delivered += 1;
        }
    }

    info!(
        target: "conf.services.invites",
        conference_id = %conference_id,
        attempted = attempted,
        delivered = delivered,
        skipped = skipped,
        "Invitation fan-out complete"
    );
}

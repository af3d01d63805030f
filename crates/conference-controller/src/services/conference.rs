//! Conference orchestrator.
//!
//! Owns the conference and participant state machines, role authorization,
//! and capacity enforcement. Within every operation the order is fixed:
//! authorize, mutate the store, then best-effort bridge command, event
//! publication, and chat notice. Bridge/event/notice failures never roll
//! back the store mutation - the store is the source of truth.

use crate::errors::ConfError;
use crate::models::{
    ConferenceResponse, ConferenceRow, CreateConferenceRequest, JoinConferenceRequest,
    KickParticipantRequest, ModeratorActionRow, MuteParticipantRequest, ParticipantRow,
    RemoveParticipantRequest, UpdateRoleRequest,
};
use crate::observability::metrics;
use crate::repositories::{
    ConferencesRepository, EndedConference, ModeratorActionsRepository, NewParticipant,
    ParticipantsRepository, RemindersRepository,
};
use crate::services::authorization::{authorize, ModAction};
use crate::services::bridge_client::MediaBridge;
use crate::services::chat_client::{notify_best_effort, ChatClient};
use crate::services::event_publisher::{publish_best_effort, EventPublisher};
use crate::services::{adhoc_room_name, private_room_name, REMINDER_LEAD_MINUTES};
use chrono::Duration as ChronoDuration;
use common::events::{ConferenceEvent, LeaveReason};
use common::types::{ConferenceId, ParticipantId, ParticipantRole};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Bridge room profile used for multi-party conferences.
const CONFERENCE_ROOM_PROFILE: &str = "conference";

/// Conference orchestrator.
pub struct ConferenceService {
    pool: PgPool,
    bridge: Arc<dyn MediaBridge>,
    events: Arc<dyn EventPublisher>,
    chat: Arc<dyn ChatClient>,
}

impl ConferenceService {
    /// Create a new conference orchestrator.
    pub fn new(
        pool: PgPool,
        bridge: Arc<dyn MediaBridge>,
        events: Arc<dyn EventPublisher>,
        chat: Arc<dyn ChatClient>,
    ) -> Self {
        Self {
            pool,
            bridge,
            events,
            chat,
        }
    }

    /// Create an ad-hoc conference, live immediately, with the creator
    /// joined as originator.
    #[instrument(skip_all, name = "conf.service.create", fields(creator_id = %request.creator_id))]
    pub async fn create(
        &self,
        request: &CreateConferenceRequest,
    ) -> Result<ConferenceRow, ConfError> {
        request
            .validate()
            .map_err(|e| ConfError::BadRequest(e.to_string()))?;

        let room_name = if request.is_private {
            private_room_name()
        } else {
            adhoc_room_name()?
        };

        // The bridge may create rooms lazily on first join; pre-creation
        // failure is soft.
        if let Err(e) = self
            .bridge
            .create_room(&room_name, CONFERENCE_ROOM_PROFILE)
            .await
        {
            warn!(
                target: "conf.services.conference",
                room_name = %room_name,
                error = %e,
                "Bridge room pre-creation failed, proceeding"
            );
        }

        let max_members = request
            .max_members
            .unwrap_or(crate::config::DEFAULT_ADHOC_MAX_MEMBERS);
        let recording_path = request
            .recording
            .then(|| format!("recordings/{room_name}.mkv"));

        let conference = ConferencesRepository::create_active(
            &self.pool,
            request.name.trim(),
            request.chat_id,
            &room_name,
            request.creator_id,
            max_members,
            request.is_private,
            "adhoc",
            recording_path.as_deref(),
        )
        .await?;

        ParticipantsRepository::add_or_get_active(
            &self.pool,
            conference.conference_id,
            request.creator_id,
            &["active"],
            &NewParticipant {
                status: "joined",
                role: "originator",
                rsvp_status: "accepted",
                is_muted: false,
                display_name: None,
            },
        )
        .await?;

        metrics::adjust_active_conferences(1);
        metrics::adjust_active_participants(1);

        info!(
            target: "conf.services.conference",
            conference_id = %conference.conference_id,
            room_name = %room_name,
            "Conference created"
        );

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::Created {
                conference_id: ConferenceId(conference.conference_id),
                chat_id: conference.chat_id,
                creator_id: request.creator_id,
                display_name: conference.display_name.clone(),
            }
            .into(),
        )
        .await;

        notify_best_effort(
            self.chat.as_ref(),
            conference.chat_id,
            &format!("Conference \"{}\" started", conference.display_name),
        )
        .await;

        Ok(conference)
    }

    /// Fetch a conference with its participant count.
    ///
    /// For active conferences the bridge's live member list overrides the
    /// persisted approximation when the bridge is reachable; otherwise the
    /// last known store count is returned.
    #[instrument(skip_all, name = "conf.service.get", fields(conference_id = %conference_id))]
    pub async fn get(&self, conference_id: Uuid) -> Result<ConferenceResponse, ConfError> {
        let conference = ConferencesRepository::get(&self.pool, conference_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        self.with_live_count(conference).await
    }

    /// Fetch a conference by its external room name.
    #[instrument(skip_all, name = "conf.service.get_by_room_name", fields(room_name = %room_name))]
    pub async fn get_by_room_name(
        &self,
        room_name: &str,
    ) -> Result<ConferenceResponse, ConfError> {
        let conference = ConferencesRepository::get_by_room_name(&self.pool, room_name)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        self.with_live_count(conference).await
    }

    async fn with_live_count(
        &self,
        conference: ConferenceRow,
    ) -> Result<ConferenceResponse, ConfError> {
        let store_count =
            ParticipantsRepository::count_active(&self.pool, conference.conference_id).await?;

        let participant_count = if conference.status == "active" && self.bridge.is_reachable().await
        {
            match self.bridge.list_members(&conference.room_name).await {
                Ok(members) => members.len() as i64,
                Err(e) => {
                    // Bridge degradation is not an error; fall back.
                    warn!(
                        target: "conf.services.conference",
                        conference_id = %conference.conference_id,
                        error = %e,
                        "Bridge member list unavailable, using store count"
                    );
                    store_count
                }
            }
        } else {
            store_count
        };

        Ok(ConferenceResponse {
            conference,
            participant_count,
        })
    }

    /// List active non-private conferences, optionally for one chat.
    #[instrument(skip_all, name = "conf.service.list_active")]
    pub async fn list_active(
        &self,
        chat_id: Option<Uuid>,
    ) -> Result<Vec<ConferenceRow>, ConfError> {
        ConferencesRepository::list_active(&self.pool, chat_id).await
    }

    /// Join a conference. Idempotent: a second join while the first row is
    /// still active returns that row unchanged, with no duplicate side
    /// effects.
    #[instrument(
        skip_all,
        name = "conf.service.join",
        fields(conference_id = %conference_id, user_id = %request.user_id)
    )]
    pub async fn join(
        &self,
        conference_id: Uuid,
        request: &JoinConferenceRequest,
    ) -> Result<ParticipantRow, ConfError> {
        let conference = ConferencesRepository::get(&self.pool, conference_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        let outcome = ParticipantsRepository::add_or_get_active(
            &self.pool,
            conference_id,
            request.user_id,
            &["active"],
            &NewParticipant {
                status: "connecting",
                role: "participant",
                rsvp_status: "accepted",
                is_muted: request.muted,
                display_name: request.display_name.clone(),
            },
        )
        .await?;

        if !outcome.is_created() {
            return Ok(outcome.row().clone());
        }
        let participant = outcome.row().clone();

        metrics::adjust_active_participants(1);

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::ParticipantJoined {
                conference_id: ConferenceId(conference_id),
                chat_id: conference.chat_id,
                participant_id: ParticipantId(participant.participant_id),
                user_id: request.user_id,
            }
            .into(),
        )
        .await;

        let joined_name = request
            .display_name
            .clone()
            .unwrap_or_else(|| request.user_id.to_string());
        notify_best_effort(
            self.chat.as_ref(),
            conference.chat_id,
            &format!("{joined_name} joined the event"),
        )
        .await;

        Ok(participant)
    }

    /// Record the bridge-confirmed presence of a connecting participant.
    #[instrument(
        skip_all,
        name = "conf.service.mark_connected",
        fields(conference_id = %conference_id, user_id = %user_id)
    )]
    pub async fn mark_connected(
        &self,
        conference_id: Uuid,
        user_id: Uuid,
        member_handle: &str,
        channel_handle: Option<&str>,
    ) -> Result<ParticipantRow, ConfError> {
        ParticipantsRepository::mark_joined(
            &self.pool,
            conference_id,
            user_id,
            member_handle,
            channel_handle,
        )
        .await?
        .ok_or_else(|| ConfError::NotFound("No active participation".to_string()))
    }

    /// Leave a conference. Ends the conference when the last active
    /// participant leaves.
    #[instrument(
        skip_all,
        name = "conf.service.leave",
        fields(conference_id = %conference_id, user_id = %user_id)
    )]
    pub async fn leave(&self, conference_id: Uuid, user_id: Uuid) -> Result<(), ConfError> {
        let conference = ConferencesRepository::get(&self.pool, conference_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        let participant = ParticipantsRepository::mark_left(&self.pool, conference_id, user_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("No active participation".to_string()))?;

        if let Some(member_handle) = &participant.member_handle {
            if let Err(e) = self.bridge.kick(&conference.room_name, member_handle).await {
                warn!(
                    target: "conf.services.conference",
                    conference_id = %conference_id,
                    error = %e,
                    "Bridge kick on leave failed"
                );
            }
        }

        metrics::adjust_active_participants(-1);

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::ParticipantLeft {
                conference_id: ConferenceId(conference_id),
                chat_id: conference.chat_id,
                user_id,
                reason: LeaveReason::Left,
            }
            .into(),
        )
        .await;

        let remaining =
            ParticipantsRepository::count_active(&self.pool, conference_id).await?;
        if remaining == 0 {
            self.end_internal(&conference).await?;
        } else {
            let left_name = participant
                .display_name
                .unwrap_or_else(|| user_id.to_string());
            notify_best_effort(
                self.chat.as_ref(),
                conference.chat_id,
                &format!("{left_name} left the event"),
            )
            .await;
        }

        Ok(())
    }

    /// Mute or unmute a participant. Self-mute is always allowed; muting
    /// someone else requires moderation rights.
    #[instrument(
        skip_all,
        name = "conf.service.mute",
        fields(conference_id = %conference_id, target = %request.target_user_id, muted = request.muted)
    )]
    pub async fn mute(
        &self,
        conference_id: Uuid,
        request: &MuteParticipantRequest,
    ) -> Result<ParticipantRow, ConfError> {
        let conference = ConferencesRepository::get(&self.pool, conference_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        let target = self
            .require_active(conference_id, request.target_user_id)
            .await?;

        if request.actor_id != request.target_user_id {
            let actor_role = self.require_role(conference_id, request.actor_id).await?;
            let target_role = parse_role(&target)?;
            authorize(actor_role, target_role, ModAction::Mute)?;
        }

        let updated = ParticipantsRepository::update_mute(
            &self.pool,
            conference_id,
            request.target_user_id,
            request.muted,
        )
        .await?
        .ok_or_else(|| ConfError::NotFound("No active participation".to_string()))?;

        if let Some(member_handle) = &updated.member_handle {
            if let Err(e) = self
                .bridge
                .mute(&conference.room_name, member_handle, request.muted)
                .await
            {
                warn!(
                    target: "conf.services.conference",
                    conference_id = %conference_id,
                    error = %e,
                    "Bridge mute failed, store state stands"
                );
            }
        }

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::ParticipantMuted {
                conference_id: ConferenceId(conference_id),
                chat_id: conference.chat_id,
                user_id: request.target_user_id,
                muted: request.muted,
            }
            .into(),
        )
        .await;

        Ok(updated)
    }

    /// Kick a participant out of a live conference.
    #[instrument(
        skip_all,
        name = "conf.service.kick",
        fields(conference_id = %conference_id, target = %request.target_user_id)
    )]
    pub async fn kick(
        &self,
        conference_id: Uuid,
        request: &KickParticipantRequest,
    ) -> Result<(), ConfError> {
        let conference = ConferencesRepository::get(&self.pool, conference_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        let target = self
            .require_active(conference_id, request.target_user_id)
            .await?;
        let actor_role = self.require_role(conference_id, request.actor_id).await?;
        let target_role = parse_role(&target)?;
        authorize(actor_role, target_role, ModAction::Kick)?;

        ParticipantsRepository::mark_kicked(&self.pool, conference_id, request.target_user_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("No active participation".to_string()))?;

        if let Some(member_handle) = &target.member_handle {
            if let Err(e) = self.bridge.kick(&conference.room_name, member_handle).await {
                warn!(
                    target: "conf.services.conference",
                    conference_id = %conference_id,
                    error = %e,
                    "Bridge kick failed, store state stands"
                );
            }
        }

        self.audit(
            conference_id,
            request.actor_id,
            request.target_user_id,
            ModAction::Kick,
            serde_json::json!({
                "actor_role": actor_role.as_str(),
                "target_role": target_role.as_str(),
            }),
        )
        .await;

        metrics::adjust_active_participants(-1);

        // Kick is modeled as left-with-reason for downstream consumers.
        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::ParticipantLeft {
                conference_id: ConferenceId(conference_id),
                chat_id: conference.chat_id,
                user_id: request.target_user_id,
                reason: LeaveReason::Kicked,
            }
            .into(),
        )
        .await;

        Ok(())
    }

    /// Explicitly end a conference. Only the creator may.
    #[instrument(
        skip_all,
        name = "conf.service.end",
        fields(conference_id = %conference_id, actor_id = %actor_id)
    )]
    pub async fn end(&self, conference_id: Uuid, actor_id: Uuid) -> Result<(), ConfError> {
        let conference = ConferencesRepository::get(&self.pool, conference_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        if conference.created_by_user_id != actor_id {
            return Err(ConfError::PermissionDenied(
                "Only the creator may end the conference".to_string(),
            ));
        }

        self.end_internal(&conference).await
    }

    /// Shared end routine used by explicit end and auto-end.
    async fn end_internal(&self, conference: &ConferenceRow) -> Result<(), ConfError> {
        // Best-effort: clear the live room before the store transition.
        match self.bridge.list_members(&conference.room_name).await {
            Ok(members) => {
                for member in members {
                    if let Err(e) = self
                        .bridge
                        .kick(&conference.room_name, &member.handle)
                        .await
                    {
                        warn!(
                            target: "conf.services.conference",
                            conference_id = %conference.conference_id,
                            member = %member.handle,
                            error = %e,
                            "Bridge kick during end failed"
                        );
                    }
                }
            }
            Err(e) => {
                warn!(
                    target: "conf.services.conference",
                    conference_id = %conference.conference_id,
                    error = %e,
                    "Bridge member list during end failed"
                );
            }
        }

        let Some(ended) =
            ConferencesRepository::end_conference(&self.pool, conference.conference_id).await?
        else {
            // Concurrent end already won; nothing left to do.
            return Ok(());
        };

        metrics::adjust_active_conferences(-1);
        metrics::adjust_active_participants(-ended.released);

        let duration_seconds = duration_seconds(&ended);

        info!(
            target: "conf.services.conference",
            conference_id = %conference.conference_id,
            released = ended.released,
            duration_seconds = duration_seconds,
            "Conference ended"
        );

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::Ended {
                conference_id: ConferenceId(conference.conference_id),
                chat_id: conference.chat_id,
                duration_seconds,
            }
            .into(),
        )
        .await;

        let notice = match duration_seconds {
            Some(seconds) => format!(
                "Conference \"{}\" ended after {} min",
                conference.display_name,
                (seconds + 59) / 60
            ),
            None => format!("Conference \"{}\" ended", conference.display_name),
        };
        notify_best_effort(self.chat.as_ref(), conference.chat_id, &notice).await;

        Ok(())
    }

    /// Add users to a conference roster. Duplicate adds are skipped, not
    /// errors, so bulk operations stay idempotent.
    #[instrument(
        skip_all,
        name = "conf.service.add_participants",
        fields(conference_id = %conference_id, actor_id = %actor_id, count = user_ids.len())
    )]
    pub async fn add_participants(
        &self,
        conference_id: Uuid,
        actor_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<Vec<ParticipantRow>, ConfError> {
        let conference = ConferencesRepository::get(&self.pool, conference_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        let actor_role = self.require_role(conference_id, actor_id).await?;
        authorize(actor_role, ParticipantRole::Participant, ModAction::Add)?;

        let mut added = Vec::new();
        for user_id in user_ids {
            let outcome = ParticipantsRepository::add_or_get_active(
                &self.pool,
                conference_id,
                *user_id,
                &["scheduled", "active"],
                &NewParticipant {
                    status: "connecting",
                    role: "participant",
                    rsvp_status: "pending",
                    is_muted: false,
                    display_name: None,
                },
            )
            .await?;

            if outcome.is_created() {
                let row = outcome.row().clone();

                publish_best_effort(
                    self.events.as_ref(),
                    ConferenceEvent::ParticipantAdded {
                        conference_id: ConferenceId(conference_id),
                        chat_id: conference.chat_id,
                        user_id: *user_id,
                        role: ParticipantRole::Participant,
                    }
                    .into(),
                )
                .await;

                added.push(row);
            }
        }

        if let Some(scheduled_at) = conference.scheduled_at {
            let user_ids: Vec<Uuid> = added.iter().map(|p| p.user_id).collect();
            RemindersRepository::create_for_users(
                &self.pool,
                conference_id,
                &user_ids,
                scheduled_at - ChronoDuration::minutes(REMINDER_LEAD_MINUTES),
                REMINDER_LEAD_MINUTES as i32,
            )
            .await?;
        }

        Ok(added)
    }

    /// Remove a user from a conference roster. Removal is always audited.
    #[instrument(
        skip_all,
        name = "conf.service.remove_participant",
        fields(conference_id = %conference_id, target = %request.target_user_id)
    )]
    pub async fn remove_participant(
        &self,
        conference_id: Uuid,
        request: &RemoveParticipantRequest,
    ) -> Result<(), ConfError> {
        let conference = ConferencesRepository::get(&self.pool, conference_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        let target = self
            .require_active(conference_id, request.target_user_id)
            .await?;
        let actor_role = self.require_role(conference_id, request.actor_id).await?;
        let target_role = parse_role(&target)?;
        authorize(actor_role, target_role, ModAction::Remove)?;

        ParticipantsRepository::mark_left(&self.pool, conference_id, request.target_user_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("No active participation".to_string()))?;

        self.audit(
            conference_id,
            request.actor_id,
            request.target_user_id,
            ModAction::Remove,
            serde_json::json!({
                "actor_role": actor_role.as_str(),
                "target_role": target_role.as_str(),
            }),
        )
        .await;

        metrics::adjust_active_participants(-1);

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::ParticipantRemoved {
                conference_id: ConferenceId(conference_id),
                chat_id: conference.chat_id,
                user_id: request.target_user_id,
            }
            .into(),
        )
        .await;

        Ok(())
    }

    /// Change a participant's role. Role changes are not audited; removal
    /// is (see `remove_participant`).
    #[instrument(
        skip_all,
        name = "conf.service.update_role",
        fields(conference_id = %conference_id, target = %request.target_user_id, role = %request.role)
    )]
    pub async fn update_role(
        &self,
        conference_id: Uuid,
        request: &UpdateRoleRequest,
    ) -> Result<ParticipantRow, ConfError> {
        let conference = ConferencesRepository::get(&self.pool, conference_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        let new_role = ParticipantRole::parse(&request.role)
            .ok_or_else(|| ConfError::BadRequest("Unknown role".to_string()))?;

        let target = self
            .require_active(conference_id, request.target_user_id)
            .await?;
        let actor_role = self.require_role(conference_id, request.actor_id).await?;
        let target_role = parse_role(&target)?;
        authorize(actor_role, target_role, ModAction::ChangeRole(new_role))?;

        let updated = ParticipantsRepository::update_role(
            &self.pool,
            conference_id,
            request.target_user_id,
            new_role.as_str(),
        )
        .await?
        .ok_or_else(|| ConfError::NotFound("No active participation".to_string()))?;

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::ParticipantRoleChanged {
                conference_id: ConferenceId(conference_id),
                chat_id: conference.chat_id,
                user_id: request.target_user_id,
                role: new_role,
            }
            .into(),
        )
        .await;

        Ok(updated)
    }

    /// List active participants.
    #[instrument(skip_all, name = "conf.service.list_participants", fields(conference_id = %conference_id))]
    pub async fn list_participants(
        &self,
        conference_id: Uuid,
    ) -> Result<Vec<ParticipantRow>, ConfError> {
        ParticipantsRepository::list_active(&self.pool, conference_id).await
    }

    /// List the moderation audit log, newest first.
    #[instrument(skip_all, name = "conf.service.list_moderator_actions", fields(conference_id = %conference_id))]
    pub async fn list_moderator_actions(
        &self,
        conference_id: Uuid,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<ModeratorActionRow>, ConfError> {
        ModeratorActionsRepository::list(&self.pool, conference_id, page, page_size).await
    }

    async fn require_active(
        &self,
        conference_id: Uuid,
        user_id: Uuid,
    ) -> Result<ParticipantRow, ConfError> {
        ParticipantsRepository::get_active(&self.pool, conference_id, user_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("No active participation".to_string()))
    }

    async fn require_role(
        &self,
        conference_id: Uuid,
        user_id: Uuid,
    ) -> Result<ParticipantRole, ConfError> {
        let row = self.require_active(conference_id, user_id).await.map_err(|_| {
            ConfError::PermissionDenied("Actor is not in the conference".to_string())
        })?;
        parse_role(&row)
    }

    async fn audit(
        &self,
        conference_id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
        action: ModAction,
        details: serde_json::Value,
    ) {
        // Audit failures are logged, never surfaced to the caller.
        if let Err(e) = ModeratorActionsRepository::append(
            &self.pool,
            conference_id,
            actor_id,
            target_id,
            action.as_str(),
            Some(details),
        )
        .await
        {
            warn!(
                target: "conf.services.conference",
                conference_id = %conference_id,
                action = action.as_str(),
                error = %e,
                "Failed to record moderator action"
            );
        }
    }
}

fn parse_role(row: &ParticipantRow) -> Result<ParticipantRole, ConfError> {
    row.participant_role().ok_or(ConfError::Internal)
}

fn duration_seconds(ended: &EndedConference) -> Option<i64> {
    match (ended.started_at, ended.ended_at) {
        (Some(started), Some(finished)) => Some((finished - started).num_seconds().max(0)),
        _ => None,
    }
}

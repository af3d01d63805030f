//! Scheduling and reminder manager.
//!
//! Scheduled/recurring conference creation, RSVP tracking, cancellation,
//! and reminder issuance. Also owns the ad-hoc-from-chat and quick ad-hoc
//! flows, which hand invited users to the invitation fan-out without
//! blocking the creation response.

use crate::errors::ConfError;
use crate::models::{
    AdHocFromChatRequest, CancelConferenceRequest, ConferenceRow, QuickAdHocRequest,
    ReminderRow, ScheduleConferenceRequest, UpdateRsvpRequest,
};
use crate::observability::metrics;
use crate::repositories::{
    ConferencesRepository, NewParticipant, ParticipantsRepository, RemindersRepository,
    ScheduledConferenceParams,
};
use crate::services::bridge_client::MediaBridge;
use crate::services::chat_client::{notify_best_effort, ChatClient};
use crate::services::event_publisher::{publish_best_effort, EventPublisher};
use crate::services::invites::InviteFanout;
use crate::services::{adhoc_chat_room_name, adhoc_room_name, scheduled_room_name,
    REMINDER_LEAD_MINUTES};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use common::events::ConferenceEvent;
use common::types::{ConferenceId, RsvpStatus};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Bridge room profile used for multi-party conferences.
const CONFERENCE_ROOM_PROFILE: &str = "conference";

/// Scheduling and reminder manager.
pub struct SchedulingService {
    pool: PgPool,
    bridge: Arc<dyn MediaBridge>,
    events: Arc<dyn EventPublisher>,
    chat: Arc<dyn ChatClient>,
    invites: Arc<InviteFanout>,
}

impl SchedulingService {
    /// Create a new scheduling manager.
    pub fn new(
        pool: PgPool,
        bridge: Arc<dyn MediaBridge>,
        events: Arc<dyn EventPublisher>,
        chat: Arc<dyn ChatClient>,
        invites: Arc<InviteFanout>,
    ) -> Self {
        Self {
            pool,
            bridge,
            events,
            chat,
            invites,
        }
    }

    /// Schedule a future conference, optionally recurring, with its
    /// roster and reminders.
    #[instrument(skip_all, name = "conf.service.schedule", fields(creator_id = %request.creator_id))]
    pub async fn schedule(
        &self,
        request: &ScheduleConferenceRequest,
    ) -> Result<ConferenceRow, ConfError> {
        request
            .validate()
            .map_err(|e| ConfError::BadRequest(e.to_string()))?;
        if request.scheduled_at <= Utc::now() {
            return Err(ConfError::BadRequest(
                "scheduled_at must be in the future".to_string(),
            ));
        }

        let recurring = request.recurrence.is_some();
        let params = ScheduledConferenceParams {
            display_name: request.name.trim().to_string(),
            chat_id: request.chat_id,
            room_name: scheduled_room_name()?,
            created_by_user_id: request.creator_id,
            max_members: request
                .max_members
                .unwrap_or(crate::config::DEFAULT_SCHEDULED_MAX_MEMBERS),
            event_type: if recurring { "recurring" } else { "scheduled" },
            scheduled_at: request.scheduled_at,
            series_id: recurring.then(Uuid::new_v4),
            recurrence: request.recurrence.clone(),
        };

        let conference = ConferencesRepository::create_scheduled(&self.pool, &params).await?;

        ParticipantsRepository::add_or_get_active(
            &self.pool,
            conference.conference_id,
            request.creator_id,
            &["scheduled"],
            &NewParticipant {
                status: "connecting",
                role: "originator",
                rsvp_status: "accepted",
                is_muted: false,
                display_name: None,
            },
        )
        .await?;

        for user_id in &request.participant_ids {
            if *user_id == request.creator_id {
                continue;
            }
            // Duplicate ids in the request collapse to one row.
            ParticipantsRepository::add_or_get_active(
                &self.pool,
                conference.conference_id,
                *user_id,
                &["scheduled"],
                &NewParticipant {
                    status: "connecting",
                    role: "participant",
                    rsvp_status: "pending",
                    is_muted: false,
                    display_name: None,
                },
            )
            .await?;
        }

        let mut reminder_users: Vec<Uuid> = vec![request.creator_id];
        reminder_users.extend(
            request
                .participant_ids
                .iter()
                .filter(|id| **id != request.creator_id),
        );
        RemindersRepository::create_for_users(
            &self.pool,
            conference.conference_id,
            &reminder_users,
            request.scheduled_at - ChronoDuration::minutes(REMINDER_LEAD_MINUTES),
            REMINDER_LEAD_MINUTES as i32,
        )
        .await?;

        info!(
            target: "conf.services.scheduling",
            conference_id = %conference.conference_id,
            recurring = recurring,
            participants = reminder_users.len(),
            "Conference scheduled"
        );

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::Scheduled {
                conference_id: ConferenceId(conference.conference_id),
                chat_id: conference.chat_id,
                creator_id: request.creator_id,
                display_name: conference.display_name.clone(),
                scheduled_at: request.scheduled_at,
            }
            .into(),
        )
        .await;

        Ok(conference)
    }

    /// Start an ad-hoc conference from a chat, inviting the given chat
    /// members via the detached fan-out.
    #[instrument(
        skip_all,
        name = "conf.service.adhoc_from_chat",
        fields(chat_id = %chat_id, creator_id = %request.creator_id)
    )]
    pub async fn create_adhoc_from_chat(
        &self,
        chat_id: Uuid,
        request: &AdHocFromChatRequest,
    ) -> Result<ConferenceRow, ConfError> {
        let room_name = adhoc_chat_room_name()?;

        if let Err(e) = self
            .bridge
            .create_room(&room_name, CONFERENCE_ROOM_PROFILE)
            .await
        {
            warn!(
                target: "conf.services.scheduling",
                room_name = %room_name,
                error = %e,
                "Bridge room pre-creation failed, proceeding"
            );
        }

        let conference = ConferencesRepository::create_active(
            &self.pool,
            "Group call",
            Some(chat_id),
            &room_name,
            request.creator_id,
            crate::config::DEFAULT_SCHEDULED_MAX_MEMBERS,
            false,
            "adhoc_chat",
            None,
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

        // Invitees get connecting rows only; presence is never assumed,
        // they still join on their own when they pick up.
        let mut invited = Vec::new();
        for user_id in &request.participant_ids {
            if *user_id == request.creator_id {
                continue;
            }
            let outcome = ParticipantsRepository::add_or_get_active(
                &self.pool,
                conference.conference_id,
                *user_id,
                &["active"],
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
                invited.push(*user_id);
            }
        }

        metrics::adjust_active_conferences(1);
        metrics::adjust_active_participants(1 + invited.len() as i64);

        // Detached: the creation response never waits on invite delivery.
        let _fanout = self.invites.spawn(
            conference.conference_id,
            conference.room_name.clone(),
            invited,
        );

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::Created {
                conference_id: ConferenceId(conference.conference_id),
                chat_id: Some(chat_id),
                creator_id: request.creator_id,
                display_name: conference.display_name.clone(),
            }
            .into(),
        )
        .await;

        notify_best_effort(
            self.chat.as_ref(),
            Some(chat_id),
            "A group call started in this chat",
        )
        .await;

        Ok(conference)
    }

    /// Start a quick ad-hoc conference with no invitees.
    #[instrument(skip_all, name = "conf.service.quick_adhoc", fields(creator_id = %request.creator_id))]
    pub async fn create_quick_adhoc(
        &self,
        request: &QuickAdHocRequest,
    ) -> Result<ConferenceRow, ConfError> {
        let name = match &request.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("Quick call {}", Utc::now().format("%H:%M")),
        };
        let room_name = adhoc_room_name()?;

        if let Err(e) = self
            .bridge
            .create_room(&room_name, CONFERENCE_ROOM_PROFILE)
            .await
        {
            warn!(
                target: "conf.services.scheduling",
                room_name = %room_name,
                error = %e,
                "Bridge room pre-creation failed, proceeding"
            );
        }

        let conference = ConferencesRepository::create_active(
            &self.pool,
            &name,
            None,
            &room_name,
            request.creator_id,
            crate::config::DEFAULT_ADHOC_MAX_MEMBERS,
            false,
            "adhoc",
            None,
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

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::Created {
                conference_id: ConferenceId(conference.conference_id),
                chat_id: None,
                creator_id: request.creator_id,
                display_name: conference.display_name.clone(),
            }
            .into(),
        )
        .await;

        Ok(conference)
    }

    /// Update a participant's RSVP. Self-service: the only requirement is
    /// an existing participation.
    #[instrument(
        skip_all,
        name = "conf.service.update_rsvp",
        fields(conference_id = %conference_id, user_id = %request.user_id)
    )]
    pub async fn update_rsvp(
        &self,
        conference_id: Uuid,
        request: &UpdateRsvpRequest,
    ) -> Result<(), ConfError> {
        let status = RsvpStatus::parse(&request.status)
            .filter(|s| *s != RsvpStatus::Pending)
            .ok_or_else(|| {
                ConfError::BadRequest("RSVP status must be accepted or declined".to_string())
            })?;

        let conference = ConferencesRepository::get(&self.pool, conference_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        ParticipantsRepository::update_rsvp(
            &self.pool,
            conference_id,
            request.user_id,
            status.as_str(),
        )
        .await?
        .ok_or_else(|| ConfError::NotFound("Not a participant".to_string()))?;

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::RsvpUpdated {
                conference_id: ConferenceId(conference_id),
                chat_id: conference.chat_id,
                user_id: request.user_id,
                status,
            }
            .into(),
        )
        .await;

        Ok(())
    }

    /// Cancel a scheduled conference; optionally the rest of its series.
    /// Only the originator may cancel.
    #[instrument(
        skip_all,
        name = "conf.service.cancel",
        fields(conference_id = %conference_id, actor_id = %request.actor_id)
    )]
    pub async fn cancel(
        &self,
        conference_id: Uuid,
        request: &CancelConferenceRequest,
    ) -> Result<(), ConfError> {
        let conference = ConferencesRepository::get(&self.pool, conference_id)
            .await?
            .ok_or_else(|| ConfError::NotFound("Conference not found".to_string()))?;

        if conference.created_by_user_id != request.actor_id {
            return Err(ConfError::PermissionDenied(
                "Only the originator may cancel".to_string(),
            ));
        }

        if !ConferencesRepository::cancel(&self.pool, conference_id).await? {
            return Err(ConfError::InvalidState(
                "Only scheduled conferences can be cancelled".to_string(),
            ));
        }

        let mut series_cancelled = false;
        if request.cancel_series {
            if let Some(series_id) = conference.series_id {
                let count =
                    ConferencesRepository::cancel_series(&self.pool, series_id, conference_id)
                        .await?;
                series_cancelled = true;
                info!(
                    target: "conf.services.scheduling",
                    series_id = %series_id,
                    cancelled = count,
                    "Cancelled remaining series occurrences"
                );
            }
        }

        publish_best_effort(
            self.events.as_ref(),
            ConferenceEvent::Cancelled {
                conference_id: ConferenceId(conference_id),
                chat_id: conference.chat_id,
                series_cancelled,
            }
            .into(),
        )
        .await;

        notify_best_effort(
            self.chat.as_ref(),
            conference.chat_id,
            &format!("\"{}\" was cancelled", conference.display_name),
        )
        .await;

        Ok(())
    }

    /// Upcoming conferences a user is invited to.
    #[instrument(skip_all, name = "conf.service.upcoming_for_user", fields(user_id = %user_id))]
    pub async fn upcoming_for_user(&self, user_id: Uuid) -> Result<Vec<ConferenceRow>, ConfError> {
        ConferencesRepository::list_scheduled_for_user(&self.pool, user_id).await
    }

    /// Reminders due at or before `now`. Polled by the external scheduler.
    #[instrument(skip_all, name = "conf.service.pending_reminders")]
    pub async fn pending_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderRow>, ConfError> {
        RemindersRepository::list_pending(&self.pool, now).await
    }

    /// Mark a reminder delivered. Idempotent; marking an already-sent
    /// reminder is a no-op.
    #[instrument(skip_all, name = "conf.service.mark_reminder_sent", fields(reminder_id = %reminder_id))]
    pub async fn mark_reminder_sent(&self, reminder_id: Uuid) -> Result<(), ConfError> {
        RemindersRepository::mark_sent(&self.pool, reminder_id).await?;
        Ok(())
    }
}

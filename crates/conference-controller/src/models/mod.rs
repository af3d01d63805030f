//! Conference Controller models.
//!
//! Database row types and the request/response shapes of the HTTP surface.
//! Status, role, and event-type columns are stored as TEXT and surfaced
//! here as strings; the typed enums live in `common::types` and are parsed
//! at the service layer where decisions are made on them.

use chrono::{DateTime, Utc};
use common::types::{CallStatus, ConferenceStatus, EventType, ParticipantRole, ParticipantStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum conference display name length.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 200;

/// Minimum conference display name length.
pub const MIN_DISPLAY_NAME_LENGTH: usize = 1;

/// Maximum members a single conference may be configured for.
pub const MAX_CONFIGURABLE_MEMBERS: i32 = 500;

/// Conference database row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ConferenceRow {
    /// Unique conference identifier.
    pub conference_id: Uuid,

    /// Display name shown in listings and notices.
    pub display_name: String,

    /// Owning chat, when the conference was created from one.
    pub chat_id: Option<Uuid>,

    /// External room name used with the media bridge.
    pub room_name: String,

    /// User who created the conference.
    pub created_by_user_id: Uuid,

    /// Current lifecycle status.
    pub status: String,

    /// Maximum number of active participants.
    pub max_members: i32,

    /// Whether the room name is unguessable and unlisted.
    pub is_private: bool,

    /// How the conference came to exist.
    pub event_type: String,

    /// Scheduled start time, for scheduled/recurring conferences.
    pub scheduled_at: Option<DateTime<Utc>>,

    /// Series identifier shared by all occurrences of a recurring series.
    pub series_id: Option<Uuid>,

    /// When the conference became active.
    pub started_at: Option<DateTime<Utc>>,

    /// When the conference ended.
    pub ended_at: Option<DateTime<Utc>>,

    /// Recording location, when recording was requested.
    pub recording_path: Option<String>,

    /// Linked chat discussion thread.
    pub thread_id: Option<Uuid>,

    /// Denormalized count of accepted RSVPs.
    pub accepted_count: i32,

    /// Denormalized count of declined RSVPs.
    pub declined_count: i32,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ConferenceRow {
    /// Parsed lifecycle status.
    #[must_use]
    pub fn conference_status(&self) -> Option<ConferenceStatus> {
        ConferenceStatus::parse(&self.status)
    }

    /// Parsed event type.
    #[must_use]
    pub fn conference_event_type(&self) -> Option<EventType> {
        EventType::parse(&self.event_type)
    }
}

/// Participant database row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ParticipantRow {
    /// Unique participant row identifier.
    pub participant_id: Uuid,

    /// Conference this row belongs to.
    pub conference_id: Uuid,

    /// The member's user identifier.
    pub user_id: Uuid,

    /// Live member handle on the media bridge, once present.
    pub member_handle: Option<String>,

    /// Live channel handle on the media bridge, once present.
    pub channel_handle: Option<String>,

    /// Current membership status.
    pub status: String,

    /// Whether the member's input is muted.
    pub is_muted: bool,

    /// Whether the member's output is muted.
    pub is_deaf: bool,

    /// Live talking indicator, mirrored from the bridge.
    pub is_speaking: bool,

    /// Role within the conference.
    pub role: String,

    /// Acceptance state for scheduled conferences.
    pub rsvp_status: String,

    /// Display name at join time.
    pub display_name: Option<String>,

    /// When the member became live.
    pub joined_at: Option<DateTime<Utc>>,

    /// When the member stopped being live.
    pub left_at: Option<DateTime<Utc>>,

    /// When the member responded to the invitation.
    pub rsvp_at: Option<DateTime<Utc>>,

    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ParticipantRow {
    /// Parsed membership status.
    #[must_use]
    pub fn participant_status(&self) -> Option<ParticipantStatus> {
        ParticipantStatus::parse(&self.status)
    }

    /// Parsed role.
    #[must_use]
    pub fn participant_role(&self) -> Option<ParticipantRole> {
        ParticipantRole::parse(&self.role)
    }
}

/// Call database row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CallRow {
    /// Unique call identifier.
    pub call_id: Uuid,

    /// The initiating user.
    pub caller_id: Uuid,

    /// The receiving user.
    pub callee_id: Uuid,

    /// Chat the call was started from, if any.
    pub chat_id: Option<Uuid>,

    /// Conference the call was promoted into, if any.
    pub conference_id: Option<Uuid>,

    /// Current call status.
    pub status: String,

    /// Live call handle on the media bridge, once present.
    pub call_handle: Option<String>,

    /// Talk time in seconds, computed at hangup.
    pub duration_seconds: i32,

    /// Why the call ended.
    pub end_reason: Option<String>,

    /// When the call was initiated.
    pub started_at: DateTime<Utc>,

    /// When the callee answered.
    pub answered_at: Option<DateTime<Utc>>,

    /// When the call ended.
    pub ended_at: Option<DateTime<Utc>>,
}

impl CallRow {
    /// Parsed call status.
    #[must_use]
    pub fn call_status(&self) -> Option<CallStatus> {
        CallStatus::parse(&self.status)
    }
}

/// Recurrence rule database row, one-to-one with a recurring conference.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RecurrenceRuleRow {
    /// The series-anchor conference.
    pub conference_id: Uuid,

    /// Recurrence frequency: daily, weekly, or monthly.
    pub frequency: String,

    /// Days of the week (0 = Monday) for weekly recurrence.
    pub days_of_week: Option<Vec<i32>>,

    /// Day of the month for monthly recurrence.
    pub day_of_month: Option<i32>,

    /// Final occurrence date, when bounded by date.
    pub until_date: Option<DateTime<Utc>>,

    /// Total occurrence count, when bounded by count.
    pub occurrence_count: Option<i32>,

    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Reminder database row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReminderRow {
    /// Unique reminder identifier.
    pub reminder_id: Uuid,

    /// Conference the reminder is for.
    pub conference_id: Uuid,

    /// User to remind.
    pub user_id: Uuid,

    /// When the reminder becomes due.
    pub remind_at: DateTime<Utc>,

    /// Lead time the reminder was created with.
    pub minutes_before: i32,

    /// Whether the reminder has been delivered.
    pub sent: bool,

    /// When the reminder was delivered.
    pub sent_at: Option<DateTime<Utc>>,

    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Moderator action audit row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ModeratorActionRow {
    /// Unique action identifier.
    pub action_id: Uuid,

    /// Conference the action occurred in.
    pub conference_id: Uuid,

    /// User who performed the action.
    pub actor_user_id: Uuid,

    /// User the action was performed on.
    pub target_user_id: Uuid,

    /// Action type (kick, remove, ...).
    pub action: String,

    /// Free-form details.
    pub details: Option<serde_json::Value>,

    /// When the action occurred.
    pub created_at: DateTime<Utc>,
}

/// Bridge contact directory row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserContactRow {
    /// The user.
    pub user_id: Uuid,

    /// Address the user's client registered with the media bridge.
    pub bridge_address: String,

    /// Signaling domain of the address.
    pub bridge_domain: String,

    /// Display name to show on the invite.
    pub display_name: Option<String>,
}

// ============================================================================
// Request / response models
// ============================================================================

/// Request to create an ad-hoc conference.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConferenceRequest {
    /// Conference display name.
    pub name: String,

    /// Chat to attach the conference to.
    pub chat_id: Option<Uuid>,

    /// Creating user (injected by the authenticating gateway).
    pub creator_id: Uuid,

    /// Maximum active participants; defaulted by event type when omitted.
    pub max_members: Option<i32>,

    /// Whether the room name is unguessable and unlisted.
    #[serde(default)]
    pub is_private: bool,

    /// Whether to record the session.
    #[serde(default)]
    pub recording: bool,
}

impl CreateConferenceRequest {
    /// Validate the request.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_display_name(&self.name)?;
        validate_max_members(self.max_members)
    }
}

/// Request to join a conference.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinConferenceRequest {
    /// Joining user.
    pub user_id: Uuid,

    /// Whether to join muted.
    #[serde(default)]
    pub muted: bool,

    /// Display name to record at join time.
    pub display_name: Option<String>,
}

/// Request to mute or unmute a participant.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MuteParticipantRequest {
    /// User performing the action.
    pub actor_id: Uuid,

    /// User being muted or unmuted.
    pub target_user_id: Uuid,

    /// Desired mute state.
    pub muted: bool,
}

/// Request to kick a participant.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KickParticipantRequest {
    /// User performing the action.
    pub actor_id: Uuid,

    /// User being removed.
    pub target_user_id: Uuid,
}

/// Request naming the acting user only.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorRequest {
    /// User performing the action.
    pub actor_id: Uuid,
}

/// Request to leave a conference.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeaveConferenceRequest {
    /// Leaving user.
    pub user_id: Uuid,
}

/// Bridge presence callback payload for a connecting participant.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParticipantConnectedRequest {
    /// The bridge's member handle.
    pub member_handle: String,

    /// The bridge's channel handle, when known.
    pub channel_handle: Option<String>,
}

/// Recurrence description supplied when scheduling a recurring conference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecurrenceSpec {
    /// Recurrence frequency: daily, weekly, or monthly.
    pub frequency: String,

    /// Days of the week (0 = Monday) for weekly recurrence.
    pub days_of_week: Option<Vec<i32>>,

    /// Day of the month for monthly recurrence.
    pub day_of_month: Option<i32>,

    /// Final occurrence date.
    pub until_date: Option<DateTime<Utc>>,

    /// Total occurrence count.
    pub occurrence_count: Option<i32>,
}

impl RecurrenceSpec {
    /// Validate the recurrence description.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self.frequency.as_str() {
            "daily" | "monthly" => {}
            "weekly" => {
                let has_days = self
                    .days_of_week
                    .as_ref()
                    .is_some_and(|days| !days.is_empty());
                if !has_days {
                    return Err("Weekly recurrence requires days_of_week");
                }
            }
            _ => return Err("Frequency must be daily, weekly, or monthly"),
        }
        if let Some(days) = &self.days_of_week {
            if days.iter().any(|d| !(0..=6).contains(d)) {
                return Err("days_of_week entries must be in 0..=6");
            }
        }
        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err("day_of_month must be in 1..=31");
            }
        }
        Ok(())
    }
}

/// Request to schedule a future conference.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConferenceRequest {
    /// Conference display name.
    pub name: String,

    /// Chat to attach the conference to.
    pub chat_id: Option<Uuid>,

    /// Creating user.
    pub creator_id: Uuid,

    /// Scheduled start time.
    pub scheduled_at: DateTime<Utc>,

    /// Recurrence description; presence makes the conference recurring.
    pub recurrence: Option<RecurrenceSpec>,

    /// Users to invite, besides the creator.
    #[serde(default)]
    pub participant_ids: Vec<Uuid>,

    /// Maximum active participants.
    pub max_members: Option<i32>,
}

impl ScheduleConferenceRequest {
    /// Validate the request.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_display_name(&self.name)?;
        validate_max_members(self.max_members)?;
        if let Some(recurrence) = &self.recurrence {
            recurrence.validate()?;
        }
        Ok(())
    }
}

/// Request to start an ad-hoc conference from a chat.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdHocFromChatRequest {
    /// Creating user.
    pub creator_id: Uuid,

    /// Chat members to invite.
    #[serde(default)]
    pub participant_ids: Vec<Uuid>,
}

/// Request to start a quick ad-hoc conference.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuickAdHocRequest {
    /// Creating user.
    pub creator_id: Uuid,

    /// Conference display name; defaulted when omitted.
    pub name: Option<String>,
}

/// Request to update an RSVP.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRsvpRequest {
    /// Responding user.
    pub user_id: Uuid,

    /// New RSVP status: accepted or declined.
    pub status: String,
}

/// Request to cancel a scheduled conference.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelConferenceRequest {
    /// User performing the cancellation.
    pub actor_id: Uuid,

    /// Whether to cancel every remaining occurrence of the series.
    #[serde(default)]
    pub cancel_series: bool,
}

/// Request to add participants to a conference roster.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddParticipantsRequest {
    /// User performing the action.
    pub actor_id: Uuid,

    /// Users to add.
    pub participant_ids: Vec<Uuid>,
}

/// Request to remove a participant from a conference roster.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoveParticipantRequest {
    /// User performing the action.
    pub actor_id: Uuid,

    /// User being removed.
    pub target_user_id: Uuid,
}

/// Request to change a participant's role.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRoleRequest {
    /// User performing the action.
    pub actor_id: Uuid,

    /// User whose role changes.
    pub target_user_id: Uuid,

    /// New role.
    pub role: String,
}

/// Request to initiate a one-to-one call.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitiateCallRequest {
    /// Calling user.
    pub caller_id: Uuid,

    /// Called user.
    pub callee_id: Uuid,

    /// Chat the call is started from, if any.
    pub chat_id: Option<Uuid>,
}

/// Request naming the user acting on a call.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallActionRequest {
    /// Acting user.
    pub user_id: Uuid,
}

/// Conference response enriched with the live participant count.
#[derive(Debug, Clone, Serialize)]
pub struct ConferenceResponse {
    /// The persisted conference.
    #[serde(flatten)]
    pub conference: ConferenceRow,

    /// Active participant count. Live from the bridge when reachable,
    /// otherwise the last known store count.
    pub participant_count: i64,
}

/// Paginated call history response.
#[derive(Debug, Clone, Serialize)]
pub struct CallHistoryResponse {
    /// Calls on this page, newest first.
    pub calls: Vec<CallRow>,

    /// Page number, zero-based.
    pub page: i64,

    /// Page size used.
    pub page_size: i64,
}

fn validate_display_name(name: &str) -> Result<(), &'static str> {
    let name = name.trim();
    if name.len() < MIN_DISPLAY_NAME_LENGTH {
        return Err("Display name must not be empty");
    }
    if name.len() > MAX_DISPLAY_NAME_LENGTH {
        return Err("Display name must be at most 200 characters");
    }
    Ok(())
}

fn validate_max_members(max_members: Option<i32>) -> Result<(), &'static str> {
    if let Some(max) = max_members {
        if max < 2 {
            return Err("max_members must be at least 2");
        }
        if max > MAX_CONFIGURABLE_MEMBERS {
            return Err("max_members must be at most 500");
        }
    }
    Ok(())
}

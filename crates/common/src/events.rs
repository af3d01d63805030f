//! Domain event payloads published on the platform bus.
//!
//! One event per state transition. The message-bus consumer routes each
//! event to the real-time channels of the affected users; `chat_id` (when
//! present) selects the audience. Events are serialized as JSON with a
//! `kind` discriminator, e.g. `{"kind": "participant.joined", ...}`.

use crate::types::{
    CallEndReason, CallId, ConferenceId, ParticipantId, ParticipantRole, RsvpStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a participant stopped being live in a conference.
///
/// A kick is modeled as a left-with-reason so downstream consumers handle
/// one removal shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    /// The participant left on their own.
    Left,

    /// A moderator removed the participant.
    Kicked,

    /// The conference ended around the participant.
    ConferenceEnded,
}

/// Conference domain events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConferenceEvent {
    /// An ad-hoc conference was created and is live.
    Created {
        conference_id: ConferenceId,
        chat_id: Option<Uuid>,
        creator_id: Uuid,
        display_name: String,
    },

    /// A conference was scheduled for a future time.
    Scheduled {
        conference_id: ConferenceId,
        chat_id: Option<Uuid>,
        creator_id: Uuid,
        display_name: String,
        scheduled_at: DateTime<Utc>,
    },

    /// A user became live (or began connecting) in a conference.
    #[serde(rename = "participant.joined")]
    ParticipantJoined {
        conference_id: ConferenceId,
        chat_id: Option<Uuid>,
        participant_id: ParticipantId,
        user_id: Uuid,
    },

    /// A user stopped being live in a conference.
    #[serde(rename = "participant.left")]
    ParticipantLeft {
        conference_id: ConferenceId,
        chat_id: Option<Uuid>,
        user_id: Uuid,
        reason: LeaveReason,
    },

    /// A participant's mute state changed.
    #[serde(rename = "participant.muted")]
    ParticipantMuted {
        conference_id: ConferenceId,
        chat_id: Option<Uuid>,
        user_id: Uuid,
        muted: bool,
    },

    /// A participant was added to a scheduled conference roster.
    #[serde(rename = "participant.added")]
    ParticipantAdded {
        conference_id: ConferenceId,
        chat_id: Option<Uuid>,
        user_id: Uuid,
        role: ParticipantRole,
    },

    /// A participant was removed from a conference roster.
    #[serde(rename = "participant.removed")]
    ParticipantRemoved {
        conference_id: ConferenceId,
        chat_id: Option<Uuid>,
        user_id: Uuid,
    },

    /// A participant's role changed.
    #[serde(rename = "participant.role_changed")]
    ParticipantRoleChanged {
        conference_id: ConferenceId,
        chat_id: Option<Uuid>,
        user_id: Uuid,
        role: ParticipantRole,
    },

    /// A participant responded to a scheduled conference invitation.
    RsvpUpdated {
        conference_id: ConferenceId,
        chat_id: Option<Uuid>,
        user_id: Uuid,
        status: RsvpStatus,
    },

    /// The conference ended.
    Ended {
        conference_id: ConferenceId,
        chat_id: Option<Uuid>,
        duration_seconds: Option<i64>,
    },

    /// The conference (or its whole series) was cancelled before starting.
    Cancelled {
        conference_id: ConferenceId,
        chat_id: Option<Uuid>,
        series_cancelled: bool,
    },
}

/// One-to-one call domain events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallEvent {
    /// A call was initiated; this is how the callee's client learns of it.
    #[serde(rename = "call.initiated")]
    Initiated {
        call_id: CallId,
        caller_id: Uuid,
        callee_id: Uuid,
        chat_id: Option<Uuid>,
    },

    /// The callee answered.
    #[serde(rename = "call.answered")]
    Answered {
        call_id: CallId,
        caller_id: Uuid,
        callee_id: Uuid,
    },

    /// The call ended.
    #[serde(rename = "call.ended")]
    Ended {
        call_id: CallId,
        caller_id: Uuid,
        callee_id: Uuid,
        reason: CallEndReason,
        duration_seconds: i64,
    },
}

/// Envelope for everything the conference controller publishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainEvent {
    /// Conference lifecycle and roster events.
    Conference(ConferenceEvent),

    /// One-to-one call events.
    Call(CallEvent),
}

impl DomainEvent {
    /// The `kind` discriminator of the serialized event, for logging and
    /// metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::Conference(event) => match event {
                ConferenceEvent::Created { .. } => "created",
                ConferenceEvent::Scheduled { .. } => "scheduled",
                ConferenceEvent::ParticipantJoined { .. } => "participant.joined",
                ConferenceEvent::ParticipantLeft { .. } => "participant.left",
                ConferenceEvent::ParticipantMuted { .. } => "participant.muted",
                ConferenceEvent::ParticipantAdded { .. } => "participant.added",
                ConferenceEvent::ParticipantRemoved { .. } => "participant.removed",
                ConferenceEvent::ParticipantRoleChanged { .. } => "participant.role_changed",
                ConferenceEvent::RsvpUpdated { .. } => "rsvp_updated",
                ConferenceEvent::Ended { .. } => "ended",
                ConferenceEvent::Cancelled { .. } => "cancelled",
            },
            DomainEvent::Call(event) => match event {
                CallEvent::Initiated { .. } => "call.initiated",
                CallEvent::Answered { .. } => "call.answered",
                CallEvent::Ended { .. } => "call.ended",
            },
        }
    }
}

impl From<ConferenceEvent> for DomainEvent {
    fn from(event: ConferenceEvent) -> Self {
        DomainEvent::Conference(event)
    }
}

impl From<CallEvent> for DomainEvent {
    fn from(event: CallEvent) -> Self {
        DomainEvent::Call(event)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_matches_serialized_tag() {
        let event = DomainEvent::from(ConferenceEvent::ParticipantJoined {
            conference_id: ConferenceId::new(),
            chat_id: None,
            participant_id: ParticipantId::new(),
            user_id: Uuid::new_v4(),
        });
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], event.kind());
    }

    #[test]
    fn test_call_event_round_trip() {
        let event = DomainEvent::from(CallEvent::Ended {
            call_id: CallId::new(),
            caller_id: Uuid::new_v4(),
            callee_id: Uuid::new_v4(),
            reason: CallEndReason::Rejected,
            duration_seconds: 0,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"call.ended\""));
        assert!(json.contains("\"reason\":\"rejected\""));
        let back: DomainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), "call.ended");
    }

    #[test]
    fn test_chat_id_present_for_routing() {
        let chat_id = Uuid::new_v4();
        let event = DomainEvent::from(ConferenceEvent::Ended {
            conference_id: ConferenceId::new(),
            chat_id: Some(chat_id),
            duration_seconds: Some(42),
        });
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["chat_id"], chat_id.to_string());
    }
}

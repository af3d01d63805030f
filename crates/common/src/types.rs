//! Common data types for Conclave platform services.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a conference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConferenceId(pub Uuid);

impl ConferenceId {
    /// Create a new random conference ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConferenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a participant row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    /// Create a new random participant ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a one-to-one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    /// Create a new random call ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Conference lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConferenceStatus {
    /// Conference is scheduled but not yet active.
    Scheduled,

    /// Conference is currently in progress.
    Active,

    /// Conference has ended.
    Ended,

    /// Conference was cancelled before it started.
    Cancelled,
}

impl ConferenceStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConferenceStatus::Scheduled => "scheduled",
            ConferenceStatus::Active => "active",
            ConferenceStatus::Ended => "ended",
            ConferenceStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status from its stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(ConferenceStatus::Scheduled),
            "active" => Some(ConferenceStatus::Active),
            "ended" => Some(ConferenceStatus::Ended),
            "cancelled" => Some(ConferenceStatus::Cancelled),
            _ => None,
        }
    }
}

/// How a conference came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Started on the spot, not attached to a chat.
    Adhoc,

    /// Started on the spot from within a chat.
    AdhocChat,

    /// Scheduled for a future time.
    Scheduled,

    /// One occurrence of a recurring series.
    Recurring,
}

impl EventType {
    /// Returns the string representation of the event type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Adhoc => "adhoc",
            EventType::AdhocChat => "adhoc_chat",
            EventType::Scheduled => "scheduled",
            EventType::Recurring => "recurring",
        }
    }

    /// Parse an event type from its stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "adhoc" => Some(EventType::Adhoc),
            "adhoc_chat" => Some(EventType::AdhocChat),
            "scheduled" => Some(EventType::Scheduled),
            "recurring" => Some(EventType::Recurring),
            _ => None,
        }
    }
}

/// Participant lifecycle status within one conference occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Invited or admitted, not yet present on the media bridge.
    Connecting,

    /// Live in the conference.
    Joined,

    /// Left voluntarily (or was reclaimed by the reaper).
    Left,

    /// Removed by a moderator.
    Kicked,
}

impl ParticipantStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Connecting => "connecting",
            ParticipantStatus::Joined => "joined",
            ParticipantStatus::Left => "left",
            ParticipantStatus::Kicked => "kicked",
        }
    }

    /// Parse a status from its stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "connecting" => Some(ParticipantStatus::Connecting),
            "joined" => Some(ParticipantStatus::Joined),
            "left" => Some(ParticipantStatus::Left),
            "kicked" => Some(ParticipantStatus::Kicked),
            _ => None,
        }
    }

    /// Whether this status counts toward live membership and capacity.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ParticipantStatus::Connecting | ParticipantStatus::Joined
        )
    }
}

/// Role a participant holds within a conference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// The conference creator. Exactly one per conference, assigned at
    /// creation and never granted afterwards.
    Originator,

    /// May moderate regular participants.
    Moderator,

    /// Regular attendee.
    Participant,

    /// Attendee with speaking privileges in moderated rooms.
    Speaker,

    /// Supporting attendee (note taker, interpreter).
    Assistant,
}

impl ParticipantRole {
    /// Returns the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Originator => "originator",
            ParticipantRole::Moderator => "moderator",
            ParticipantRole::Participant => "participant",
            ParticipantRole::Speaker => "speaker",
            ParticipantRole::Assistant => "assistant",
        }
    }

    /// Parse a role from its stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "originator" => Some(ParticipantRole::Originator),
            "moderator" => Some(ParticipantRole::Moderator),
            "participant" => Some(ParticipantRole::Participant),
            "speaker" => Some(ParticipantRole::Speaker),
            "assistant" => Some(ParticipantRole::Assistant),
            _ => None,
        }
    }
}

/// A participant's acceptance state for a scheduled conference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    /// Not yet responded.
    Pending,

    /// Accepted the invitation.
    Accepted,

    /// Declined the invitation.
    Declined,
}

impl RsvpStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpStatus::Pending => "pending",
            RsvpStatus::Accepted => "accepted",
            RsvpStatus::Declined => "declined",
        }
    }

    /// Parse a status from its stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RsvpStatus::Pending),
            "accepted" => Some(RsvpStatus::Accepted),
            "declined" => Some(RsvpStatus::Declined),
            _ => None,
        }
    }
}

/// One-to-one call lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Created, callee not yet signaled.
    Initiated,

    /// Callee's client is ringing.
    Ringing,

    /// Callee answered; media is flowing.
    Answered,

    /// Terminated by either party.
    Ended,
}

impl CallStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Initiated => "initiated",
            CallStatus::Ringing => "ringing",
            CallStatus::Answered => "answered",
            CallStatus::Ended => "ended",
        }
    }

    /// Parse a status from its stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initiated" => Some(CallStatus::Initiated),
            "ringing" => Some(CallStatus::Ringing),
            "answered" => Some(CallStatus::Answered),
            "ended" => Some(CallStatus::Ended),
            _ => None,
        }
    }

    /// Whether the call still occupies its parties.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !matches!(self, CallStatus::Ended)
    }
}

/// Why a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEndReason {
    /// Hung up after being answered.
    UserHangup,

    /// Callee hung up before answering.
    Rejected,

    /// Caller hung up before the callee answered.
    Cancelled,
}

impl CallEndReason {
    /// Returns the string representation of the reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CallEndReason::UserHangup => "user_hangup",
            CallEndReason::Rejected => "rejected",
            CallEndReason::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_conference_status_round_trip() {
        for status in [
            ConferenceStatus::Scheduled,
            ConferenceStatus::Active,
            ConferenceStatus::Ended,
            ConferenceStatus::Cancelled,
        ] {
            assert_eq!(ConferenceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ConferenceStatus::parse("bogus"), None);
    }

    #[test]
    fn test_participant_status_round_trip() {
        for status in [
            ParticipantStatus::Connecting,
            ParticipantStatus::Joined,
            ParticipantStatus::Left,
            ParticipantStatus::Kicked,
        ] {
            assert_eq!(ParticipantStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_active_statuses() {
        assert!(ParticipantStatus::Connecting.is_active());
        assert!(ParticipantStatus::Joined.is_active());
        assert!(!ParticipantStatus::Left.is_active());
        assert!(!ParticipantStatus::Kicked.is_active());
    }

    #[test]
    fn test_role_round_trip() {
        for role in [
            ParticipantRole::Originator,
            ParticipantRole::Moderator,
            ParticipantRole::Participant,
            ParticipantRole::Speaker,
            ParticipantRole::Assistant,
        ] {
            assert_eq!(ParticipantRole::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_call_status_liveness() {
        assert!(CallStatus::Initiated.is_live());
        assert!(CallStatus::Ringing.is_live());
        assert!(CallStatus::Answered.is_live());
        assert!(!CallStatus::Ended.is_live());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&ParticipantStatus::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
        let json = serde_json::to_string(&CallEndReason::UserHangup).unwrap();
        assert_eq!(json, "\"user_hangup\"");
    }
}

//! Service layer for the Conference Controller.
//!
//! This module contains the orchestrators and the clients for external
//! systems.
//!
//! # Components
//!
//! - `authorization` - pure role-based authorization matrix
//! - `bridge_client` - media bridge control API client
//! - `calls` - one-to-one call orchestrator
//! - `chat_client` - chat subsystem client for system notices
//! - `conference` - conference orchestrator
//! - `event_publisher` - domain event publication to the platform bus
//! - `invites` - detached concurrent invitation fan-out
//! - `scheduling` - scheduled/recurring conferences, RSVPs, reminders

pub mod authorization;
pub mod bridge_client;
pub mod calls;
pub mod chat_client;
pub mod conference;
pub mod event_publisher;
pub mod invites;
pub mod scheduling;

pub use authorization::{authorize, ModAction};
pub use bridge_client::{BridgeError, BridgeMember, HttpMediaBridge, MediaBridge};
pub use calls::CallService;
pub use chat_client::{ChatClient, ChatError, HttpChatClient};
pub use conference::ConferenceService;
pub use event_publisher::{EventPublisher, PublishError, RedisEventPublisher};
pub use invites::InviteFanout;
pub use scheduling::SchedulingService;

// Mocks exposed for integration tests
#[allow(unused_imports)]
pub use bridge_client::mock::MockMediaBridge;
#[allow(unused_imports)]
pub use chat_client::mock::MockChatClient;
#[allow(unused_imports)]
pub use event_publisher::mock::MockEventPublisher;

use crate::errors::ConfError;
use ring::rand::{SecureRandom, SystemRandom};
use uuid::Uuid;

/// Minutes before the scheduled start that reminders fire.
pub const REMINDER_LEAD_MINUTES: i64 = 15;

/// Generate the 8-hex-character room name suffix with a CSPRNG.
fn room_suffix() -> Result<String, ConfError> {
    let mut bytes = [0u8; 4];
    SystemRandom::new().fill(&mut bytes).map_err(|_| {
        // Entropy exhaustion is not actionable by the caller.
        ConfError::Internal
    })?;
    Ok(hex::encode(bytes))
}

/// External room name for an ad-hoc conference: `conf_<8hex>`.
pub fn adhoc_room_name() -> Result<String, ConfError> {
    Ok(format!("conf_{}", room_suffix()?))
}

/// External room name for a private conference: `private_<uuid>`.
///
/// Unguessable; private rooms are never listed.
#[must_use]
pub fn private_room_name() -> String {
    format!("private_{}", Uuid::new_v4())
}

/// External room name for a scheduled conference: `scheduled_<8hex>`.
pub fn scheduled_room_name() -> Result<String, ConfError> {
    Ok(format!("scheduled_{}", room_suffix()?))
}

/// External room name for a chat-attached ad-hoc conference:
/// `adhoc_chat_<8hex>`.
pub fn adhoc_chat_room_name() -> Result<String, ConfError> {
    Ok(format!("adhoc_chat_{}", room_suffix()?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_room_name_shapes() {
        let adhoc = adhoc_room_name().unwrap();
        assert!(adhoc.starts_with("conf_"));
        assert_eq!(adhoc.len(), "conf_".len() + 8);

        let scheduled = scheduled_room_name().unwrap();
        assert!(scheduled.starts_with("scheduled_"));
        assert_eq!(scheduled.len(), "scheduled_".len() + 8);

        let chat = adhoc_chat_room_name().unwrap();
        assert!(chat.starts_with("adhoc_chat_"));

        let private = private_room_name();
        assert!(private.starts_with("private_"));
        assert!(Uuid::parse_str(private.trim_start_matches("private_")).is_ok());
    }

    #[test]
    fn test_room_suffix_is_lower_hex() {
        let suffix = room_suffix().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}

//! Media bridge client.
//!
//! Thin capability wrapper over the external media server's REST control
//! API. The bridge owns live presence and actually mixes media; every call
//! here is best-effort and independently fallible. Orchestrators log
//! failures and continue - the persistent store, not the bridge, is the
//! source of truth.
//!
//! # Security
//!
//! - Timeouts prevent hanging connections
//! - Error messages are generic to prevent information leakage

use crate::observability::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{instrument, warn};

/// Default timeout for bridge calls in seconds.
const BRIDGE_TIMEOUT_SECS: u64 = 5;

/// Default connect timeout in seconds.
const BRIDGE_CONNECT_TIMEOUT_SECS: u64 = 2;

/// Media bridge error type.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Bridge unreachable or timed out.
    #[error("Bridge unavailable: {0}")]
    Unavailable(String),

    /// Bridge reached but rejected the command.
    #[error("Bridge rejected command: {0}")]
    Rejected(String),
}

/// A live member as reported by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeMember {
    /// The bridge's handle for the member, used in mute/kick commands.
    pub handle: String,

    /// The signaling address the member connected from.
    pub address: String,

    /// Whether the bridge has the member muted.
    pub muted: bool,

    /// Live talking indicator.
    pub speaking: bool,
}

/// Media bridge capability interface.
///
/// Implemented by [`HttpMediaBridge`] in production and by the recording
/// mock in tests, so orchestrators are testable without a real bridge.
#[async_trait]
pub trait MediaBridge: Send + Sync {
    /// Whether the bridge currently answers its health probe.
    async fn is_reachable(&self) -> bool;

    /// Create a room. The bridge may also create rooms lazily on first
    /// join, so failures here are soft.
    async fn create_room(&self, name: &str, profile: &str) -> Result<(), BridgeError>;

    /// List live members of a room. The only live-presence source of truth
    /// during an active session.
    async fn list_members(&self, name: &str) -> Result<Vec<BridgeMember>, BridgeError>;

    /// Mute or unmute a member.
    async fn mute(&self, name: &str, member_handle: &str, muted: bool) -> Result<(), BridgeError>;

    /// Kick a member out of a room.
    async fn kick(&self, name: &str, member_handle: &str) -> Result<(), BridgeError>;

    /// Hang up a one-to-one call leg.
    async fn hangup(&self, call_handle: &str, reason: &str) -> Result<(), BridgeError>;

    /// Ring a user's registered address with an invitation into a room.
    async fn invite_user(
        &self,
        room_name: &str,
        address: &str,
        domain: &str,
        display_label: &str,
    ) -> Result<(), BridgeError>;
}

#[derive(Serialize)]
struct CreateRoomBody<'a> {
    name: &'a str,
    profile: &'a str,
}

#[derive(Serialize)]
struct MuteBody {
    muted: bool,
}

#[derive(Serialize)]
struct HangupBody<'a> {
    reason: &'a str,
}

#[derive(Serialize)]
struct InviteBody<'a> {
    address: &'a str,
    domain: &'a str,
    display_label: &'a str,
}

/// HTTP client for the media bridge control API.
pub struct HttpMediaBridge {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMediaBridge {
    /// Create a new bridge client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(BRIDGE_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(BRIDGE_TIMEOUT_SECS))
            .build()
            .map_err(|e| BridgeError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn execute(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BridgeError> {
        let start = Instant::now();
        let response = request.send().await.map_err(|e| {
            metrics::record_bridge_call(operation, "error", start.elapsed());
            warn!(
                target: "conf.services.bridge",
                operation = operation,
                error = %e,
                "Bridge request failed"
            );
            BridgeError::Unavailable("Media bridge unreachable".to_string())
        })?;

        if response.status().is_success() {
            metrics::record_bridge_call(operation, "success", start.elapsed());
            Ok(response)
        } else {
            metrics::record_bridge_call(operation, "error", start.elapsed());
            warn!(
                target: "conf.services.bridge",
                operation = operation,
                status = %response.status(),
                "Bridge rejected command"
            );
            Err(BridgeError::Rejected(format!(
                "HTTP {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl MediaBridge for HttpMediaBridge {
    #[instrument(skip_all, name = "conf.bridge.is_reachable")]
    async fn is_reachable(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        self.execute("is_reachable", self.client.get(url))
            .await
            .is_ok()
    }

    #[instrument(skip_all, name = "conf.bridge.create_room", fields(room = %name))]
    async fn create_room(&self, name: &str, profile: &str) -> Result<(), BridgeError> {
        let url = format!("{}/v1/rooms", self.base_url);
        let body = CreateRoomBody { name, profile };
        self.execute("create_room", self.client.post(url).json(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip_all, name = "conf.bridge.list_members", fields(room = %name))]
    async fn list_members(&self, name: &str) -> Result<Vec<BridgeMember>, BridgeError> {
        let url = format!("{}/v1/rooms/{}/members", self.base_url, name);
        let response = self.execute("list_members", self.client.get(url)).await?;
        response
            .json::<Vec<BridgeMember>>()
            .await
            .map_err(|e| BridgeError::Rejected(e.to_string()))
    }

    #[instrument(skip_all, name = "conf.bridge.mute", fields(room = %name, muted = muted))]
    async fn mute(&self, name: &str, member_handle: &str, muted: bool) -> Result<(), BridgeError> {
        let url = format!(
            "{}/v1/rooms/{}/members/{}/mute",
            self.base_url, name, member_handle
        );
        self.execute("mute", self.client.post(url).json(&MuteBody { muted }))
            .await?;
        Ok(())
    }

    #[instrument(skip_all, name = "conf.bridge.kick", fields(room = %name))]
    async fn kick(&self, name: &str, member_handle: &str) -> Result<(), BridgeError> {
        let url = format!(
            "{}/v1/rooms/{}/members/{}",
            self.base_url, name, member_handle
        );
        self.execute("kick", self.client.delete(url)).await?;
        Ok(())
    }

    #[instrument(skip_all, name = "conf.bridge.hangup")]
    async fn hangup(&self, call_handle: &str, reason: &str) -> Result<(), BridgeError> {
        let url = format!("{}/v1/calls/{}/hangup", self.base_url, call_handle);
        self.execute("hangup", self.client.post(url).json(&HangupBody { reason }))
            .await?;
        Ok(())
    }

    #[instrument(skip_all, name = "conf.bridge.invite_user", fields(room = %room_name))]
    async fn invite_user(
        &self,
        room_name: &str,
        address: &str,
        domain: &str,
        display_label: &str,
    ) -> Result<(), BridgeError> {
        let url = format!("{}/v1/rooms/{}/invites", self.base_url, room_name);
        let body = InviteBody {
            address,
            domain,
            display_label,
        };
        self.execute("invite_user", self.client.post(url).json(&body))
            .await?;
        Ok(())
    }
}

/// Recording mock bridge for tests.
pub mod mock {
    use super::{BridgeError, BridgeMember, MediaBridge};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// A bridge command observed by the mock.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BridgeCall {
        /// `create_room(name, profile)`
        CreateRoom(String, String),
        /// `list_members(name)`
        ListMembers(String),
        /// `mute(name, handle, muted)`
        Mute(String, String, bool),
        /// `kick(name, handle)`
        Kick(String, String),
        /// `hangup(handle, reason)`
        Hangup(String, String),
        /// `invite_user(room, address, domain, label)`
        InviteUser(String, String, String, String),
    }

    /// Mock bridge that records every command.
    ///
    /// Configurable reachability and per-call failure let tests exercise
    /// the best-effort paths.
    pub struct MockMediaBridge {
        calls: Mutex<Vec<BridgeCall>>,
        reachable: bool,
        fail_commands: bool,
        members: Mutex<Vec<BridgeMember>>,
    }

    impl MockMediaBridge {
        /// A reachable bridge that accepts every command.
        #[must_use]
        pub fn healthy() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reachable: true,
                fail_commands: false,
                members: Mutex::new(Vec::new()),
            }
        }

        /// An unreachable bridge that fails every command.
        #[must_use]
        pub fn unreachable() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reachable: false,
                fail_commands: true,
                members: Mutex::new(Vec::new()),
            }
        }

        /// Set the member list returned by `list_members`.
        pub fn set_members(&self, members: Vec<BridgeMember>) {
            if let Ok(mut guard) = self.members.lock() {
                *guard = members;
            }
        }

        /// Commands observed so far.
        #[must_use]
        pub fn calls(&self) -> Vec<BridgeCall> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        fn record(&self, call: BridgeCall) -> Result<(), BridgeError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
            if self.fail_commands {
                Err(BridgeError::Unavailable("mock bridge down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl MediaBridge for MockMediaBridge {
        async fn is_reachable(&self) -> bool {
            self.reachable
        }

        async fn create_room(&self, name: &str, profile: &str) -> Result<(), BridgeError> {
            self.record(BridgeCall::CreateRoom(name.to_string(), profile.to_string()))
        }

        async fn list_members(&self, name: &str) -> Result<Vec<BridgeMember>, BridgeError> {
            self.record(BridgeCall::ListMembers(name.to_string()))?;
            Ok(self.members.lock().map(|m| m.clone()).unwrap_or_default())
        }

        async fn mute(
            &self,
            name: &str,
            member_handle: &str,
            muted: bool,
        ) -> Result<(), BridgeError> {
            self.record(BridgeCall::Mute(
                name.to_string(),
                member_handle.to_string(),
                muted,
            ))
        }

        async fn kick(&self, name: &str, member_handle: &str) -> Result<(), BridgeError> {
            self.record(BridgeCall::Kick(
                name.to_string(),
                member_handle.to_string(),
            ))
        }

        async fn hangup(&self, call_handle: &str, reason: &str) -> Result<(), BridgeError> {
            self.record(BridgeCall::Hangup(
                call_handle.to_string(),
                reason.to_string(),
            ))
        }

        async fn invite_user(
            &self,
            room_name: &str,
            address: &str,
            domain: &str,
            display_label: &str,
        ) -> Result<(), BridgeError> {
            self.record(BridgeCall::InviteUser(
                room_name.to_string(),
                address.to_string(),
                domain.to_string(),
                display_label.to_string(),
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::mock::{BridgeCall, MockMediaBridge};
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let bridge = MockMediaBridge::healthy();
        bridge.create_room("conf_abc123", "video-mcu").await.unwrap();
        bridge.mute("conf_abc123", "m1", true).await.unwrap();

        assert_eq!(
            bridge.calls(),
            vec![
                BridgeCall::CreateRoom("conf_abc123".to_string(), "video-mcu".to_string()),
                BridgeCall::Mute("conf_abc123".to_string(), "m1".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_mock_fails_commands() {
        let bridge = MockMediaBridge::unreachable();
        assert!(!bridge.is_reachable().await);
        assert!(bridge.kick("conf_abc123", "m1").await.is_err());
        // Commands are still recorded for assertions on attempts.
        assert_eq!(bridge.calls().len(), 1);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let bridge = HttpMediaBridge::new("http://bridge:8021/").unwrap();
        assert_eq!(bridge.base_url, "http://bridge:8021");
    }
}

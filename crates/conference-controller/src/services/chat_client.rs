//! Chat subsystem client.
//!
//! The controller uses chat for exactly one thing: posting short
//! human-readable system notices ("X joined the event"). Notice failures
//! are logged and never block orchestration.

use crate::observability::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Default timeout for chat calls in seconds.
const CHAT_TIMEOUT_SECS: u64 = 5;

/// Chat client error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Chat subsystem unreachable or timed out.
    #[error("Chat unavailable: {0}")]
    Unavailable(String),

    /// Chat subsystem rejected the notice.
    #[error("Chat rejected notice: {0}")]
    Rejected(String),
}

/// Chat capability interface.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Post a system notice into a chat. Returns the created message ID.
    async fn send_system_notice(&self, chat_id: Uuid, text: &str) -> Result<Uuid, ChatError>;
}

#[derive(Serialize)]
struct NoticeBody<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct NoticeResponse {
    message_id: Uuid,
}

/// HTTP client for the chat subsystem's internal API.
pub struct HttpChatClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatClient {
    /// Create a new chat client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CHAT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ChatError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    #[instrument(skip_all, name = "conf.chat.send_system_notice", fields(chat_id = %chat_id))]
    async fn send_system_notice(&self, chat_id: Uuid, text: &str) -> Result<Uuid, ChatError> {
        let url = format!(
            "{}/internal/chats/{}/system-notices",
            self.base_url, chat_id
        );

        let response = self
            .client
            .post(url)
            .json(&NoticeBody { text })
            .send()
            .await
            .map_err(|e| ChatError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::Rejected(format!("HTTP {}", response.status())));
        }

        let body = response
            .json::<NoticeResponse>()
            .await
            .map_err(|e| ChatError::Rejected(e.to_string()))?;

        Ok(body.message_id)
    }
}

/// Post a notice if the conference has a chat, swallowing failures.
pub async fn notify_best_effort(chat: &dyn ChatClient, chat_id: Option<Uuid>, text: &str) {
    let Some(chat_id) = chat_id else {
        return;
    };
    match chat.send_system_notice(chat_id, text).await {
        Ok(_) => metrics::record_chat_notice("success"),
        Err(e) => {
            metrics::record_chat_notice("error");
            warn!(
                target: "conf.services.chat",
                chat_id = %chat_id,
                error = %e,
                "Failed to post chat notice"
            );
        }
    }
}

/// Recording mock chat client for tests.
pub mod mock {
    use super::{ChatClient, ChatError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Mock chat client that records every notice.
    #[derive(Default)]
    pub struct MockChatClient {
        notices: Mutex<Vec<(Uuid, String)>>,
    }

    impl MockChatClient {
        /// A chat client that accepts every notice.
        #[must_use]
        pub fn accepting() -> Self {
            Self::default()
        }

        /// Notices observed so far as `(chat_id, text)` pairs.
        #[must_use]
        pub fn notices(&self) -> Vec<(Uuid, String)> {
            self.notices.lock().map(|n| n.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatClient for MockChatClient {
        async fn send_system_notice(&self, chat_id: Uuid, text: &str) -> Result<Uuid, ChatError> {
            if let Ok(mut notices) = self.notices.lock() {
                notices.push((chat_id, text.to_string()));
            }
            Ok(Uuid::new_v4())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::mock::MockChatClient;
    use super::*;

    #[tokio::test]
    async fn test_notify_best_effort_skips_chatless_conferences() {
        let chat = MockChatClient::accepting();
        notify_best_effort(&chat, None, "ignored").await;
        assert!(chat.notices().is_empty());
    }

    #[tokio::test]
    async fn test_notify_best_effort_posts_notice() {
        let chat = MockChatClient::accepting();
        let chat_id = Uuid::new_v4();
        notify_best_effort(&chat, Some(chat_id), "Alice joined the event").await;
        assert_eq!(
            chat.notices(),
            vec![(chat_id, "Alice joined the event".to_string())]
        );
    }
}

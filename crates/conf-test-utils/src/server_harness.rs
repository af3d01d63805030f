//! Test server harness for E2E testing
//!
//! Provides `TestConfServer` for spawning real conference controller
//! instances in tests, with the bridge/event/chat collaborators replaced
//! by the recording mocks.

use conference_controller::config::Config;
use conference_controller::routes::{self, AppState};
use conference_controller::services::{
    InviteFanout, MockChatClient, MockEventPublisher, MockMediaBridge,
};
use sqlx::PgPool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Test harness for spawning the conference controller in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[sqlx::test(migrations = "../../migrations")]
/// async fn test_health_flow_e2e(pool: PgPool) -> Result<()> {
///     let server = TestConfServer::spawn(pool).await?;
///     let response = reqwest::get(format!("{}/v1/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestConfServer {
    addr: SocketAddr,
    /// Recording bridge mock backing the server.
    pub bridge: Arc<MockMediaBridge>,
    /// Recording event publisher mock backing the server.
    pub events: Arc<MockEventPublisher>,
    /// Recording chat mock backing the server.
    pub chat: Arc<MockChatClient>,
    cancel_token: CancellationToken,
    _handle: JoinHandle<()>,
}

impl TestConfServer {
    /// Spawn a new test server instance over an isolated database.
    ///
    /// The server binds to a random available port and runs in the
    /// background until the harness is dropped.
    ///
    /// # Arguments
    /// * `pool` - Database connection pool (typically from `#[sqlx::test]`)
    ///
    /// # Errors
    /// Returns an error if configuration or binding fails.
    pub async fn spawn(pool: PgPool) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let bridge = Arc::new(MockMediaBridge::healthy());
        let events = Arc::new(MockEventPublisher::accepting());
        let chat = Arc::new(MockChatClient::accepting());
        let cancel_token = CancellationToken::new();

        let invites = Arc::new(InviteFanout::new(
            pool.clone(),
            bridge.clone(),
            cancel_token.clone(),
        ));

        let state = Arc::new(AppState {
            pool,
            config,
            bridge: bridge.clone(),
            events: events.clone(),
            chat: chat.clone(),
            invites,
            metrics_handle: None,
        });

        let app = routes::build_routes(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            bridge,
            events,
            chat,
            cancel_token,
            _handle: handle,
        })
    }

    /// Base URL of the running server.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Cancellation token shared with the server's background work.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for TestConfServer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        self._handle.abort();
    }
}

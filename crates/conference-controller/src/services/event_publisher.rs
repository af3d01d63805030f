//! Domain event publisher.
//!
//! Fire-and-forget emission of domain events to the platform message bus
//! (Redis pub/sub). Downstream consumers forward events to end-user
//! real-time channels; this controller only produces them. Publication
//! failures are logged and never fail the orchestration that raised the
//! event.

use crate::observability::metrics;
use async_trait::async_trait;
use common::events::DomainEvent;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tracing::{instrument, warn};

/// Event publisher error type.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Bus connection or command failure.
    #[error("Event bus error: {0}")]
    Bus(String),

    /// Payload could not be serialized.
    #[error("Event serialization error: {0}")]
    Serialization(String),
}

/// Event publisher capability interface.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one domain event.
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

/// Redis pub/sub implementation of the event publisher.
pub struct RedisEventPublisher {
    connection: ConnectionManager,
    channel: String,
}

impl RedisEventPublisher {
    /// Connect to Redis and build a publisher on the given channel.
    ///
    /// # Errors
    ///
    /// Returns an error when the initial connection cannot be established.
    pub async fn connect(redis_url: &str, channel: &str) -> Result<Self, PublishError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| PublishError::Bus(e.to_string()))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| PublishError::Bus(e.to_string()))?;

        Ok(Self {
            connection,
            channel: channel.to_string(),
        })
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    #[instrument(skip_all, name = "conf.events.publish", fields(kind = event.kind()))]
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload =
            serde_json::to_string(event).map_err(|e| PublishError::Serialization(e.to_string()))?;

        let mut connection = self.connection.clone();
        let () = connection
            .publish(&self.channel, payload)
            .await
            .map_err(|e| PublishError::Bus(e.to_string()))?;

        Ok(())
    }
}

/// Publish an event, recording the outcome and swallowing failures.
///
/// The store mutation that raised the event has already committed; the
/// event bus is a best-effort side channel and must not roll it back.
pub async fn publish_best_effort(publisher: &dyn EventPublisher, event: DomainEvent) {
    let kind = event.kind();
    match publisher.publish(&event).await {
        Ok(()) => metrics::record_event_published(kind, "success"),
        Err(e) => {
            metrics::record_event_published(kind, "error");
            warn!(
                target: "conf.services.events",
                kind = kind,
                error = %e,
                "Failed to publish domain event"
            );
        }
    }
}

/// Recording mock publisher for tests.
pub mod mock {
    use super::{DomainEvent, EventPublisher, PublishError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Mock publisher that records every event.
    #[derive(Default)]
    pub struct MockEventPublisher {
        events: Mutex<Vec<DomainEvent>>,
        fail: bool,
    }

    impl MockEventPublisher {
        /// A publisher that accepts every event.
        #[must_use]
        pub fn accepting() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        /// A publisher whose every publish fails.
        #[must_use]
        pub fn failing() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        /// Events observed so far.
        #[must_use]
        pub fn events(&self) -> Vec<DomainEvent> {
            self.events.lock().map(|e| e.clone()).unwrap_or_default()
        }

        /// Kinds of the events observed so far, in order.
        #[must_use]
        pub fn kinds(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .map(|events| events.iter().map(DomainEvent::kind).collect())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl EventPublisher for MockEventPublisher {
        async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
            if let Ok(mut events) = self.events.lock() {
                events.push(event.clone());
            }
            if self.fail {
                Err(PublishError::Bus("mock bus down".to_string()))
            } else {
                Ok(())
            }
        }
    }
}

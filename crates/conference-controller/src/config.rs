//! Conference Controller configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default Redis URL for the platform event bus.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Default Redis channel that domain events are published on.
pub const DEFAULT_EVENT_CHANNEL: &str = "conclave.events";

/// Default media bridge control API base URL.
pub const DEFAULT_BRIDGE_BASE_URL: &str = "http://localhost:8021";

/// Default chat subsystem internal API base URL.
pub const DEFAULT_CHAT_BASE_URL: &str = "http://localhost:8070";

/// Default maximum members for an ad-hoc conference.
pub const DEFAULT_ADHOC_MAX_MEMBERS: i32 = 10;

/// Default maximum members for scheduled and chat-attached conferences.
pub const DEFAULT_SCHEDULED_MAX_MEMBERS: i32 = 50;

/// Conference Controller configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Database URL is redacted in Debug output to prevent credential leakage.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Redis URL for the platform event bus.
    pub redis_url: String,

    /// Redis channel that domain events are published on.
    pub event_channel: String,

    /// Media bridge control API base URL.
    pub bridge_base_url: String,

    /// Chat subsystem internal API base URL.
    pub chat_base_url: String,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("redis_url", &"[REDACTED]")
            .field("event_channel", &self.event_channel)
            .field("bridge_base_url", &self.bridge_base_url)
            .field("chat_base_url", &self.chat_base_url)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid URL in {0}: {1}")]
    InvalidUrl(String, String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let redis_url = vars
            .get("REDIS_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());

        let event_channel = vars
            .get("CONF_EVENT_CHANNEL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_EVENT_CHANNEL.to_string());

        let bridge_base_url = vars
            .get("BRIDGE_BASE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BRIDGE_BASE_URL.to_string());

        let chat_base_url = vars
            .get("CHAT_BASE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CHAT_BASE_URL.to_string());

        for (name, value) in [
            ("BRIDGE_BASE_URL", &bridge_base_url),
            ("CHAT_BASE_URL", &chat_base_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ConfigError::InvalidUrl(
                    name.to_string(),
                    "expected an http(s) URL".to_string(),
                ));
            }
        }

        Ok(Self {
            database_url,
            bind_address,
            redis_url,
            event_channel,
            bridge_base_url,
            chat_base_url,
        })
    }
}

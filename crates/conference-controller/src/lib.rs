//! Conference Controller Service Library
//!
//! This library provides the core functionality for the Conclave
//! conference controller - the conferencing and call orchestration core of
//! the platform:
//!
//! - Conference lifecycle (create, join, leave, moderate, end)
//! - One-to-one call signaling (initiate, answer, hangup)
//! - Scheduled and recurring conferences with RSVP and reminders
//! - Concurrent invitation fan-out via the media bridge
//! - Stale-state reclamation
//!
//! # Architecture
//!
//! The controller follows the Handler -> Service -> Repository pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! The persistent store is the source of truth; the media bridge, the
//! event bus, and chat notices are best-effort side channels.
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `models` - Data models
//! - `observability` - Metrics recording
//! - `repositories` - Database access
//! - `routes` - Axum router setup
//! - `services` - Orchestrators and external-system clients
//! - `tasks` - Background maintenance tasks

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod tasks;

//! Common types shared across Conclave platform services.
//!
//! The conference controller produces domain events consumed by the
//! message-bus fan-out service and the chat subsystem; the payloads and the
//! identifiers they carry live here so every service agrees on the wire
//! contract.

#![warn(clippy::pedantic)]

/// Module for typed identifiers and domain enums
pub mod types;

/// Module for domain event payloads published on the platform bus
pub mod events;

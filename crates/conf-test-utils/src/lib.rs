//! Test utilities for the Conclave conference controller.
//!
//! Provides `TestConfServer` for spawning real controller instances in
//! end-to-end tests, wired to the recording mocks for the media bridge,
//! the event bus, and chat.

#![allow(clippy::expect_used)]

pub mod server_harness;

pub use server_harness::TestConfServer;

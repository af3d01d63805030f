//! Background tasks for the Conference Controller.
//!
//! Provides long-running background tasks for maintenance operations.
//!
//! # Tasks
//!
//! - `stale_reaper` - Reconciles store state with reality: force-ends
//!   stale active conferences and reclaims participants stuck in
//!   `connecting`

pub mod stale_reaper;

pub use stale_reaper::{start_stale_reaper, StaleReaperConfig};

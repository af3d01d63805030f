//! HTTP request handlers for the Conference Controller.

pub mod calls;
pub mod conferences;
pub mod health;
pub mod metrics;
pub mod scheduling;

pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;

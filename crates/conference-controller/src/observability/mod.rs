//! Observability for the Conference Controller.

/// Metrics definitions and recording helpers
pub mod metrics;

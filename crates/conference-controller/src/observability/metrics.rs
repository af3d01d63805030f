//! Metrics definitions for the Conference Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `conf_` prefix for the conference controller
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `operation`: bounded by code (create_conference, add_participant, ...)
//! - `status`: 2 values (success, error)
//! - `kind`: bounded by the domain event kinds
//!
//! The live gauges (`conf_active_conferences`, `conf_active_participants`,
//! `conf_active_calls`) are updated at each state transition by the
//! orchestrators; the metrics facade is the injected sink, so tests can
//! install their own recorder and assert on transitions.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the render handle.
///
/// Called once at startup; the handle backs the `/metrics` endpoint.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record a database query.
///
/// Metric: `conf_db_queries_total`, `conf_db_query_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("conf_db_query_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("conf_db_queries_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record a media bridge call.
///
/// Metric: `conf_bridge_calls_total`, `conf_bridge_call_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_bridge_call(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("conf_bridge_call_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("conf_bridge_calls_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record a domain event publication attempt.
///
/// Metric: `conf_events_published_total`
/// Labels: `kind`, `status`
pub fn record_event_published(kind: &'static str, status: &'static str) {
    counter!("conf_events_published_total",
        "kind" => kind,
        "status" => status
    )
    .increment(1);
}

/// Record a chat system-notice attempt.
///
/// Metric: `conf_chat_notices_total`
/// Labels: `status`
pub fn record_chat_notice(status: &'static str) {
    counter!("conf_chat_notices_total", "status" => status).increment(1);
}

/// Adjust the live conference gauge.
///
/// Metric: `conf_active_conferences`
pub fn adjust_active_conferences(delta: i64) {
    if delta >= 0 {
        gauge!("conf_active_conferences").increment(delta as f64);
    } else {
        gauge!("conf_active_conferences").decrement((-delta) as f64);
    }
}

/// Adjust the live participant gauge.
///
/// Metric: `conf_active_participants`
pub fn adjust_active_participants(delta: i64) {
    if delta >= 0 {
        gauge!("conf_active_participants").increment(delta as f64);
    } else {
        gauge!("conf_active_participants").decrement((-delta) as f64);
    }
}

/// Adjust the live call gauge.
///
/// Metric: `conf_active_calls`
pub fn adjust_active_calls(delta: i64) {
    if delta >= 0 {
        gauge!("conf_active_calls").increment(delta as f64);
    } else {
        gauge!("conf_active_calls").decrement((-delta) as f64);
    }
}

/// Record rows reclaimed by a reaper sweep.
///
/// Metric: `conf_reaper_reclaimed_total`
/// Labels: `sweep` (stale_conferences, stale_connecting)
pub fn record_reaper_reclaimed(sweep: &'static str, count: u64) {
    counter!("conf_reaper_reclaimed_total", "sweep" => sweep).increment(count);
}

//! Stale-state reaper background task.
//!
//! Periodically reconciles the store against reality, independent of
//! request traffic:
//! 1. Force-ends active conferences that exceeded the max age or have had
//!    zero active participants past the grace period
//! 2. Reclaims participant rows stuck in `connecting` past the timeout
//!
//! Both sweeps are single atomic statements in the repository layer, so
//! re-running on an already-clean store is a no-op and the sweeps are safe
//! to run concurrently with live mutations.
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. When the
//! token is cancelled, the task completes its current iteration and exits
//! cleanly.

use crate::observability::metrics;
use crate::repositories::{ConferencesRepository, ParticipantsRepository};
use sqlx::PgPool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Default sweep interval in seconds.
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// Default maximum age for an active conference in hours.
const DEFAULT_MAX_AGE_HOURS: i64 = 12;

/// Default grace period for empty active conferences in seconds.
const DEFAULT_EMPTY_GRACE_SECONDS: i64 = 300;

/// Default timeout for participants stuck in `connecting`, in seconds.
const DEFAULT_CONNECTING_TIMEOUT_SECONDS: i64 = 120;

/// Configuration for the stale-state reaper task.
#[derive(Debug, Clone)]
pub struct StaleReaperConfig {
    /// Sweep interval in seconds.
    pub sweep_interval_seconds: u64,

    /// Active conferences older than this are force-ended.
    pub max_age_hours: i64,

    /// Active conferences empty for longer than this are force-ended.
    pub empty_grace_seconds: i64,

    /// `connecting` rows older than this are reclaimed.
    pub connecting_timeout_seconds: i64,
}

impl Default for StaleReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            empty_grace_seconds: DEFAULT_EMPTY_GRACE_SECONDS,
            connecting_timeout_seconds: DEFAULT_CONNECTING_TIMEOUT_SECONDS,
        }
    }
}

impl StaleReaperConfig {
    /// Create config from environment variables.
    ///
    /// Environment variables:
    /// - `CONF_REAPER_INTERVAL_SECONDS` - Sweep interval (default: 60)
    /// - `CONF_MAX_AGE_HOURS` - Max conference age (default: 12)
    /// - `CONF_EMPTY_GRACE_SECONDS` - Empty-conference grace (default: 300)
    /// - `CONF_CONNECTING_TIMEOUT_SECONDS` - Connecting timeout (default: 120)
    #[must_use]
    pub fn from_env() -> Self {
        let sweep_interval_seconds = std::env::var("CONF_REAPER_INTERVAL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECONDS);

        let max_age_hours = std::env::var("CONF_MAX_AGE_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_AGE_HOURS);

        let empty_grace_seconds = std::env::var("CONF_EMPTY_GRACE_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMPTY_GRACE_SECONDS);

        let connecting_timeout_seconds = std::env::var("CONF_CONNECTING_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CONNECTING_TIMEOUT_SECONDS);

        Self {
            sweep_interval_seconds,
            max_age_hours,
            empty_grace_seconds,
            connecting_timeout_seconds,
        }
    }
}

/// Start the stale-state reaper background task.
///
/// Runs in a loop, sweeping at the configured interval, and exits
/// gracefully when the cancellation token is triggered.
///
/// # Arguments
///
/// * `pool` - Database connection pool
/// * `config` - Reaper configuration
/// * `cancel_token` - Token for graceful shutdown
#[instrument(skip_all, name = "conf.task.stale_reaper")]
pub async fn start_stale_reaper(
    pool: PgPool,
    config: StaleReaperConfig,
    cancel_token: CancellationToken,
) {
    info!(
        target: "conf.task.stale_reaper",
        sweep_interval_seconds = config.sweep_interval_seconds,
        max_age_hours = config.max_age_hours,
        empty_grace_seconds = config.empty_grace_seconds,
        connecting_timeout_seconds = config.connecting_timeout_seconds,
        "Starting stale-state reaper"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.sweep_interval_seconds));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_sweep(&pool, &config).await;
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "conf.task.stale_reaper",
                    "Stale-state reaper received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "conf.task.stale_reaper", "Stale-state reaper stopped");
}

/// Run a single sweep iteration.
///
/// Separated from the main loop to allow direct testing. Per-sweep
/// failures are logged and do not stop the other sweep.
pub(crate) async fn run_sweep(pool: &PgPool, config: &StaleReaperConfig) {
    match ConferencesRepository::force_end_stale(
        pool,
        config.max_age_hours,
        config.empty_grace_seconds,
    )
    .await
    {
        Ok(count) => {
            if count > 0 {
                metrics::record_reaper_reclaimed("stale_conferences", count);
                metrics::adjust_active_conferences(-(count as i64));
                warn!(
                    target: "conf.task.stale_reaper",
                    ended = count,
                    "Force-ended stale conferences"
                );
            }
        }
        Err(e) => {
            tracing::error!(
                target: "conf.task.stale_reaper",
                error = %e,
                "Failed to sweep stale conferences"
            );
        }
    }

    match ParticipantsRepository::reclaim_stale_connecting(
        pool,
        config.connecting_timeout_seconds,
    )
    .await
    {
        Ok(count) => {
            if count > 0 {
                metrics::record_reaper_reclaimed("stale_connecting", count);
                metrics::adjust_active_participants(-(count as i64));
                warn!(
                    target: "conf.task.stale_reaper",
                    reclaimed = count,
                    "Reclaimed stale connecting participants"
                );
            }
        }
        Err(e) => {
            tracing::error!(
                target: "conf.task.stale_reaper",
                error = %e,
                "Failed to reclaim stale connecting participants"
            );
        }
    }
}


/// Integration tests for the reaper requiring a database.
#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod integration_tests {
    use super::*;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn test_config() -> StaleReaperConfig {
        StaleReaperConfig {
            sweep_interval_seconds: 3600,
            max_age_hours: 12,
            empty_grace_seconds: 300,
            connecting_timeout_seconds: 120,
        }
    }

    async fn insert_conference(pool: &PgPool, started_ago: &str) -> Uuid {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO conferences (
                display_name, room_name, created_by_user_id, status,
                max_members, event_type, started_at
            )
            VALUES ('Sweep me', $1, $2, 'active', 10, 'adhoc',
                    NOW() - ($3)::INTERVAL)
            RETURNING conference_id
            "#,
        )
        .bind(format!(
            "conf_{}",
            Uuid::new_v4().simple().to_string().chars().take(8).collect::<String>()
        ))
        .bind(Uuid::new_v4())
        .bind(started_ago)
        .fetch_one(pool)
        .await
        .unwrap();
        row.0
    }

    async fn insert_participant(
        pool: &PgPool,
        conference_id: Uuid,
        status: &str,
        created_ago: &str,
    ) -> Uuid {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO participants (conference_id, user_id, status, created_at)
            VALUES ($1, $2, $3, NOW() - ($4)::INTERVAL)
            RETURNING participant_id
            "#,
        )
        .bind(conference_id)
        .bind(Uuid::new_v4())
        .bind(status)
        .bind(created_ago)
        .fetch_one(pool)
        .await
        .unwrap();
        row.0
    }

    async fn conference_status(pool: &PgPool, conference_id: Uuid) -> (String, bool) {
        let row: (String, Option<chrono::DateTime<chrono::Utc>>) = sqlx::query_as(
            "SELECT status, ended_at FROM conferences WHERE conference_id = $1",
        )
        .bind(conference_id)
        .fetch_one(pool)
        .await
        .unwrap();
        (row.0, row.1.is_some())
    }

    /// The reaper task starts and stops gracefully.
    #[sqlx::test(migrations = "../../migrations")]
    async fn test_reaper_starts_and_stops(pool: PgPool) {
        let cancel_token = CancellationToken::new();
        let cancel_clone = cancel_token.clone();

        let mut config = test_config();
        config.sweep_interval_seconds = 1;

        let handle = tokio::spawn(start_stale_reaper(pool, config, cancel_token));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_clone.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(
            result.is_ok(),
            "Reaper should stop within 2 seconds after cancellation"
        );
        result.unwrap().expect("Task should not panic");
    }

    /// An over-age conference is force-ended with its participants.
    #[sqlx::test(migrations = "../../migrations")]
    async fn test_sweep_force_ends_aged_conference(pool: PgPool) {
        let conference_id = insert_conference(&pool, "13 hours").await;
        insert_participant(&pool, conference_id, "joined", "13 hours").await;

        run_sweep(&pool, &test_config()).await;

        let (status, has_ended_at) = conference_status(&pool, conference_id).await;
        assert_eq!(status, "ended");
        assert!(has_ended_at, "ended_at is set with the status transition");

        // Participants released in the same atomic statement.
        let active: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM participants
            WHERE conference_id = $1 AND status IN ('connecting', 'joined')
            "#,
        )
        .bind(conference_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(active.0, 0);
    }

    /// A conference empty past the grace period is force-ended.
    #[sqlx::test(migrations = "../../migrations")]
    async fn test_sweep_force_ends_empty_conference(pool: PgPool) {
        let conference_id = insert_conference(&pool, "10 minutes").await;

        run_sweep(&pool, &test_config()).await;

        let (status, _) = conference_status(&pool, conference_id).await;
        assert_eq!(status, "ended");
    }

    /// A fresh conference with live participants is left alone.
    #[sqlx::test(migrations = "../../migrations")]
    async fn test_sweep_preserves_live_conference(pool: PgPool) {
        let conference_id = insert_conference(&pool, "10 minutes").await;
        insert_participant(&pool, conference_id, "joined", "10 minutes").await;

        run_sweep(&pool, &test_config()).await;

        let (status, _) = conference_status(&pool, conference_id).await;
        assert_eq!(status, "active");
    }

    /// An empty conference inside the grace period is left alone.
    #[sqlx::test(migrations = "../../migrations")]
    async fn test_sweep_respects_empty_grace_period(pool: PgPool) {
        let conference_id = insert_conference(&pool, "2 minutes").await;

        run_sweep(&pool, &test_config()).await;

        let (status, _) = conference_status(&pool, conference_id).await;
        assert_eq!(status, "active");
    }

    /// Participants stuck in `connecting` past the timeout are reclaimed;
    /// fresh ones and live ones are not.
    #[sqlx::test(migrations = "../../migrations")]
    async fn test_sweep_reclaims_stale_connecting(pool: PgPool) {
        let conference_id = insert_conference(&pool, "10 minutes").await;
        let stale = insert_participant(&pool, conference_id, "connecting", "10 minutes").await;
        let fresh = insert_participant(&pool, conference_id, "connecting", "10 seconds").await;
        let live = insert_participant(&pool, conference_id, "joined", "10 minutes").await;

        run_sweep(&pool, &test_config()).await;

        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT participant_id, status FROM participants WHERE conference_id = $1")
                .bind(conference_id)
                .fetch_all(&pool)
                .await
                .unwrap();

        for (participant_id, status) in rows {
            let expected = if participant_id == stale {
                "left"
            } else if participant_id == fresh {
                "connecting"
            } else {
                assert_eq!(participant_id, live);
                "joined"
            };
            assert_eq!(status, expected, "participant {participant_id}");
        }
    }

    /// Re-running the sweep on an already-clean store is a no-op.
    #[sqlx::test(migrations = "../../migrations")]
    async fn test_sweep_is_idempotent(pool: PgPool) {
        let conference_id = insert_conference(&pool, "13 hours").await;
        insert_participant(&pool, conference_id, "joined", "13 hours").await;

        run_sweep(&pool, &test_config()).await;
        let first = conference_status(&pool, conference_id).await;

        run_sweep(&pool, &test_config()).await;
        let second = conference_status(&pool, conference_id).await;

        assert_eq!(first, second);
        assert_eq!(second.0, "ended");
    }
}

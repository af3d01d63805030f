//! Reminders repository for database operations.
//!
//! Reminder rows are created alongside scheduled-conference participants
//! and consumed by an external scheduler polling `list_pending`. Marking a
//! reminder sent is idempotent: marking an already-sent reminder is a
//! no-op, which makes the poll loop safe under concurrent pollers.

use crate::errors::ConfError;
use crate::models::ReminderRow;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Reminders repository for database operations.
pub struct RemindersRepository;

impl RemindersRepository {
    /// Create one reminder per user for a scheduled conference.
    #[instrument(
        skip_all,
        name = "conf.repo.create_reminders",
        fields(conference_id = %conference_id, count = user_ids.len())
    )]
    pub async fn create_for_users(
        pool: &PgPool,
        conference_id: Uuid,
        user_ids: &[Uuid],
        remind_at: DateTime<Utc>,
        minutes_before: i32,
    ) -> Result<u64, ConfError> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            INSERT INTO reminders (conference_id, user_id, remind_at, minutes_before)
            SELECT $1, unnest($2::uuid[]), $3, $4
            "#,
        )
        .bind(conference_id)
        .bind(user_ids)
        .bind(remind_at)
        .bind(minutes_before)
        .execute(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_reminders", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("create_reminders", "success", start.elapsed());
        Ok(result.rows_affected())
    }

    /// List reminders due at or before `now` that have not been sent, for
    /// conferences that are still scheduled.
    #[instrument(skip_all, name = "conf.repo.list_pending_reminders")]
    pub async fn list_pending(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderRow>, ConfError> {
        let start = Instant::now();

        let rows = sqlx::query_as::<_, ReminderRow>(
            r#"
            SELECT r.* FROM reminders r
            JOIN conferences c ON c.conference_id = r.conference_id
            WHERE r.sent = FALSE
              AND r.remind_at <= $1
              AND c.status = 'scheduled'
            ORDER BY r.remind_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_pending_reminders", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_pending_reminders", "success", start.elapsed());
        Ok(rows)
    }

    /// Mark a reminder as sent. Idempotent: returns `false` (not an error)
    /// when the reminder was already sent or does not exist.
    #[instrument(skip_all, name = "conf.repo.mark_reminder_sent", fields(reminder_id = %reminder_id))]
    pub async fn mark_sent(pool: &PgPool, reminder_id: Uuid) -> Result<bool, ConfError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET sent = TRUE, sent_at = NOW()
            WHERE reminder_id = $1 AND sent = FALSE
            "#,
        )
        .bind(reminder_id)
        .execute(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("mark_reminder_sent", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("mark_reminder_sent", "success", start.elapsed());
        Ok(result.rows_affected() > 0)
    }
}

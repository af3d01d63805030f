//! Calls repository for database operations.
//!
//! Call exclusivity (at most one live call per user, counting both the
//! caller and callee side) is enforced inside a transaction that takes
//! ordered per-user advisory locks before the guarded insert, so two
//! concurrent initiations involving the same user serialize at the store.

use crate::errors::ConfError;
use crate::models::CallRow;
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Default call history page size.
pub const DEFAULT_HISTORY_PAGE_SIZE: i64 = 25;

/// Calls repository for database operations.
pub struct CallsRepository;

impl CallsRepository {
    /// Insert a call in `initiated` status unless either party already has
    /// a live call.
    ///
    /// Returns `None` when the exclusivity guard rejects the insert.
    #[instrument(
        skip_all,
        name = "conf.repo.create_call",
        fields(caller_id = %caller_id, callee_id = %callee_id)
    )]
    pub async fn create_exclusive(
        pool: &PgPool,
        caller_id: Uuid,
        callee_id: Uuid,
        chat_id: Option<Uuid>,
    ) -> Result<Option<CallRow>, ConfError> {
        let start = Instant::now();

        let result: Result<Option<CallRow>, sqlx::Error> = async {
            let mut tx = pool.begin().await?;

            // Lock both parties in UUID order so concurrent initiations
            // touching the same users cannot deadlock or interleave.
            let (first, second) = if caller_id < callee_id {
                (caller_id, callee_id)
            } else {
                (callee_id, caller_id)
            };
            sqlx::query(
                r#"
                SELECT
                    pg_advisory_xact_lock(hashtextextended($1::text, 0)),
                    pg_advisory_xact_lock(hashtextextended($2::text, 0))
                "#,
            )
            .bind(first.to_string())
            .bind(second.to_string())
            .execute(&mut *tx)
            .await?;

            let row = sqlx::query_as::<_, CallRow>(
                r#"
                INSERT INTO calls (caller_id, callee_id, chat_id, status)
                SELECT $1, $2, $3, 'initiated'
                WHERE NOT EXISTS (
                    SELECT 1 FROM calls
                    WHERE status IN ('initiated', 'ringing', 'answered')
                      AND (caller_id IN ($1, $2) OR callee_id IN ($1, $2))
                )
                RETURNING *
                "#,
            )
            .bind(caller_id)
            .bind(callee_id)
            .bind(chat_id)
            .fetch_optional(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(row)
        }
        .await;

        match result {
            Ok(row) => {
                metrics::record_db_query("create_call", "success", start.elapsed());
                Ok(row)
            }
            Err(e) => {
                metrics::record_db_query("create_call", "error", start.elapsed());
                Err(ConfError::Database(e.to_string()))
            }
        }
    }

    /// Fetch a call by ID.
    #[instrument(skip_all, name = "conf.repo.get_call", fields(call_id = %call_id))]
    pub async fn get(pool: &PgPool, call_id: Uuid) -> Result<Option<CallRow>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, CallRow>("SELECT * FROM calls WHERE call_id = $1")
            .bind(call_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                metrics::record_db_query("get_call", "error", start.elapsed());
                ConfError::Database(e.to_string())
            })?;

        metrics::record_db_query("get_call", "success", start.elapsed());
        Ok(row)
    }

    /// Transition a call to `ringing` once the callee's client acknowledges.
    ///
    /// Returns `None` when the call is not in `initiated` status.
    #[instrument(skip_all, name = "conf.repo.mark_ringing", fields(call_id = %call_id))]
    pub async fn mark_ringing(pool: &PgPool, call_id: Uuid) -> Result<Option<CallRow>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, CallRow>(
            r#"
            UPDATE calls
            SET status = 'ringing'
            WHERE call_id = $1 AND status = 'initiated'
            RETURNING *
            "#,
        )
        .bind(call_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("mark_ringing", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("mark_ringing", "success", start.elapsed());
        Ok(row)
    }

    /// Transition a call to `answered`.
    ///
    /// Returns `None` when the call is not in `initiated` or `ringing`
    /// status.
    #[instrument(skip_all, name = "conf.repo.mark_answered", fields(call_id = %call_id))]
    pub async fn mark_answered(pool: &PgPool, call_id: Uuid) -> Result<Option<CallRow>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, CallRow>(
            r#"
            UPDATE calls
            SET status = 'answered', answered_at = NOW()
            WHERE call_id = $1 AND status IN ('initiated', 'ringing')
            RETURNING *
            "#,
        )
        .bind(call_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("mark_answered", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("mark_answered", "success", start.elapsed());
        Ok(row)
    }

    /// Transition a call to `ended` with its duration and end reason.
    ///
    /// Returns `None` when the call is already ended - concurrent hangups
    /// by both parties resolve to one transition.
    #[instrument(skip_all, name = "conf.repo.mark_ended", fields(call_id = %call_id))]
    pub async fn mark_ended(
        pool: &PgPool,
        call_id: Uuid,
        duration_seconds: i32,
        end_reason: &str,
    ) -> Result<Option<CallRow>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, CallRow>(
            r#"
            UPDATE calls
            SET status = 'ended', ended_at = NOW(),
                duration_seconds = $2, end_reason = $3
            WHERE call_id = $1 AND status != 'ended'
            RETURNING *
            "#,
        )
        .bind(call_id)
        .bind(duration_seconds)
        .bind(end_reason)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("mark_ended", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("mark_ended", "success", start.elapsed());
        Ok(row)
    }

    /// Paginated call history for a user (either side), newest first.
    #[instrument(skip_all, name = "conf.repo.list_history", fields(user_id = %user_id, page = page))]
    pub async fn list_history(
        pool: &PgPool,
        user_id: Uuid,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<CallRow>, ConfError> {
        let start = Instant::now();

        let rows = sqlx::query_as::<_, CallRow>(
            r#"
            SELECT * FROM calls
            WHERE caller_id = $1 OR callee_id = $1
            ORDER BY started_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page_size)
        .bind(page * page_size)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_history", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_history", "success", start.elapsed());
        Ok(rows)
    }
}

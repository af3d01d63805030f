//! Conferences repository for database operations.
//!
//! Owns conference rows and the multi-row lifecycle statements: the
//! end-conference transition (participants released and the conference
//! ended in one atomic statement) and the stale-conference sweep used by
//! the reaper.

use crate::errors::ConfError;
use crate::models::{ConferenceRow, RecurrenceSpec};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Parameters for creating a scheduled or recurring conference together
/// with its recurrence rule in one transaction.
#[derive(Debug, Clone)]
pub struct ScheduledConferenceParams {
    /// Display name (already trimmed).
    pub display_name: String,

    /// Owning chat, if any.
    pub chat_id: Option<Uuid>,

    /// External room name for the media bridge.
    pub room_name: String,

    /// Creating user.
    pub created_by_user_id: Uuid,

    /// Maximum active participants.
    pub max_members: i32,

    /// `scheduled` or `recurring`.
    pub event_type: &'static str,

    /// Scheduled start time.
    pub scheduled_at: DateTime<Utc>,

    /// Series identifier when recurring.
    pub series_id: Option<Uuid>,

    /// Recurrence rule when recurring.
    pub recurrence: Option<RecurrenceSpec>,
}

/// Outcome of the atomic end-conference statement.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EndedConference {
    /// The conference that was ended.
    pub conference_id: Uuid,

    /// Owning chat, for event routing.
    pub chat_id: Option<Uuid>,

    /// When the conference became active.
    pub started_at: Option<DateTime<Utc>>,

    /// When the conference ended (set by this statement).
    pub ended_at: Option<DateTime<Utc>>,

    /// Number of participant rows released alongside.
    pub released: i64,
}

/// Conferences repository for database operations.
pub struct ConferencesRepository;

impl ConferencesRepository {
    /// Create an ad-hoc conference in `active` status.
    #[instrument(skip_all, name = "conf.repo.create_conference")]
    #[expect(
        clippy::too_many_arguments,
        reason = "Represents the conference table columns for a single INSERT"
    )]
    pub async fn create_active(
        pool: &PgPool,
        display_name: &str,
        chat_id: Option<Uuid>,
        room_name: &str,
        created_by_user_id: Uuid,
        max_members: i32,
        is_private: bool,
        event_type: &str,
        recording_path: Option<&str>,
    ) -> Result<ConferenceRow, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, ConferenceRow>(
            r#"
            INSERT INTO conferences (
                display_name, chat_id, room_name, created_by_user_id,
                status, max_members, is_private, event_type,
                started_at, recording_path
            )
            VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, NOW(), $8)
            RETURNING *
            "#,
        )
        .bind(display_name)
        .bind(chat_id)
        .bind(room_name)
        .bind(created_by_user_id)
        .bind(max_members)
        .bind(is_private)
        .bind(event_type)
        .bind(recording_path)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_conference", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("create_conference", "success", start.elapsed());
        Ok(row)
    }

    /// Create a scheduled (or recurring) conference and its recurrence rule
    /// in one transaction.
    ///
    /// `accepted_count` starts at 1: the creator's roster row is inserted
    /// with RSVP already accepted.
    #[instrument(skip_all, name = "conf.repo.create_scheduled")]
    pub async fn create_scheduled(
        pool: &PgPool,
        params: &ScheduledConferenceParams,
    ) -> Result<ConferenceRow, ConfError> {
        let start = Instant::now();

        let result: Result<ConferenceRow, sqlx::Error> = async {
            let mut tx = pool.begin().await?;

            let row = sqlx::query_as::<_, ConferenceRow>(
                r#"
                INSERT INTO conferences (
                    display_name, chat_id, room_name, created_by_user_id,
                    status, max_members, event_type, scheduled_at, series_id,
                    accepted_count
                )
                VALUES ($1, $2, $3, $4, 'scheduled', $5, $6, $7, $8, 1)
                RETURNING *
                "#,
            )
            .bind(&params.display_name)
            .bind(params.chat_id)
            .bind(&params.room_name)
            .bind(params.created_by_user_id)
            .bind(params.max_members)
            .bind(params.event_type)
            .bind(params.scheduled_at)
            .bind(params.series_id)
            .fetch_one(&mut *tx)
            .await?;

            if let Some(recurrence) = &params.recurrence {
                sqlx::query(
                    r#"
                    INSERT INTO recurrence_rules (
                        conference_id, frequency, days_of_week,
                        day_of_month, until_date, occurrence_count
                    )
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(row.conference_id)
                .bind(&recurrence.frequency)
                .bind(&recurrence.days_of_week)
                .bind(recurrence.day_of_month)
                .bind(recurrence.until_date)
                .bind(recurrence.occurrence_count)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(row)
        }
        .await;

        match result {
            Ok(row) => {
                metrics::record_db_query("create_scheduled", "success", start.elapsed());
                Ok(row)
            }
            Err(e) => {
                metrics::record_db_query("create_scheduled", "error", start.elapsed());
                Err(ConfError::Database(e.to_string()))
            }
        }
    }

    /// Fetch a conference by ID.
    #[instrument(skip_all, name = "conf.repo.get_conference", fields(conference_id = %conference_id))]
    pub async fn get(
        pool: &PgPool,
        conference_id: Uuid,
    ) -> Result<Option<ConferenceRow>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, ConferenceRow>(
            "SELECT * FROM conferences WHERE conference_id = $1",
        )
        .bind(conference_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("get_conference", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("get_conference", "success", start.elapsed());
        Ok(row)
    }

    /// Fetch a conference by its external room name.
    #[instrument(skip_all, name = "conf.repo.get_by_room_name", fields(room_name = %room_name))]
    pub async fn get_by_room_name(
        pool: &PgPool,
        room_name: &str,
    ) -> Result<Option<ConferenceRow>, ConfError> {
        let start = Instant::now();

        let row =
            sqlx::query_as::<_, ConferenceRow>("SELECT * FROM conferences WHERE room_name = $1")
                .bind(room_name)
                .fetch_optional(pool)
                .await
                .map_err(|e| {
                    metrics::record_db_query("get_by_room_name", "error", start.elapsed());
                    ConfError::Database(e.to_string())
                })?;

        metrics::record_db_query("get_by_room_name", "success", start.elapsed());
        Ok(row)
    }

    /// List active conferences, optionally restricted to one chat.
    #[instrument(skip_all, name = "conf.repo.list_active")]
    pub async fn list_active(
        pool: &PgPool,
        chat_id: Option<Uuid>,
    ) -> Result<Vec<ConferenceRow>, ConfError> {
        let start = Instant::now();

        let rows = sqlx::query_as::<_, ConferenceRow>(
            r#"
            SELECT * FROM conferences
            WHERE status = 'active'
              AND is_private = FALSE
              AND ($1::uuid IS NULL OR chat_id = $1)
            ORDER BY started_at DESC
            "#,
        )
        .bind(chat_id)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_active", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_active", "success", start.elapsed());
        Ok(rows)
    }

    /// List upcoming scheduled conferences a user is on the roster of.
    #[instrument(skip_all, name = "conf.repo.list_scheduled_for_user", fields(user_id = %user_id))]
    pub async fn list_scheduled_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<ConferenceRow>, ConfError> {
        let start = Instant::now();

        let rows = sqlx::query_as::<_, ConferenceRow>(
            r#"
            SELECT c.* FROM conferences c
            JOIN participants p ON p.conference_id = c.conference_id
            WHERE c.status = 'scheduled'
              AND p.user_id = $1
              AND p.status IN ('connecting', 'joined')
            ORDER BY c.scheduled_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_scheduled_for_user", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_scheduled_for_user", "success", start.elapsed());
        Ok(rows)
    }

    /// End a conference: release every active participant and mark the
    /// conference ended, in one atomic statement.
    ///
    /// Returns `None` when the conference was not `active` (already ended,
    /// cancelled, or absent) - the transition is a no-op in that case, so
    /// concurrent end paths (explicit end, auto-end, reaper) cannot
    /// double-fire.
    #[instrument(skip_all, name = "conf.repo.end_conference", fields(conference_id = %conference_id))]
    pub async fn end_conference(
        pool: &PgPool,
        conference_id: Uuid,
    ) -> Result<Option<EndedConference>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, EndedConference>(
            r#"
            WITH ended AS (
                UPDATE conferences
                SET status = 'ended', ended_at = NOW(), updated_at = NOW()
                WHERE conference_id = $1 AND status = 'active'
                RETURNING conference_id, chat_id, started_at, ended_at
            ),
            released AS (
                UPDATE participants p
                SET status = 'left', left_at = NOW(), updated_at = NOW()
                FROM ended e
                WHERE p.conference_id = e.conference_id
                  AND p.status IN ('connecting', 'joined')
                RETURNING p.participant_id
            )
            SELECT
                e.conference_id, e.chat_id, e.started_at, e.ended_at,
                (SELECT COUNT(*) FROM released) AS released
            FROM ended e
            "#,
        )
        .bind(conference_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("end_conference", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("end_conference", "success", start.elapsed());
        Ok(row)
    }

    /// Cancel a scheduled conference.
    ///
    /// Returns `false` when the conference was not in `scheduled` status.
    #[instrument(skip_all, name = "conf.repo.cancel", fields(conference_id = %conference_id))]
    pub async fn cancel(pool: &PgPool, conference_id: Uuid) -> Result<bool, ConfError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            UPDATE conferences
            SET status = 'cancelled', updated_at = NOW()
            WHERE conference_id = $1 AND status = 'scheduled'
            "#,
        )
        .bind(conference_id)
        .execute(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("cancel_conference", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("cancel_conference", "success", start.elapsed());
        Ok(result.rows_affected() > 0)
    }

    /// Cancel every other still-scheduled occurrence of a series.
    ///
    /// Occurrences that already ran (or were individually cancelled) are
    /// untouched.
    #[instrument(skip_all, name = "conf.repo.cancel_series", fields(series_id = %series_id))]
    pub async fn cancel_series(
        pool: &PgPool,
        series_id: Uuid,
        exclude_conference_id: Uuid,
    ) -> Result<u64, ConfError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            UPDATE conferences
            SET status = 'cancelled', updated_at = NOW()
            WHERE series_id = $1
              AND conference_id != $2
              AND status = 'scheduled'
            "#,
        )
        .bind(series_id)
        .bind(exclude_conference_id)
        .execute(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("cancel_series", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("cancel_series", "success", start.elapsed());
        Ok(result.rows_affected())
    }

    /// Force-end stale active conferences (reaper sweep).
    ///
    /// A conference is stale when it has been active longer than
    /// `max_age_hours`, or when it has had zero active participants and
    /// started more than `empty_grace_seconds` ago. Participants and
    /// conference rows transition in the same statement, so the
    /// intermediate "participants released, conference still active" state
    /// is never observable.
    ///
    /// Returns the number of conferences ended.
    #[instrument(skip_all, name = "conf.repo.force_end_stale")]
    pub async fn force_end_stale(
        pool: &PgPool,
        max_age_hours: i64,
        empty_grace_seconds: i64,
    ) -> Result<u64, ConfError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            WITH stale AS (
                SELECT c.conference_id
                FROM conferences c
                WHERE c.status = 'active'
                  AND (
                    COALESCE(c.started_at, c.created_at)
                        < NOW() - ($1 || ' hours')::INTERVAL
                    OR (
                        COALESCE(c.started_at, c.created_at)
                            < NOW() - ($2 || ' seconds')::INTERVAL
                        AND NOT EXISTS (
                            SELECT 1 FROM participants p
                            WHERE p.conference_id = c.conference_id
                              AND p.status IN ('connecting', 'joined')
                        )
                    )
                  )
                FOR UPDATE SKIP LOCKED
            ),
            released AS (
                UPDATE participants p
                SET status = 'left', left_at = NOW(), updated_at = NOW()
                FROM stale s
                WHERE p.conference_id = s.conference_id
                  AND p.status IN ('connecting', 'joined')
            )
            UPDATE conferences c
            SET status = 'ended', ended_at = NOW(), updated_at = NOW()
            FROM stale s
            WHERE c.conference_id = s.conference_id
            "#,
        )
        .bind(max_age_hours.to_string())
        .bind(empty_grace_seconds.to_string())
        .execute(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("force_end_stale", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("force_end_stale", "success", start.elapsed());
        Ok(result.rows_affected())
    }
}

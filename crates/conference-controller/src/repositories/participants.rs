//! Participants repository for database operations.
//!
//! The add-or-get-active operation is the concurrency linchpin: a single
//! INSERT guarded by the capacity CTE and the partial unique index on
//! active rows. Two concurrent joins for the same user collapse to exactly
//! one active row; a plain check-then-insert is never used.

use crate::errors::ConfError;
use crate::models::ParticipantRow;
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Attributes of a participant row being inserted.
#[derive(Debug, Clone)]
pub struct NewParticipant {
    /// Initial status: `connecting` for invites, `joined` for the creator.
    pub status: &'static str,

    /// Role within the conference.
    pub role: &'static str,

    /// Initial RSVP status.
    pub rsvp_status: &'static str,

    /// Whether the member starts muted.
    pub is_muted: bool,

    /// Display name recorded at insert time.
    pub display_name: Option<String>,
}

/// Outcome of the idempotent add-or-get-active operation.
#[derive(Debug, Clone)]
pub enum AddOutcome {
    /// A new row was inserted; side effects (events, notices) are due.
    Created(ParticipantRow),

    /// An active row already existed; it is returned unchanged and no
    /// side effects are due.
    Existing(ParticipantRow),
}

impl AddOutcome {
    /// The row regardless of outcome.
    #[must_use]
    pub fn row(&self) -> &ParticipantRow {
        match self {
            AddOutcome::Created(row) | AddOutcome::Existing(row) => row,
        }
    }

    /// Whether a new row was inserted.
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, AddOutcome::Created(_))
    }
}

/// Participants repository for database operations.
pub struct ParticipantsRepository;

impl ParticipantsRepository {
    /// Insert a participant if the user has no active row, else return the
    /// existing active row.
    ///
    /// Uses a single CTE statement that atomically:
    /// 1. Verifies the conference exists in one of `allowed_statuses`
    /// 2. Counts active participants
    /// 3. Inserts only if under `max_members`
    /// 4. Defers to the partial unique index on active rows for duplicates
    ///
    /// When the insert returns no row, the cause is classified by
    /// re-reading state: an existing active row (idempotent success),
    /// a missing/ineligible conference, or a full conference.
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `conference_id` - Target conference
    /// * `user_id` - Joining/invited user
    /// * `allowed_statuses` - Conference statuses the insert is valid in
    ///   (`["active"]` for joins, `["scheduled", "active"]` for roster adds)
    /// * `new` - Attributes of the row to insert
    #[instrument(
        skip_all,
        name = "conf.repo.add_or_get_active",
        fields(conference_id = %conference_id, user_id = %user_id)
    )]
    pub async fn add_or_get_active(
        pool: &PgPool,
        conference_id: Uuid,
        user_id: Uuid,
        allowed_statuses: &[&str],
        new: &NewParticipant,
    ) -> Result<AddOutcome, ConfError> {
        let start = Instant::now();
        let allowed: Vec<String> = allowed_statuses.iter().map(|s| (*s).to_string()).collect();

        let inserted = sqlx::query_as::<_, ParticipantRow>(
            r#"
            WITH conf AS (
                SELECT conference_id, max_members
                FROM conferences
                WHERE conference_id = $1 AND status = ANY($2)
            ),
            active AS (
                SELECT COUNT(*) AS cnt
                FROM participants
                WHERE conference_id = $1 AND status IN ('connecting', 'joined')
            )
            INSERT INTO participants (
                conference_id, user_id, status, role, rsvp_status,
                is_muted, display_name, joined_at
            )
            SELECT
                c.conference_id, $3, $4, $5, $6, $7, $8,
                CASE WHEN $4 = 'joined' THEN NOW() END
            FROM conf c, active a
            WHERE a.cnt < c.max_members
            ON CONFLICT (conference_id, user_id)
                WHERE status IN ('connecting', 'joined')
                DO NOTHING
            RETURNING *
            "#,
        )
        .bind(conference_id)
        .bind(&allowed)
        .bind(user_id)
        .bind(new.status)
        .bind(new.role)
        .bind(new.rsvp_status)
        .bind(new.is_muted)
        .bind(&new.display_name)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("add_participant", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        if let Some(row) = inserted {
            metrics::record_db_query("add_participant", "success", start.elapsed());
            return Ok(AddOutcome::Created(row));
        }

        // No row inserted: either the user already has an active row
        // (idempotent path), or the guard rejected the insert. Classify.
        if let Some(existing) = Self::get_active(pool, conference_id, user_id).await? {
            metrics::record_db_query("add_participant", "success", start.elapsed());
            return Ok(AddOutcome::Existing(existing));
        }

        let conference: Option<(String, i32)> = sqlx::query_as(
            "SELECT status, max_members FROM conferences WHERE conference_id = $1",
        )
        .bind(conference_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ConfError::Database(e.to_string()))?;

        metrics::record_db_query("add_participant", "success", start.elapsed());

        match conference {
            None => Err(ConfError::NotFound("Conference not found".to_string())),
            Some((status, max_members)) => {
                if !allowed_statuses.contains(&status.as_str()) {
                    return Err(ConfError::InvalidState(format!(
                        "Conference is {status}"
                    )));
                }
                let count = Self::count_active(pool, conference_id).await?;
                if count >= i64::from(max_members) {
                    Err(ConfError::CapacityExceeded(
                        "Conference is full".to_string(),
                    ))
                } else {
                    // Lost a race with a concurrent membership change.
                    Err(ConfError::Conflict(
                        "Concurrent membership change, retry".to_string(),
                    ))
                }
            }
        }
    }

    /// Fetch a user's active participant row, if any.
    #[instrument(
        skip_all,
        name = "conf.repo.get_active_participant",
        fields(conference_id = %conference_id, user_id = %user_id)
    )]
    pub async fn get_active(
        pool: &PgPool,
        conference_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ParticipantRow>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT * FROM participants
            WHERE conference_id = $1 AND user_id = $2
              AND status IN ('connecting', 'joined')
            "#,
        )
        .bind(conference_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("get_active_participant", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("get_active_participant", "success", start.elapsed());
        Ok(row)
    }

    /// List active participants of a conference.
    #[instrument(skip_all, name = "conf.repo.list_active_participants", fields(conference_id = %conference_id))]
    pub async fn list_active(
        pool: &PgPool,
        conference_id: Uuid,
    ) -> Result<Vec<ParticipantRow>, ConfError> {
        let start = Instant::now();

        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT * FROM participants
            WHERE conference_id = $1 AND status IN ('connecting', 'joined')
            ORDER BY created_at ASC
            "#,
        )
        .bind(conference_id)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_active_participants", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_active_participants", "success", start.elapsed());
        Ok(rows)
    }

    /// List every participant row of a conference, including history.
    #[instrument(skip_all, name = "conf.repo.list_all_participants", fields(conference_id = %conference_id))]
    pub async fn list_all(
        pool: &PgPool,
        conference_id: Uuid,
    ) -> Result<Vec<ParticipantRow>, ConfError> {
        let start = Instant::now();

        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT * FROM participants WHERE conference_id = $1 ORDER BY created_at ASC",
        )
        .bind(conference_id)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_all_participants", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_all_participants", "success", start.elapsed());
        Ok(rows)
    }

    /// Count active participants of a conference.
    #[instrument(skip_all, name = "conf.repo.count_active", fields(conference_id = %conference_id))]
    pub async fn count_active(pool: &PgPool, conference_id: Uuid) -> Result<i64, ConfError> {
        let start = Instant::now();

        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM participants
            WHERE conference_id = $1 AND status IN ('connecting', 'joined')
            "#,
        )
        .bind(conference_id)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("count_active", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("count_active", "success", start.elapsed());
        Ok(count.0)
    }

    /// Transition a user's active row to `joined` once the bridge confirms
    /// presence, recording the live bridge handles.
    #[instrument(
        skip_all,
        name = "conf.repo.mark_joined",
        fields(conference_id = %conference_id, user_id = %user_id)
    )]
    pub async fn mark_joined(
        pool: &PgPool,
        conference_id: Uuid,
        user_id: Uuid,
        member_handle: &str,
        channel_handle: Option<&str>,
    ) -> Result<Option<ParticipantRow>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, ParticipantRow>(
            r#"
            UPDATE participants
            SET status = 'joined', member_handle = $3, channel_handle = $4,
                joined_at = COALESCE(joined_at, NOW()), updated_at = NOW()
            WHERE conference_id = $1 AND user_id = $2
              AND status IN ('connecting', 'joined')
            RETURNING *
            "#,
        )
        .bind(conference_id)
        .bind(user_id)
        .bind(member_handle)
        .bind(channel_handle)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("mark_joined", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("mark_joined", "success", start.elapsed());
        Ok(row)
    }

    /// Mark a user's active row as `left`.
    ///
    /// Returns `None` when the user has no active row (already left or
    /// never present) - concurrent leave paths are a no-op.
    #[instrument(
        skip_all,
        name = "conf.repo.mark_left",
        fields(conference_id = %conference_id, user_id = %user_id)
    )]
    pub async fn mark_left(
        pool: &PgPool,
        conference_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ParticipantRow>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, ParticipantRow>(
            r#"
            UPDATE participants
            SET status = 'left', left_at = NOW(), updated_at = NOW()
            WHERE conference_id = $1 AND user_id = $2
              AND status IN ('connecting', 'joined')
            RETURNING *
            "#,
        )
        .bind(conference_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("mark_left", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("mark_left", "success", start.elapsed());
        Ok(row)
    }

    /// Mark a user's active row as `kicked`.
    #[instrument(
        skip_all,
        name = "conf.repo.mark_kicked",
        fields(conference_id = %conference_id, user_id = %user_id)
    )]
    pub async fn mark_kicked(
        pool: &PgPool,
        conference_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ParticipantRow>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, ParticipantRow>(
            r#"
            UPDATE participants
            SET status = 'kicked', left_at = NOW(), updated_at = NOW()
            WHERE conference_id = $1 AND user_id = $2
              AND status IN ('connecting', 'joined')
            RETURNING *
            "#,
        )
        .bind(conference_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("mark_kicked", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("mark_kicked", "success", start.elapsed());
        Ok(row)
    }

    /// Persist a participant's mute state.
    #[instrument(
        skip_all,
        name = "conf.repo.update_mute",
        fields(conference_id = %conference_id, user_id = %user_id, muted = muted)
    )]
    pub async fn update_mute(
        pool: &PgPool,
        conference_id: Uuid,
        user_id: Uuid,
        muted: bool,
    ) -> Result<Option<ParticipantRow>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, ParticipantRow>(
            r#"
            UPDATE participants
            SET is_muted = $3, updated_at = NOW()
            WHERE conference_id = $1 AND user_id = $2
              AND status IN ('connecting', 'joined')
            RETURNING *
            "#,
        )
        .bind(conference_id)
        .bind(user_id)
        .bind(muted)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("update_mute", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("update_mute", "success", start.elapsed());
        Ok(row)
    }

    /// Change a participant's role.
    #[instrument(
        skip_all,
        name = "conf.repo.update_role",
        fields(conference_id = %conference_id, user_id = %user_id, role = %role)
    )]
    pub async fn update_role(
        pool: &PgPool,
        conference_id: Uuid,
        user_id: Uuid,
        role: &str,
    ) -> Result<Option<ParticipantRow>, ConfError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, ParticipantRow>(
            r#"
            UPDATE participants
            SET role = $3, updated_at = NOW()
            WHERE conference_id = $1 AND user_id = $2
              AND status IN ('connecting', 'joined')
            RETURNING *
            "#,
        )
        .bind(conference_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("update_role", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("update_role", "success", start.elapsed());
        Ok(row)
    }

    /// Update a participant's RSVP and the conference's denormalized
    /// accepted/declined counters in one transaction.
    #[instrument(
        skip_all,
        name = "conf.repo.update_rsvp",
        fields(conference_id = %conference_id, user_id = %user_id, status = %rsvp_status)
    )]
    pub async fn update_rsvp(
        pool: &PgPool,
        conference_id: Uuid,
        user_id: Uuid,
        rsvp_status: &str,
    ) -> Result<Option<ParticipantRow>, ConfError> {
        let start = Instant::now();

        let result: Result<Option<ParticipantRow>, sqlx::Error> = async {
            let mut tx = pool.begin().await?;

            let previous: Option<(String,)> = sqlx::query_as(
                r#"
                SELECT rsvp_status FROM participants
                WHERE conference_id = $1 AND user_id = $2
                  AND status IN ('connecting', 'joined')
                FOR UPDATE
                "#,
            )
            .bind(conference_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some((old_status,)) = previous else {
                return Ok(None);
            };

            let row = sqlx::query_as::<_, ParticipantRow>(
                r#"
                UPDATE participants
                SET rsvp_status = $3, rsvp_at = NOW(), updated_at = NOW()
                WHERE conference_id = $1 AND user_id = $2
                  AND status IN ('connecting', 'joined')
                RETURNING *
                "#,
            )
            .bind(conference_id)
            .bind(user_id)
            .bind(rsvp_status)
            .fetch_one(&mut *tx)
            .await?;

            let accepted_delta =
                i32::from(rsvp_status == "accepted") - i32::from(old_status == "accepted");
            let declined_delta =
                i32::from(rsvp_status == "declined") - i32::from(old_status == "declined");

            if accepted_delta != 0 || declined_delta != 0 {
                sqlx::query(
                    r#"
                    UPDATE conferences
                    SET accepted_count = accepted_count + $2,
                        declined_count = declined_count + $3,
                        updated_at = NOW()
                    WHERE conference_id = $1
                    "#,
                )
                .bind(conference_id)
                .bind(accepted_delta)
                .bind(declined_delta)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(Some(row))
        }
        .await;

        match result {
            Ok(row) => {
                metrics::record_db_query("update_rsvp", "success", start.elapsed());
                Ok(row)
            }
            Err(e) => {
                metrics::record_db_query("update_rsvp", "error", start.elapsed());
                Err(ConfError::Database(e.to_string()))
            }
        }
    }

    /// Reclaim participant rows stuck in `connecting` (reaper sweep).
    ///
    /// Returns the number of rows reclaimed.
    #[instrument(skip_all, name = "conf.repo.reclaim_stale_connecting")]
    pub async fn reclaim_stale_connecting(
        pool: &PgPool,
        timeout_seconds: i64,
    ) -> Result<u64, ConfError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            UPDATE participants
            SET status = 'left', left_at = NOW(), updated_at = NOW()
            WHERE status = 'connecting'
              AND created_at < NOW() - ($1 || ' seconds')::INTERVAL
            "#,
        )
        .bind(timeout_seconds.to_string())
        .execute(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("reclaim_stale_connecting", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("reclaim_stale_connecting", "success", start.elapsed());
        Ok(result.rows_affected())
    }
}

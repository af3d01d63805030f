//! Moderator actions repository - append-only audit log.
//!
//! Removal/kick-class actions are recorded to support after-the-fact abuse
//! review. Audit failures are logged by callers but never block the
//! moderation operation itself.

use crate::errors::ConfError;
use crate::models::ModeratorActionRow;
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Default audit listing page size.
pub const DEFAULT_AUDIT_PAGE_SIZE: i64 = 50;

/// Moderator actions repository for database operations.
pub struct ModeratorActionsRepository;

impl ModeratorActionsRepository {
    /// Append an audit record.
    #[instrument(
        skip_all,
        name = "conf.repo.append_moderator_action",
        fields(conference_id = %conference_id, action = %action)
    )]
    pub async fn append(
        pool: &PgPool,
        conference_id: Uuid,
        actor_user_id: Uuid,
        target_user_id: Uuid,
        action: &str,
        details: Option<serde_json::Value>,
    ) -> Result<(), ConfError> {
        let start = Instant::now();

        sqlx::query(
            r#"
            INSERT INTO moderator_actions (
                conference_id, actor_user_id, target_user_id, action, details
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(conference_id)
        .bind(actor_user_id)
        .bind(target_user_id)
        .bind(action)
        .bind(details)
        .execute(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("append_moderator_action", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("append_moderator_action", "success", start.elapsed());
        Ok(())
    }

    /// List audit records for a conference, newest first.
    #[instrument(skip_all, name = "conf.repo.list_moderator_actions", fields(conference_id = %conference_id))]
    pub async fn list(
        pool: &PgPool,
        conference_id: Uuid,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<ModeratorActionRow>, ConfError> {
        let start = Instant::now();

        let rows = sqlx::query_as::<_, ModeratorActionRow>(
            r#"
            SELECT * FROM moderator_actions
            WHERE conference_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conference_id)
        .bind(page_size)
        .bind(page * page_size)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_moderator_actions", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_moderator_actions", "success", start.elapsed());
        Ok(rows)
    }
}

//! Bridge contact directory repository.
//!
//! The presence subsystem maintains `user_contacts`; this controller only
//! reads it to resolve invitation targets for the fan-out.

use crate::errors::ConfError;
use crate::models::UserContactRow;
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Contacts repository for database operations.
pub struct ContactsRepository;

impl ContactsRepository {
    /// Fetch the bridge contacts registered for the given users.
    ///
    /// Users with no registered contact are simply absent from the result;
    /// the fan-out skips them.
    #[instrument(skip_all, name = "conf.repo.get_bridge_contacts", fields(count = user_ids.len()))]
    pub async fn get_bridge_contacts(
        pool: &PgPool,
        user_ids: &[Uuid],
    ) -> Result<Vec<UserContactRow>, ConfError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();

        let rows = sqlx::query_as::<_, UserContactRow>(
            r#"
            SELECT user_id, bridge_address, bridge_domain, display_name
            FROM user_contacts
            WHERE user_id = ANY($1)
            "#,
        )
        .bind(user_ids)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("get_bridge_contacts", "error", start.elapsed());
            ConfError::Database(e.to_string())
        })?;

        metrics::record_db_query("get_bridge_contacts", "success", start.elapsed());
        Ok(rows)
    }
}

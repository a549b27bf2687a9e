//! Current resource path per (context, user).

use async_trait::async_trait;
use chrono::Utc;
use launchgate_core::Result;
use launchgate_provider::{ContextPathStore, StoreError};
use sqlx::PgPool;
use tracing::instrument;

use super::unavailable;

/// Context path store backed by the `lti_context_paths` table.
pub struct PgContextPathStore {
    pool: PgPool,
}

impl PgContextPathStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContextPathStore for PgContextPathStore {
    async fn get(&self, context_id: &str, user: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT path FROM lti_context_paths
            WHERE context_id = $1 AND user_id = $2
            "#,
        )
        .bind(context_id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(row.map(|(path,)| path))
    }

    #[instrument(skip(self))]
    async fn set(&self, context_id: &str, user: &str, path: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO lti_context_paths (context_id, user_id, path, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (context_id, user_id) DO UPDATE
            SET path = EXCLUDED.path, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(context_id)
        .bind(user)
        .bind(path)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }
}

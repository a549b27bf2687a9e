//! Seen identity token nonces.

use async_trait::async_trait;
use launchgate_core::Result;
use launchgate_provider::{NonceStore, StoreError};
use sqlx::PgPool;
use std::time::Duration;

use super::{expires_at, unavailable};

/// Nonce store backed by the `lti_nonces` table.
pub struct PgNonceStore {
    pool: PgPool,
}

impl PgNonceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes expired nonces. Returns the number deleted.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM lti_nonces WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl NonceStore for PgNonceStore {
    async fn claim(&self, nonce: &str, ttl: Duration) -> Result<bool, StoreError> {
        // An expired row is taken over; a live one makes the upsert a no-op
        // that returns nothing.
        let claimed: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO lti_nonces (nonce, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (nonce) DO UPDATE
            SET expires_at = EXCLUDED.expires_at
            WHERE lti_nonces.expires_at <= now()
            RETURNING nonce
            "#,
        )
        .bind(nonce)
        .bind(expires_at(ttl)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(claimed.is_some())
    }
}

//! In-flight login attempts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use launchgate_core::Result;
use launchgate_provider::{StateRecord, StateReplayStore, StoreError};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::instrument;

use super::{expires_at, unavailable};

#[derive(FromRow)]
struct StateRow {
    state: String,
    issuer: String,
    query: serde_json::Value,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl StateRow {
    fn try_into_record(self) -> std::result::Result<StateRecord, StoreError> {
        let query: BTreeMap<String, String> =
            serde_json::from_value(self.query).map_err(|e| StoreError::Corrupt {
                details: format!("invalid queued query for state {}: {e}", self.state),
            })?;
        Ok(StateRecord {
            state: self.state,
            issuer: self.issuer,
            query,
            created_at: self.created_at,
        })
    }
}

/// State store backed by the `lti_states` table.
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes expired login attempts. Returns the number deleted.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM lti_states WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StateReplayStore for PgStateStore {
    #[instrument(skip(self, record), fields(state = %record.state))]
    async fn put(&self, record: StateRecord, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = expires_at(ttl)?;
        let query = serde_json::to_value(&record.query).map_err(|e| StoreError::Corrupt {
            details: e.to_string(),
        })?;
        sqlx::query(
            r#"
            INSERT INTO lti_states (state, issuer, query, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (state) DO UPDATE
            SET issuer = EXCLUDED.issuer,
                query = EXCLUDED.query,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&record.state)
        .bind(&record.issuer)
        .bind(&query)
        .bind(record.created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    /// One `DELETE ... RETURNING`: of two racing callers only one gets the row.
    #[instrument(skip(self))]
    async fn consume(&self, state: &str) -> Result<Option<StateRecord>, StoreError> {
        let row: Option<StateRow> = sqlx::query_as(
            r#"
            DELETE FROM lti_states
            WHERE state = $1
            RETURNING state, issuer, query, created_at, expires_at
            "#,
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match row {
            Some(row) if row.expires_at > Utc::now() => Ok(Some(row.try_into_record()?)),
            _ => Ok(None),
        }
    }
}

//! Platform registrations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use launchgate_core::{PlatformId, Result};
use launchgate_provider::{AuthConfig, Platform, PlatformRegistry, StoreError};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

use super::unavailable;

/// Row type for platform queries.
#[derive(FromRow)]
struct PlatformRow {
    id: String,
    issuer: String,
    client_id: String,
    name: String,
    auth_endpoint: String,
    access_token_endpoint: String,
    auth_method: String,
    auth_key: String,
    active: bool,
}

impl PlatformRow {
    fn try_into_platform(self) -> std::result::Result<Platform, StoreError> {
        let id = PlatformId::from_str(&self.id).map_err(|e| StoreError::Corrupt {
            details: format!("invalid platform id '{}': {e}", self.id),
        })?;
        let auth_config = match self.auth_method.as_str() {
            "RSA_KEY" => AuthConfig::RsaKey(self.auth_key),
            "JWK_KEY" => AuthConfig::JwkKey(self.auth_key),
            "JWK_SET" => AuthConfig::JwkSet(self.auth_key),
            other => {
                return Err(StoreError::Corrupt {
                    details: format!("unknown auth method '{other}' for platform {}", self.id),
                });
            }
        };

        Ok(Platform::with_all_fields(
            id,
            self.issuer,
            self.client_id,
            self.name,
            self.auth_endpoint,
            self.access_token_endpoint,
            auth_config,
            self.active,
        ))
    }
}

fn auth_columns(config: &AuthConfig) -> (&'static str, &str) {
    match config {
        AuthConfig::RsaKey(key) => ("RSA_KEY", key.as_str()),
        AuthConfig::JwkKey(key) => ("JWK_KEY", key.as_str()),
        AuthConfig::JwkSet(url) => ("JWK_SET", url.as_str()),
    }
}

/// Registry backed by the `lti_platforms` table.
pub struct PgPlatformRegistry {
    pool: PgPool,
}

impl PgPlatformRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates or replaces the registration for (issuer, client id).
    ///
    /// An existing registration keeps its id.
    #[instrument(skip(self, platform), fields(issuer = platform.issuer()))]
    pub async fn upsert(&self, platform: &Platform) -> Result<(), StoreError> {
        let (auth_method, auth_key) = auth_columns(platform.auth_config());
        let now: DateTime<Utc> = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO lti_platforms
                (id, issuer, client_id, name, auth_endpoint, access_token_endpoint,
                 auth_method, auth_key, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            ON CONFLICT (issuer, client_id) DO UPDATE
            SET name = EXCLUDED.name,
                auth_endpoint = EXCLUDED.auth_endpoint,
                access_token_endpoint = EXCLUDED.access_token_endpoint,
                auth_method = EXCLUDED.auth_method,
                auth_key = EXCLUDED.auth_key,
                active = EXCLUDED.active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(platform.id().to_string())
        .bind(platform.issuer())
        .bind(platform.client_id())
        .bind(platform.name())
        .bind(platform.auth_endpoint())
        .bind(platform.access_token_endpoint())
        .bind(auth_method)
        .bind(auth_key)
        .bind(platform.is_active())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }
}

#[async_trait]
impl PlatformRegistry for PgPlatformRegistry {
    #[instrument(skip(self))]
    async fn find(&self, issuer: &str, client_id: Option<&str>) -> Result<Vec<Platform>, StoreError> {
        let rows: Vec<PlatformRow> = sqlx::query_as(
            r#"
            SELECT id, issuer, client_id, name, auth_endpoint, access_token_endpoint,
                   auth_method, auth_key, active
            FROM lti_platforms
            WHERE issuer = $1 AND ($2::TEXT IS NULL OR client_id = $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(issuer)
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .into_iter()
            .map(PlatformRow::try_into_platform)
            .collect::<std::result::Result<Vec<_>, StoreError>>()?)
    }
}

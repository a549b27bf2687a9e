//! Registered platforms and their resolution during login.
//!
//! Platforms (LMSs) live in an external registry. The provider only reads
//! them: to find the authentication endpoint during login and to pick the
//! verification key for identity tokens.

use async_trait::async_trait;
use launchgate_core::{PlatformId, Result};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::debug;

use crate::error::{LoginError, StoreError};

/// How identity tokens from a platform are verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "key", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthConfig {
    /// A PEM-encoded RSA public key.
    RsaKey(String),
    /// A single JWK, serialized as JSON.
    JwkKey(String),
    /// URL of the platform's published JWK set.
    JwkSet(String),
}

/// A platform registered with this tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    id: PlatformId,
    issuer: String,
    client_id: String,
    name: String,
    auth_endpoint: String,
    access_token_endpoint: String,
    auth_config: AuthConfig,
    active: bool,
}

impl Platform {
    /// Creates an active platform registration.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        name: impl Into<String>,
        auth_endpoint: impl Into<String>,
        access_token_endpoint: impl Into<String>,
        auth_config: AuthConfig,
    ) -> Self {
        Self {
            id: PlatformId::new(),
            issuer: issuer.into(),
            client_id: client_id.into(),
            name: name.into(),
            auth_endpoint: auth_endpoint.into(),
            access_token_endpoint: access_token_endpoint.into(),
            auth_config,
            active: true,
        }
    }

    /// Reconstructs a platform from stored fields.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn with_all_fields(
        id: PlatformId,
        issuer: String,
        client_id: String,
        name: String,
        auth_endpoint: String,
        access_token_endpoint: String,
        auth_config: AuthConfig,
        active: bool,
    ) -> Self {
        Self {
            id,
            issuer,
            client_id,
            name,
            auth_endpoint,
            access_token_endpoint,
            auth_config,
            active,
        }
    }

    /// Returns a copy with the active flag set.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    #[must_use]
    pub fn id(&self) -> PlatformId {
        self.id
    }

    /// The platform's issuer URL (`iss` of its identity tokens).
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The client id this tool was registered under.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OIDC authorization endpoint the login flow redirects to.
    #[must_use]
    pub fn auth_endpoint(&self) -> &str {
        &self.auth_endpoint
    }

    #[must_use]
    pub fn access_token_endpoint(&self) -> &str {
        &self.access_token_endpoint
    }

    #[must_use]
    pub fn auth_config(&self) -> &AuthConfig {
        &self.auth_config
    }

    /// Returns true if launches from this platform are accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Read access to the platform registry.
#[async_trait]
pub trait PlatformRegistry: Send + Sync {
    /// Returns every platform registered for `issuer`, narrowed to
    /// `client_id` when one is given.
    async fn find(&self, issuer: &str, client_id: Option<&str>)
    -> Result<Vec<Platform>, StoreError>;
}

/// Resolves exactly one platform for a login attempt.
///
/// Several registrations may share an issuer with different client ids.
/// Without a client id such a login is rejected as ambiguous rather than
/// bound to whichever registration happens to be stored first.
pub async fn resolve_platform(
    registry: &dyn PlatformRegistry,
    issuer: &str,
    client_id: Option<&str>,
) -> Result<Platform, LoginError> {
    let mut found = registry
        .find(issuer, client_id)
        .await
        .map_err(|e| LoginError::Internal {
            details: e.to_string(),
        })?;

    debug!(issuer, client_id, matches = found.len(), "resolved platforms");

    match found.len() {
        0 => Err(LoginError::UnregisteredPlatform {
            issuer: issuer.to_string(),
        }
        .into()),
        1 => Ok(found.remove(0)),
        candidates => Err(LoginError::AmbiguousPlatform {
            issuer: issuer.to_string(),
            candidates,
        }
        .into()),
    }
}

/// In-process registry, used by tests and database-less deployments.
#[derive(Debug, Default)]
pub struct MemoryPlatformRegistry {
    platforms: RwLock<Vec<Platform>>,
}

impl MemoryPlatformRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the registration for (issuer, client id).
    pub fn register(&self, platform: Platform) {
        let mut platforms = self.platforms.write().unwrap_or_else(|e| e.into_inner());
        platforms.retain(|p| {
            !(p.issuer == platform.issuer && p.client_id == platform.client_id)
        });
        platforms.push(platform);
    }
}

#[async_trait]
impl PlatformRegistry for MemoryPlatformRegistry {
    async fn find(
        &self,
        issuer: &str,
        client_id: Option<&str>,
    ) -> Result<Vec<Platform>, StoreError> {
        let platforms = self.platforms.read().unwrap_or_else(|e| e.into_inner());
        Ok(platforms
            .iter()
            .filter(|p| p.issuer == issuer)
            .filter(|p| client_id.is_none_or(|id| p.client_id == id))
            .cloned()
            .collect())
    }
}

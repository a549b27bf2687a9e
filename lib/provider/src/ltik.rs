//! The ltik: the signed session token minted after a successful launch.
//!
//! An ltik is an HS256 JWT signed with the process-wide secret. It carries
//! the platform registration, the user and a snapshot of the verified launch,
//! and substitutes for re-verifying the identity token on later requests.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigurationError, LaunchError};
use crate::launch::LaunchContext;

/// Lifetime of a minted ltik, in seconds.
pub const LTIK_LIFETIME_SECONDS: i64 = 24 * 60 * 60;

const MIN_KEY_LEN: usize = 32;

/// The process-wide signing secret.
///
/// The same secret signs ltiks and the provider's cookies, so it must be long
/// enough for cookie key derivation.
#[derive(Clone)]
pub struct SigningKey(Arc<[u8]>);

impl SigningKey {
    /// Wraps a secret, rejecting empty or short ones.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigurationError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(ConfigurationError::MissingSigningKey);
        }
        if secret.len() < MIN_KEY_LEN {
            return Err(ConfigurationError::WeakSigningKey { len: secret.len() });
        }
        Ok(Self(Arc::from(secret)))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Mints an ltik for a verified launch.
    pub fn mint(&self, launch: &LaunchContext) -> Result<Ltik, LaunchError> {
        let now = Utc::now();
        let claims = LtikClaims {
            platform_url: launch.platform.issuer.clone(),
            client_id: launch.platform.client_id.clone(),
            deployment_id: launch.platform.deployment_id.clone(),
            platform_code: launch.platform.platform_code.clone(),
            context_id: launch.context_id(),
            user: launch.user.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + LTIK_LIFETIME_SECONDS,
            launch: launch.clone(),
        };
        self.sign(&claims)
    }

    /// Signs arbitrary ltik claims.
    pub fn sign(&self, claims: &LtikClaims) -> Result<Ltik, LaunchError> {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(&self.0),
        )
        .map(Ltik)
        .map_err(|e| LaunchError::session(format!("failed to sign ltik: {e}")))
    }

    /// Verifies an ltik's signature and expiry.
    pub fn verify(&self, ltik: &str) -> Result<LtikClaims, LaunchError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        jsonwebtoken::decode::<LtikClaims>(ltik, &DecodingKey::from_secret(&self.0), &validation)
            .map(|data| data.claims)
            .map_err(|e| LaunchError::session(e.to_string()))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningKey").field(&"<redacted>").finish()
    }
}

/// Claims carried by an ltik.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LtikClaims {
    pub platform_url: String,
    pub client_id: String,
    pub deployment_id: String,
    pub platform_code: String,
    pub context_id: String,
    pub user: String,
    pub iat: i64,
    pub exp: i64,
    pub launch: LaunchContext,
}

/// An encoded ltik.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ltik(String);

impl Ltik {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ltik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

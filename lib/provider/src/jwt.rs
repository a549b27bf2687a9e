//! Reference validators: RSA-signed identity tokens and HS256 ltiks.
//!
//! Security properties:
//! - The identity token's `alg` must be RS256; platforms sign with RSA keys.
//! - JWK sets are cached per URL and refetched once when a `kid` is unknown.
//! - A nonce is accepted once, and remembered at least until the identity
//!   token expires; replaying it fails even when its state record and
//!   cookie were already cleared.
//! - Clock leeway of 5 seconds on `exp`.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use dashmap::DashMap;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use launchgate_core::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::context_path::ContextPathStore;
use crate::error::LaunchError;
use crate::launch::LaunchContext;
use crate::nonce::{NONCE_TTL, NonceStore};
use crate::platform::{AuthConfig, Platform, PlatformRegistry};
use crate::validator::{
    IdentityTokenValidator, IdentityValidation, SessionTokenValidator, SessionValidation,
    ValidatedLaunch,
};

const LEEWAY_SECONDS: u64 = 5;

/// Validates identity tokens against the platform registry.
pub struct JwtIdentityValidator {
    registry: Arc<dyn PlatformRegistry>,
    nonces: Arc<dyn NonceStore>,
    paths: Arc<dyn ContextPathStore>,
    http: reqwest::Client,
    jwks: DashMap<String, JwkSet>,
}

impl JwtIdentityValidator {
    #[must_use]
    pub fn new(
        registry: Arc<dyn PlatformRegistry>,
        nonces: Arc<dyn NonceStore>,
        paths: Arc<dyn ContextPathStore>,
    ) -> Self {
        Self {
            registry,
            nonces,
            paths,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            jwks: DashMap::new(),
        }
    }

    async fn platform_for(&self, issuer: &str, audience: &[String]) -> Result<Platform, LaunchError> {
        for client_id in audience {
            let mut found = self
                .registry
                .find(issuer, Some(client_id))
                .await
                .map_err(|e| LaunchError::identity(format!("platform lookup failed: {e}")))?;
            if let Some(platform) = found.pop() {
                if !platform.is_active() {
                    return Err(LaunchError::identity(format!("platform {issuer} is not activated")).into());
                }
                return Ok(platform);
            }
        }
        Err(LaunchError::identity(format!("no platform registered for issuer {issuer}")).into())
    }

    async fn decoding_key(
        &self,
        platform: &Platform,
        kid: Option<&str>,
    ) -> Result<DecodingKey, LaunchError> {
        match platform.auth_config() {
            AuthConfig::RsaKey(pem) => DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| LaunchError::identity(format!("invalid platform RSA key: {e}")).into()),
            AuthConfig::JwkKey(json) => {
                let jwk: Jwk = serde_json::from_str(json)
                    .map_err(|e| LaunchError::identity(format!("invalid platform JWK: {e}")))?;
                decoding_key_from_jwk(&jwk)
                    .ok_or_else(|| LaunchError::identity("platform JWK is not an RSA key").into())
            }
            AuthConfig::JwkSet(url) => {
                let kid = kid.ok_or_else(|| LaunchError::identity("identity token has no kid"))?;
                self.key_from_set(url, kid).await
            }
        }
    }

    async fn key_from_set(&self, url: &str, kid: &str) -> Result<DecodingKey, LaunchError> {
        if let Some(key) = self.jwks.get(url).and_then(|set| find_key(&set, kid)) {
            return Ok(key);
        }

        debug!(url, kid, "kid not in cached JWK set, fetching");
        let set = self.fetch_jwks(url).await?;
        let key = find_key(&set, kid);
        self.jwks.insert(url.to_string(), set);
        key.ok_or_else(|| LaunchError::identity(format!("no key {kid} in platform JWK set")).into())
    }

    async fn fetch_jwks(&self, url: &str) -> Result<JwkSet, LaunchError> {
        let fetch_failed = |e: reqwest::Error| LaunchError::identity(format!("failed to fetch JWK set: {e}"));
        let set = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_failed)?
            .json::<JwkSet>()
            .await
            .map_err(fetch_failed)?;
        Ok(set)
    }
}

#[async_trait]
impl IdentityTokenValidator for JwtIdentityValidator {
    #[instrument(skip_all, fields(path = %validation.path))]
    async fn validate(
        &self,
        id_token: &str,
        validation: IdentityValidation<'_>,
    ) -> Result<ValidatedLaunch, LaunchError> {
        let unverified = unverified_claims(id_token)?;
        let issuer = unverified
            .get("iss")
            .and_then(Value::as_str)
            .ok_or_else(|| LaunchError::identity("missing iss"))?
            .to_string();

        match validation.state_cookie {
            Some(cookie) if cookie == issuer => {}
            Some(_) => return Err(LaunchError::identity("state cookie does not match issuer").into()),
            None if validation.dev_mode => {
                warn!(%issuer, "no state cookie, accepted in development mode");
            }
            None => return Err(LaunchError::identity("missing state cookie").into()),
        }

        let audience = audiences(&unverified);
        if audience.is_empty() {
            return Err(LaunchError::identity("missing aud").into());
        }
        let platform = self.platform_for(&issuer, &audience).await?;

        let header = jsonwebtoken::decode_header(id_token)
            .map_err(|e| LaunchError::identity(format!("malformed header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(LaunchError::identity(format!("unsupported algorithm {:?}", header.alg)).into());
        }
        let key = self.decoding_key(&platform, header.kid.as_deref()).await?;

        let mut rules = Validation::new(Algorithm::RS256);
        rules.leeway = LEEWAY_SECONDS;
        rules.set_issuer(&[platform.issuer()]);
        rules.set_audience(&[platform.client_id()]);
        let token = jsonwebtoken::decode::<Value>(id_token, &key, &rules)
            .map_err(|e| LaunchError::identity(e.to_string()))?
            .claims;

        if let Some(max_age) = validation.max_age {
            let iat = token
                .get("iat")
                .and_then(Value::as_i64)
                .ok_or_else(|| LaunchError::identity("missing iat"))?;
            let age = Utc::now().timestamp().saturating_sub(iat);
            if age > i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX) {
                return Err(LaunchError::identity(format!("token is {age}s old")).into());
            }
        }

        let nonce = token
            .get("nonce")
            .and_then(Value::as_str)
            .ok_or_else(|| LaunchError::identity("missing nonce"))?;
        let expires = token.get("exp").and_then(Value::as_i64).unwrap_or_default();
        let fresh = self
            .nonces
            .claim(nonce, nonce_ttl(expires, Utc::now().timestamp()))
            .await
            .map_err(|e| LaunchError::identity(format!("nonce store failed: {e}")))?;
        if !fresh {
            return Err(LaunchError::identity("nonce already used").into());
        }

        let mut context = LaunchContext::from_id_token_claims(&token, platform.client_id())?;
        self.paths
            .set(&context.context_id(), &context.user, validation.path)
            .await
            .map_err(|e| LaunchError::identity(format!("failed to record context path: {e}")))?;
        context.path = Some(validation.path.to_string());

        let ltik = validation.signing_key.mint(&context)?;
        debug!(issuer = %context.platform.issuer, user = %context.user, "identity token verified");

        Ok(ValidatedLaunch {
            session_cookie_name: context.session_cookie_name().to_string(),
            context,
            ltik,
        })
    }
}

/// Validates ltiks and restores the launch they carry.
pub struct JwtSessionValidator {
    paths: Arc<dyn ContextPathStore>,
}

impl JwtSessionValidator {
    #[must_use]
    pub fn new(paths: Arc<dyn ContextPathStore>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl SessionTokenValidator for JwtSessionValidator {
    #[instrument(skip_all)]
    async fn validate(
        &self,
        ltik: &str,
        validation: SessionValidation<'_>,
    ) -> Result<LaunchContext, LaunchError> {
        let claims = validation.signing_key.verify(ltik)?;

        if !validation.dev_mode && !validation.forward_mode {
            match validation.cookies.get(&claims.platform_code) {
                Some(user) if user == claims.user => {}
                Some(_) => return Err(LaunchError::session("session cookie belongs to another user").into()),
                None => return Err(LaunchError::session("missing platform session cookie").into()),
            }
        }

        let mut context = claims.launch;
        context.path = self
            .paths
            .get(&claims.context_id, &claims.user)
            .await
            .map_err(|e| LaunchError::session(format!("context path lookup failed: {e}")))?;
        Ok(context)
    }
}

/// Decodes a JWT payload without verifying it.
fn unverified_claims(token: &str) -> Result<Value, LaunchError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| LaunchError::identity("malformed token"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| LaunchError::identity("malformed token payload"))?;
    Ok(serde_json::from_slice(&bytes)
        .map_err(|_| LaunchError::identity("malformed token payload"))?)
}

/// `aud` as a list, whether the token carries a string or an array.
fn audiences(token: &Value) -> Vec<String> {
    match token.get("aud") {
        Some(Value::String(aud)) => vec![aud.clone()],
        Some(Value::Array(auds)) => auds
            .iter()
            .filter_map(|a| a.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// How long a nonce must be remembered: until the token itself can no longer
/// pass the `exp` check, and never less than [`NONCE_TTL`].
fn nonce_ttl(exp: i64, now: i64) -> Duration {
    let remaining = exp
        .saturating_sub(now)
        .saturating_add(i64::try_from(LEEWAY_SECONDS).unwrap_or(i64::MAX));
    let remaining = Duration::from_secs(u64::try_from(remaining).unwrap_or_default());
    remaining.max(NONCE_TTL)
}

fn find_key(set: &JwkSet, kid: &str) -> Option<DecodingKey> {
    set.keys
        .iter()
        .find(|jwk| jwk.common.key_id.as_deref() == Some(kid))
        .and_then(decoding_key_from_jwk)
}

fn decoding_key_from_jwk(jwk: &Jwk) -> Option<DecodingKey> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e).ok(),
        _ => None,
    }
}

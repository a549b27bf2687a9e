//! Contracts toward the token validators the gatekeeper delegates to.
//!
//! The gatekeeper never inspects token signatures itself. It hands the
//! identity token (completion branch) or the ltik (access branch) to these
//! validators and only acts on what they return.

use async_trait::async_trait;
use launchgate_core::Result;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{LaunchError, LoginError};
use crate::launch::LaunchContext;
use crate::login::{self, AuthorizationRequest, LoginParams};
use crate::ltik::{Ltik, SigningKey};
use crate::platform::Platform;

/// Read access to the request's verified cookies.
pub trait CookieSource: Send + Sync {
    /// Value of the cookie `name`, if present and correctly signed.
    fn get(&self, name: &str) -> Option<String>;
}

impl CookieSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// Inputs to identity token validation.
#[derive(Debug, Clone, Copy)]
pub struct IdentityValidation<'a> {
    /// The `state` posted with the identity token.
    pub state: Option<&'a str>,
    /// Value of the state-bound cookie set at login.
    pub state_cookie: Option<&'a str>,
    /// Maximum identity token age; `None` disables the check.
    pub max_age: Option<Duration>,
    /// Relaxes the state cookie requirement. Everything present is still
    /// validated.
    pub dev_mode: bool,
    pub signing_key: &'a SigningKey,
    /// Path of the completion request; the launch's initial resource path.
    pub path: &'a str,
}

/// A verified launch.
#[derive(Debug, Clone)]
pub struct ValidatedLaunch {
    pub context: LaunchContext,
    pub ltik: Ltik,
    /// Name of the cookie binding the platform to the user.
    pub session_cookie_name: String,
}

/// Verifies platform-signed identity tokens and starts OIDC logins.
#[async_trait]
pub trait IdentityTokenValidator: Send + Sync {
    async fn validate(
        &self,
        id_token: &str,
        validation: IdentityValidation<'_>,
    ) -> Result<ValidatedLaunch, LaunchError>;

    /// Builds the authorization redirect for a login attempt.
    fn authorization_request(
        &self,
        platform: &Platform,
        params: &LoginParams,
    ) -> Result<AuthorizationRequest, LoginError> {
        Ok(login::authorization_request(platform, params)?)
    }
}

/// Inputs to ltik validation.
#[derive(Clone, Copy)]
pub struct SessionValidation<'a> {
    pub cookies: &'a dyn CookieSource,
    /// Skips the platform session cookie check.
    pub dev_mode: bool,
    /// Embedded middleware mode; also skips the session cookie check.
    pub forward_mode: bool,
    pub signing_key: &'a SigningKey,
}

/// Verifies ltiks on requests after the launch.
#[async_trait]
pub trait SessionTokenValidator: Send + Sync {
    async fn validate(
        &self,
        ltik: &str,
        validation: SessionValidation<'_>,
    ) -> Result<LaunchContext, LaunchError>;
}

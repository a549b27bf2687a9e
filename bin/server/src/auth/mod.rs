//! LTI launch authentication for the launchgate server.
//!
//! This module provides:
//! - The gatekeeper middleware classifying every request (`gatekeeper`)
//! - The login initiation route (`login`)
//! - Launch extractors for application routes (`RequireLaunch`, `OptionalLaunch`)
//! - The replaceable outcome hooks (`CallbackDispatcher`)
//! - Redirects that carry the ltik (`Provider::redirect`)
//!
//! # Request flow
//!
//! 1. The platform calls the login route. The provider stores a state
//!    record, sets the `state{state}` cookie and redirects to the platform's
//!    authentication endpoint.
//! 2. The platform posts an identity token back to the target link. The
//!    gatekeeper consumes the state record, has the identity token verified
//!    and redirects to the same path with an `ltik` query parameter.
//! 3. Later requests carry the ltik. The gatekeeper verifies it and attaches
//!    the launch without re-verifying the identity token.
//!
//! Configuration is frozen by [`ProviderBuilder::build`]; the resulting
//! [`Provider`] is shared as router state behind an `Arc`.

pub mod cookies;
pub mod extract;
pub mod gatekeeper;
pub mod hooks;
pub mod login;
pub mod redirect;

pub use extract::{Launch, LaunchRejection, OptionalLaunch, RequireLaunch};
pub use gatekeeper::gatekeeper;
pub use hooks::{CallbackDispatcher, HookFuture, InvalidCredential, LoginFailure};
pub use login::login;
pub use redirect::RedirectOptions;

use axum::extract::Request;
use axum::response::Response;
use axum_extra::extract::cookie::Key;
use launchgate_core::Result;
use launchgate_provider::{
    ConfigurationError, ContextPathStore, IdentityTokenValidator, JwtIdentityValidator,
    JwtSessionValidator, NonceStore, PlatformRegistry, SessionTokenValidator, SigningKey,
    StateReplayStore, Whitelist, WhitelistEntry,
};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::{CookieConfig, ProviderConfig, RoutesConfig};
use crate::db::Stores;
use hooks::HookOverrides;

/// Router state.
pub type AppState = Arc<Provider>;

/// The frozen launch provider.
pub struct Provider {
    signing_key: SigningKey,
    cookie_key: Key,
    routes: RoutesConfig,
    max_age: Option<Duration>,
    dev_mode: bool,
    forward_mode: bool,
    whitelist: Whitelist,
    cookies: CookieConfig,
    keyset: Value,
    platforms: Arc<dyn PlatformRegistry>,
    states: Arc<dyn StateReplayStore>,
    paths: Arc<dyn ContextPathStore>,
    identity: Arc<dyn IdentityTokenValidator>,
    session: Arc<dyn SessionTokenValidator>,
    hooks: CallbackDispatcher,
}

impl Provider {
    /// Starts configuring a provider.
    #[must_use]
    pub fn builder(config: ProviderConfig) -> ProviderBuilder {
        ProviderBuilder::new(config)
    }

    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Key signing the provider's cookies, derived from the signing key.
    #[must_use]
    pub fn cookie_key(&self) -> &Key {
        &self.cookie_key
    }

    #[must_use]
    pub fn routes(&self) -> &RoutesConfig {
        &self.routes
    }

    /// Maximum identity token age, `None` when disabled.
    #[must_use]
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    #[must_use]
    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    #[must_use]
    pub fn forward_mode(&self) -> bool {
        self.forward_mode
    }

    #[must_use]
    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieConfig {
        &self.cookies
    }

    /// Key set document served on the keyset route.
    #[must_use]
    pub fn keyset(&self) -> &Value {
        &self.keyset
    }

    #[must_use]
    pub fn platforms(&self) -> &dyn PlatformRegistry {
        self.platforms.as_ref()
    }

    #[must_use]
    pub fn states(&self) -> &dyn StateReplayStore {
        self.states.as_ref()
    }

    #[must_use]
    pub fn paths(&self) -> &dyn ContextPathStore {
        self.paths.as_ref()
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityTokenValidator {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> &dyn SessionTokenValidator {
        self.session.as_ref()
    }

    #[must_use]
    pub fn hooks(&self) -> &CallbackDispatcher {
        &self.hooks
    }
}

/// Collects collaborators and hook replacements for a [`Provider`].
pub struct ProviderBuilder {
    config: ProviderConfig,
    cookies: CookieConfig,
    platforms: Option<Arc<dyn PlatformRegistry>>,
    states: Option<Arc<dyn StateReplayStore>>,
    nonces: Option<Arc<dyn NonceStore>>,
    paths: Option<Arc<dyn ContextPathStore>>,
    identity: Option<Arc<dyn IdentityTokenValidator>>,
    session: Option<Arc<dyn SessionTokenValidator>>,
    whitelist: Vec<WhitelistEntry>,
    keyset: Option<Value>,
    hooks: HookOverrides,
}

impl ProviderBuilder {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            cookies: CookieConfig::default(),
            platforms: None,
            states: None,
            nonces: None,
            paths: None,
            identity: None,
            session: None,
            whitelist: Vec::new(),
            keyset: None,
            hooks: HookOverrides::default(),
        }
    }

    #[must_use]
    pub fn cookies(mut self, cookies: CookieConfig) -> Self {
        self.cookies = cookies;
        self
    }

    /// Uses every store in `stores`.
    #[must_use]
    pub fn stores(mut self, stores: Stores) -> Self {
        self.platforms = Some(stores.platforms);
        self.states = Some(stores.states);
        self.nonces = Some(stores.nonces);
        self.paths = Some(stores.paths);
        self
    }

    #[must_use]
    pub fn platform_registry(mut self, registry: Arc<dyn PlatformRegistry>) -> Self {
        self.platforms = Some(registry);
        self
    }

    #[must_use]
    pub fn state_store(mut self, store: Arc<dyn StateReplayStore>) -> Self {
        self.states = Some(store);
        self
    }

    #[must_use]
    pub fn nonce_store(mut self, store: Arc<dyn NonceStore>) -> Self {
        self.nonces = Some(store);
        self
    }

    #[must_use]
    pub fn context_path_store(mut self, store: Arc<dyn ContextPathStore>) -> Self {
        self.paths = Some(store);
        self
    }

    /// Replaces the JWT identity token validator.
    #[must_use]
    pub fn identity_validator(mut self, validator: Arc<dyn IdentityTokenValidator>) -> Self {
        self.identity = Some(validator);
        self
    }

    /// Replaces the JWT ltik validator.
    #[must_use]
    pub fn session_validator(mut self, validator: Arc<dyn SessionTokenValidator>) -> Self {
        self.session = Some(validator);
        self
    }

    /// Appends whitelist entries after the configured ones.
    #[must_use]
    pub fn whitelist(mut self, entries: impl IntoIterator<Item = WhitelistEntry>) -> Self {
        self.whitelist.extend(entries);
        self
    }

    /// Sets the key set document served on the keyset route.
    #[must_use]
    pub fn keyset(mut self, keyset: Value) -> Self {
        self.keyset = Some(keyset);
        self
    }

    #[must_use]
    pub fn on_connect<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Launch, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.hooks.connect(hook);
        self
    }

    #[must_use]
    pub fn on_deep_linking<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Launch, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.hooks.deep_linking(hook);
        self
    }

    #[must_use]
    pub fn on_dynamic_registration<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.hooks.dynamic_registration(hook);
        self
    }

    #[must_use]
    pub fn on_invalid_credential<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(InvalidCredential) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.hooks.invalid_credential(hook);
        self
    }

    #[must_use]
    pub fn on_unregistered_platform<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(LoginFailure) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.hooks.unregistered_platform(hook);
        self
    }

    #[must_use]
    pub fn on_inactive_platform<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(LoginFailure) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.hooks.inactive_platform(hook);
        self
    }

    /// Validates the configuration and freezes it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for a missing or short signing key,
    /// an invalid whitelist pattern, a missing store, or a hook replaced
    /// twice.
    pub fn build(self) -> Result<Provider, ConfigurationError> {
        let signing_key = SigningKey::new(&self.config.encryption_key)?;

        let mut whitelist = Whitelist::new();
        whitelist.add(self.config.whitelist_entries()?);
        whitelist.add(self.whitelist);

        let platforms = self.platforms.ok_or(ConfigurationError::MissingCollaborator {
            name: "platform registry",
        })?;
        let states = self.states.ok_or(ConfigurationError::MissingCollaborator {
            name: "state store",
        })?;
        let paths = self.paths.ok_or(ConfigurationError::MissingCollaborator {
            name: "context path store",
        })?;

        let identity = match self.identity {
            Some(identity) => identity,
            None => {
                let nonces = self.nonces.ok_or(ConfigurationError::MissingCollaborator {
                    name: "nonce store",
                })?;
                Arc::new(JwtIdentityValidator::new(
                    platforms.clone(),
                    nonces,
                    paths.clone(),
                ))
            }
        };
        let session = self
            .session
            .unwrap_or_else(|| Arc::new(JwtSessionValidator::new(paths.clone())));

        let hooks = self.hooks.build()?;

        if self.config.dev_mode {
            warn!(
                "DEVELOPMENT MODE ENABLED: state and session cookie checks are relaxed. \
                 Never run with dev_mode in production."
            );
        }

        let max_age = match self.config.token_max_age_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        };

        Ok(Provider {
            cookie_key: Key::derive_from(signing_key.as_bytes()),
            signing_key,
            routes: self.config.routes,
            max_age,
            dev_mode: self.config.dev_mode,
            forward_mode: self.config.forward_mode,
            whitelist,
            cookies: self.cookies,
            keyset: self.keyset.unwrap_or_else(|| json!({ "keys": [] })),
            platforms,
            states,
            paths,
            identity,
            session,
            hooks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn config(key: &str) -> ProviderConfig {
        serde_json::from_value(json!({ "encryption_key": key })).expect("config")
    }

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn build_requires_a_long_signing_key() {
        let err = Provider::builder(config(""))
            .stores(Stores::in_memory())
            .build()
            .err()
            .expect("error");
        assert_eq!(*err.current_context(), ConfigurationError::MissingSigningKey);

        let err = Provider::builder(config("short"))
            .stores(Stores::in_memory())
            .build()
            .err()
            .expect("error");
        assert_eq!(
            *err.current_context(),
            ConfigurationError::WeakSigningKey { len: 5 }
        );
    }

    #[test]
    fn build_requires_stores() {
        let err = Provider::builder(config(KEY)).build().err().expect("error");
        assert_eq!(
            *err.current_context(),
            ConfigurationError::MissingCollaborator {
                name: "platform registry"
            }
        );
    }

    #[test]
    fn replacing_a_hook_twice_is_fatal() {
        let err = Provider::builder(config(KEY))
            .stores(Stores::in_memory())
            .on_invalid_credential(|failure| async move { failure.into_response() })
            .on_invalid_credential(|failure| async move { failure.into_response() })
            .build()
            .err()
            .expect("error");
        assert_eq!(
            *err.current_context(),
            ConfigurationError::HookAlreadySet {
                hook: "invalid credential"
            }
        );
    }

    #[test]
    fn zero_max_age_disables_the_check() {
        let mut cfg = config(KEY);
        cfg.token_max_age_seconds = 0;
        let provider = Provider::builder(cfg)
            .stores(Stores::in_memory())
            .build()
            .expect("provider");
        assert_eq!(provider.max_age(), None);

        let provider = Provider::builder(config(KEY))
            .stores(Stores::in_memory())
            .build()
            .expect("provider");
        assert_eq!(provider.max_age(), Some(Duration::from_secs(10)));
        assert_eq!(provider.keyset(), &json!({ "keys": [] }));
    }

    #[test]
    fn builder_whitelist_follows_configured_entries() {
        let mut cfg = config(KEY);
        cfg.whitelist = vec!["GET /docs".to_string()];
        let provider = Provider::builder(cfg)
            .stores(Stores::in_memory())
            .whitelist([WhitelistEntry::route("/docs")])
            .build()
            .expect("provider");
        assert!(provider.whitelist().test("/docs", "GET"));
        assert!(!provider.whitelist().test("/docs", "POST"));
    }
}

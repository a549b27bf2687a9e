//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys:
//!
//! ```text
//! DATABASE_URL=postgres://...
//! PROVIDER__ENCRYPTION_KEY=<at least 32 bytes>
//! PROVIDER__ROUTES__APP=/launch
//! PROVIDER__WHITELIST=/health,GET ~^/assets/
//! COOKIES__SECURE=true
//! COOKIES__SAME_SITE=None
//! ```

use axum_extra::extract::cookie::SameSite;
use launchgate_provider::{AuthConfig, ConfigurationError, Platform, RouteMatcher, WhitelistEntry};
use serde::Deserialize;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL connection URL. Without one, every store is in-memory.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// JSON file of platform registrations loaded at startup.
    #[serde(default)]
    pub platforms_file: Option<PathBuf>,

    /// JSON key set served on the keyset route.
    #[serde(default)]
    pub keyset_file: Option<PathBuf>,

    pub provider: ProviderConfig,

    #[serde(default)]
    pub cookies: CookieConfig,
}

/// Launch provider configuration. Frozen once the provider is built.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Secret signing ltiks and cookies.
    pub encryption_key: String,

    #[serde(default)]
    pub routes: RoutesConfig,

    /// Maximum identity token age in seconds. `0` disables the check.
    #[serde(default = "default_token_max_age_seconds")]
    pub token_max_age_seconds: u64,

    /// Relaxes the state and session cookie checks. Never enable in
    /// production.
    #[serde(default)]
    pub dev_mode: bool,

    /// Continue to the next handler after a launch instead of redirecting.
    #[serde(default)]
    pub forward_mode: bool,

    /// Entries of the form `[METHOD ]ROUTE`. A route starting with `~` is a
    /// regular expression.
    #[serde(default)]
    pub whitelist: Vec<String>,
}

/// Routes handled outside the gatekeeper.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoutesConfig {
    #[serde(default = "default_app_route")]
    pub app: String,
    #[serde(default = "default_login_route")]
    pub login: String,
    #[serde(default = "default_keyset_route")]
    pub keyset: String,
    #[serde(default = "default_dynamic_registration_route")]
    pub dynamic_registration: String,
}

impl RoutesConfig {
    /// Whether `path` is served by the login, keyset or registration route.
    #[must_use]
    pub fn is_reserved(&self, path: &str) -> bool {
        path == self.login || path == self.keyset || path == self.dynamic_registration
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            app: default_app_route(),
            login: default_login_route(),
            keyset: default_keyset_route(),
            dynamic_registration: default_dynamic_registration_route(),
        }
    }
}

/// Attributes shared by the state cookie and the platform session cookie.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CookieConfig {
    /// Sets the `Secure` flag. Platforms embedding the tool in an iframe
    /// need `secure = true` together with `same_site = None`.
    #[serde(default)]
    pub secure: bool,

    #[serde(default)]
    pub same_site: SameSitePolicy,

    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SameSitePolicy {
    #[default]
    Lax,
    Strict,
    #[serde(rename = "None")]
    NoRestriction,
}

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::NoRestriction => SameSite::None,
        }
    }
}

/// A platform registration read from `platforms_file`.
///
/// ```json
/// [{
///   "issuer": "https://lms.example.edu",
///   "client_id": "tool-a",
///   "name": "Example LMS",
///   "auth_endpoint": "https://lms.example.edu/auth",
///   "access_token_endpoint": "https://lms.example.edu/token",
///   "auth_config": { "method": "JWK_SET", "key": "https://lms.example.edu/jwks" }
/// }]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformRegistration {
    pub issuer: String,
    pub client_id: String,
    pub name: String,
    pub auth_endpoint: String,
    pub access_token_endpoint: String,
    pub auth_config: AuthConfig,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl PlatformRegistration {
    #[must_use]
    pub fn into_platform(self) -> Platform {
        Platform::new(
            self.issuer,
            self.client_id,
            self.name,
            self.auth_endpoint,
            self.access_token_endpoint,
            self.auth_config,
        )
        .with_active(self.active)
    }
}

/// Parses the contents of a platforms file.
pub fn parse_platforms(json: &str) -> Result<Vec<Platform>, serde_json::Error> {
    let registrations: Vec<PlatformRegistration> = serde_json::from_str(json)?;
    Ok(registrations
        .into_iter()
        .map(PlatformRegistration::into_platform)
        .collect())
}

fn default_active() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_token_max_age_seconds() -> u64 {
    10
}

fn default_app_route() -> String {
    "/".to_string()
}

fn default_login_route() -> String {
    "/login".to_string()
}

fn default_keyset_route() -> String {
    "/keys".to_string()
}

fn default_dynamic_registration_route() -> String {
    "/register".to_string()
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("provider.whitelist"),
            )
            .build()?
            .try_deserialize()
    }
}

impl ProviderConfig {
    /// Parses the configured whitelist entries, in order.
    pub fn whitelist_entries(&self) -> Result<Vec<WhitelistEntry>, ConfigurationError> {
        self.whitelist.iter().map(|raw| parse_whitelist_entry(raw)).collect()
    }
}

fn parse_whitelist_entry(raw: &str) -> Result<WhitelistEntry, ConfigurationError> {
    let raw = raw.trim();
    let (method, route) = match raw.split_once(char::is_whitespace) {
        Some((method, route)) => (Some(method), route.trim()),
        None => (None, raw),
    };
    let route = match route.strip_prefix('~') {
        Some(pattern) => RouteMatcher::pattern(pattern)?,
        None => RouteMatcher::from(route),
    };
    Ok(match method {
        Some(method) => WhitelistEntry::with_method(route, method),
        None => WhitelistEntry::route(route),
    })
}

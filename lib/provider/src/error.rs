//! Error types for the provider crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `LaunchError`: a launch or ltik could not be authenticated
//! - `LoginError`: the login-initiation endpoint could not start a flow
//! - `StoreError`: a persistence collaborator failed
//! - `ConfigurationError`: setup-time failures, fatal at startup

use std::fmt;

/// Per-request authentication failures surfaced by the gatekeeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// Neither an ltik nor an identity token was presented.
    MissingCredential,
    /// No in-flight login matched the submitted state. Soft: on its own it
    /// only means no queued parameters are replayed.
    StateNotFound { state: String },
    /// The platform-signed identity token failed verification.
    IdentityTokenInvalid { reason: String },
    /// The ltik failed verification.
    SessionTokenInvalid { reason: String },
    /// A form or JSON body that could carry a credential could not be read.
    UnreadableBody { reason: String },
}

impl LaunchError {
    /// Builds an `IdentityTokenInvalid` error.
    pub fn identity(reason: impl Into<String>) -> Self {
        Self::IdentityTokenInvalid {
            reason: reason.into(),
        }
    }

    /// Builds a `SessionTokenInvalid` error.
    pub fn session(reason: impl Into<String>) -> Self {
        Self::SessionTokenInvalid {
            reason: reason.into(),
        }
    }

    /// HTTP status reported through the invalid-credential hook.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        401
    }

    /// Short machine-readable code for diagnostics.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::StateNotFound { .. } => "STATE_NOT_FOUND",
            Self::IdentityTokenInvalid { .. } => "IDTOKEN_INVALID",
            Self::SessionTokenInvalid { .. } => "LTIK_INVALID",
            Self::UnreadableBody { .. } => "BODY_UNREADABLE",
        }
    }
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential => write!(f, "no ltik or identity token found in request"),
            Self::StateNotFound { state } => write!(f, "no login attempt found for state {state}"),
            Self::IdentityTokenInvalid { reason } => write!(f, "invalid identity token: {reason}"),
            Self::SessionTokenInvalid { reason } => write!(f, "invalid ltik: {reason}"),
            Self::UnreadableBody { reason } => write!(f, "failed to read request body: {reason}"),
        }
    }
}

impl std::error::Error for LaunchError {}

/// Failures of the login-initiation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// One or more of `iss`, `login_hint`, `target_link_uri` is absent.
    MissingLoginParameters { missing: Vec<&'static str> },
    /// No platform is registered for the issuer (and client id, if given).
    UnregisteredPlatform { issuer: String },
    /// Several platforms share the issuer and no client id disambiguates them.
    AmbiguousPlatform { issuer: String, candidates: usize },
    /// The platform is registered but not activated.
    PlatformNotActivated { issuer: String },
    /// Any other failure while starting the flow.
    Internal { details: String },
}

impl LoginError {
    /// HTTP status for this failure.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingLoginParameters { .. }
            | Self::UnregisteredPlatform { .. }
            | Self::AmbiguousPlatform { .. } => 400,
            Self::PlatformNotActivated { .. } => 401,
            Self::Internal { .. } => 500,
        }
    }

    /// Short machine-readable code for diagnostics.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingLoginParameters { .. } => "MISSING_LOGIN_PARAMETERS",
            Self::UnregisteredPlatform { .. } => "UNREGISTERED_PLATFORM",
            Self::AmbiguousPlatform { .. } => "AMBIGUOUS_PLATFORM",
            Self::PlatformNotActivated { .. } => "PLATFORM_NOT_ACTIVATED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLoginParameters { missing } => {
                write!(f, "missing login parameters: {}", missing.join(", "))
            }
            Self::UnregisteredPlatform { issuer } => {
                write!(f, "no platform registered for issuer {issuer}")
            }
            Self::AmbiguousPlatform { issuer, candidates } => write!(
                f,
                "{candidates} platforms registered for issuer {issuer}; client_id required"
            ),
            Self::PlatformNotActivated { issuer } => {
                write!(f, "platform {issuer} is not activated")
            }
            Self::Internal { details } => write!(f, "login failed: {details}"),
        }
    }
}

impl std::error::Error for LoginError {}

/// Failures of persistence collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or the query failed.
    Unavailable { details: String },
    /// A stored record could not be decoded.
    Corrupt { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { details } => write!(f, "store unavailable: {details}"),
            Self::Corrupt { details } => write!(f, "corrupt stored record: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Setup-time failures. These abort startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No ltik signing secret was configured.
    MissingSigningKey,
    /// The signing secret is shorter than the 32 bytes cookie signing needs.
    WeakSigningKey { len: usize },
    /// A required collaborator was not supplied to the builder.
    MissingCollaborator { name: &'static str },
    /// A whitelist pattern did not compile.
    InvalidWhitelistPattern { pattern: String, reason: String },
    /// A hook was replaced more than once during setup.
    HookAlreadySet { hook: &'static str },
    /// Configuration could not be loaded or parsed.
    Load { details: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSigningKey => write!(f, "missing ltik signing key"),
            Self::WeakSigningKey { len } => {
                write!(f, "signing key must be at least 32 bytes, got {len}")
            }
            Self::MissingCollaborator { name } => write!(f, "missing {name}"),
            Self::InvalidWhitelistPattern { pattern, reason } => {
                write!(f, "invalid whitelist pattern '{pattern}': {reason}")
            }
            Self::HookAlreadySet { hook } => write!(f, "{hook} hook already set"),
            Self::Load { details } => write!(f, "failed to load configuration: {details}"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

//! LTI 1.3 launch authentication domain for launchgate.
//!
//! This crate is framework-agnostic. It knows how to:
//! - resolve registered platforms and build OIDC authorization requests
//! - keep single-use login state and nonces
//! - verify identity tokens and mint or verify ltiks
//! - decide which routes bypass authentication
//! - compose redirect URLs that carry the ltik
//!
//! The HTTP surface lives in `launchgate-server`.

pub mod context_path;
pub mod error;
pub mod jwt;
pub mod launch;
pub mod login;
pub mod ltik;
pub mod nonce;
pub mod platform;
pub mod redirect;
pub mod state;
pub mod validator;
pub mod whitelist;

pub use context_path::{ContextPathRecord, ContextPathStore, MemoryContextPathStore};
pub use error::{ConfigurationError, LaunchError, LoginError, StoreError};
pub use jwt::{JwtIdentityValidator, JwtSessionValidator};
pub use launch::{LaunchContext, MessageType, PlatformContext};
pub use login::{AuthorizationRequest, LoginParams};
pub use ltik::{Ltik, LtikClaims, SigningKey};
pub use nonce::{MemoryNonceStore, NonceStore};
pub use platform::{AuthConfig, MemoryPlatformRegistry, Platform, PlatformRegistry, resolve_platform};
pub use redirect::{LTIK_PARAM, QueryParams};
pub use state::{MemoryStateStore, STATE_TTL, StateRecord, StateReplayStore};
pub use validator::{
    CookieSource, IdentityTokenValidator, IdentityValidation, SessionTokenValidator,
    SessionValidation, ValidatedLaunch,
};
pub use whitelist::{MethodMatcher, RouteMatcher, Whitelist, WhitelistEntry};

//! Replaceable callbacks invoked for each launch outcome.
//!
//! Six hooks, each with a conservative default:
//!
//! | hook                   | invoked when                                  | default          |
//! |------------------------|-----------------------------------------------|------------------|
//! | `connect`              | app route reached with a launch               | 200 text         |
//! | `deep_linking`         | app route reached with a deep-linking launch  | 200 text         |
//! | `dynamic_registration` | dynamic registration route                    | 403              |
//! | `invalid_credential`   | authentication failed on a protected route    | 401 diagnostic   |
//! | `unregistered_platform`| login from an unknown issuer                  | 400              |
//! | `inactive_platform`    | login from a deactivated platform             | 401              |
//!
//! A hook's returned response is the continuation: whatever it returns is
//! sent to the client. Hooks are fixed once the provider is built.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use futures::future::BoxFuture;
use launchgate_provider::{ConfigurationError, LaunchError, LoginError, LoginParams};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::extract::Launch;
use crate::error::ErrorBody;

pub type HookFuture = BoxFuture<'static, Response>;

type LaunchHook = Arc<dyn Fn(Launch, Request) -> HookFuture + Send + Sync>;
type RegistrationHook = Arc<dyn Fn(Request) -> HookFuture + Send + Sync>;
type InvalidCredentialHook = Arc<dyn Fn(InvalidCredential) -> HookFuture + Send + Sync>;
type LoginHook = Arc<dyn Fn(LoginFailure) -> HookFuture + Send + Sync>;

/// A rejected credential, with what the client sent.
#[derive(Debug, Clone)]
pub struct InvalidCredential {
    pub error: LaunchError,
    /// Parsed request body, or `null`.
    pub body: Value,
    /// Parsed query string.
    pub query: Value,
}

impl IntoResponse for InvalidCredential {
    fn into_response(self) -> Response {
        ErrorBody::new(StatusCode::UNAUTHORIZED, self.error.code())
            .with_detail("description", "Error validating ltik or IdToken")
            .with_detail("reason", self.error.to_string())
            .with_detail("bodyReceived", self.body)
            .with_detail("queryReceived", self.query)
            .into_response()
    }
}

/// A login that resolved no usable platform.
#[derive(Debug, Clone)]
pub struct LoginFailure {
    pub error: LoginError,
    pub params: LoginParams,
}

impl IntoResponse for LoginFailure {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        ErrorBody::new(status, self.error.code())
            .with_detail("issuer", self.params.issuer)
            .into_response()
    }
}

/// Dispatch table of the provider's hooks.
#[derive(Clone)]
pub struct CallbackDispatcher {
    connect: LaunchHook,
    deep_linking: LaunchHook,
    dynamic_registration: RegistrationHook,
    invalid_credential: InvalidCredentialHook,
    unregistered_platform: LoginHook,
    inactive_platform: LoginHook,
}

impl CallbackDispatcher {
    /// Runs the deep-linking hook for deep-linking launches and the connect
    /// hook for every other message type.
    pub async fn launch(&self, launch: Launch, request: Request) -> Response {
        if launch.context.message_type.is_deep_linking() {
            debug!("dispatching deep linking launch");
            (self.deep_linking)(launch, request).await
        } else {
            debug!(message_type = launch.context.message_type.as_str(), "dispatching launch");
            (self.connect)(launch, request).await
        }
    }

    pub async fn dynamic_registration(&self, request: Request) -> Response {
        (self.dynamic_registration)(request).await
    }

    pub async fn invalid_credential(&self, failure: InvalidCredential) -> Response {
        (self.invalid_credential)(failure).await
    }

    pub async fn unregistered_platform(&self, failure: LoginFailure) -> Response {
        (self.unregistered_platform)(failure).await
    }

    pub async fn inactive_platform(&self, failure: LoginFailure) -> Response {
        (self.inactive_platform)(failure).await
    }
}

impl Default for CallbackDispatcher {
    fn default() -> Self {
        Self {
            connect: Arc::new(|_: Launch, _: Request| {
                async { "It works!".into_response() }.boxed()
            }),
            deep_linking: Arc::new(|_: Launch, _: Request| {
                async { "Deep linking request received".into_response() }.boxed()
            }),
            dynamic_registration: Arc::new(|_: Request| {
                async {
                    ErrorBody::new(StatusCode::FORBIDDEN, "DYNAMIC_REGISTRATION_DISABLED")
                        .into_response()
                }
                .boxed()
            }),
            invalid_credential: Arc::new(|failure: InvalidCredential| {
                async move { failure.into_response() }.boxed()
            }),
            unregistered_platform: Arc::new(|failure: LoginFailure| {
                async move { failure.into_response() }.boxed()
            }),
            inactive_platform: Arc::new(|failure: LoginFailure| {
                async move { failure.into_response() }.boxed()
            }),
        }
    }
}

/// Hook replacements collected during setup.
///
/// Replacing the same hook twice is recorded and reported when the provider
/// is built.
#[derive(Default)]
pub(crate) struct HookOverrides {
    connect: Option<LaunchHook>,
    deep_linking: Option<LaunchHook>,
    dynamic_registration: Option<RegistrationHook>,
    invalid_credential: Option<InvalidCredentialHook>,
    unregistered_platform: Option<LoginHook>,
    inactive_platform: Option<LoginHook>,
    duplicate: Option<&'static str>,
}

fn replace<T>(
    slot: &mut Option<T>,
    hook: T,
    name: &'static str,
    duplicate: &mut Option<&'static str>,
) {
    if slot.replace(hook).is_some() && duplicate.is_none() {
        *duplicate = Some(name);
    }
}

impl HookOverrides {
    pub(crate) fn connect<F, Fut>(&mut self, hook: F)
    where
        F: Fn(Launch, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let hook: LaunchHook =
            Arc::new(move |launch: Launch, request: Request| hook(launch, request).boxed());
        replace(&mut self.connect, hook, "connect", &mut self.duplicate);
    }

    pub(crate) fn deep_linking<F, Fut>(&mut self, hook: F)
    where
        F: Fn(Launch, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let hook: LaunchHook =
            Arc::new(move |launch: Launch, request: Request| hook(launch, request).boxed());
        replace(&mut self.deep_linking, hook, "deep linking", &mut self.duplicate);
    }

    pub(crate) fn dynamic_registration<F, Fut>(&mut self, hook: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let hook: RegistrationHook =
            Arc::new(move |request: Request| hook(request).boxed());
        replace(
            &mut self.dynamic_registration,
            hook,
            "dynamic registration",
            &mut self.duplicate,
        );
    }

    pub(crate) fn invalid_credential<F, Fut>(&mut self, hook: F)
    where
        F: Fn(InvalidCredential) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let hook: InvalidCredentialHook =
            Arc::new(move |failure: InvalidCredential| hook(failure).boxed());
        replace(
            &mut self.invalid_credential,
            hook,
            "invalid credential",
            &mut self.duplicate,
        );
    }

    pub(crate) fn unregistered_platform<F, Fut>(&mut self, hook: F)
    where
        F: Fn(LoginFailure) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let hook: LoginHook =
            Arc::new(move |failure: LoginFailure| hook(failure).boxed());
        replace(
            &mut self.unregistered_platform,
            hook,
            "unregistered platform",
            &mut self.duplicate,
        );
    }

    pub(crate) fn inactive_platform<F, Fut>(&mut self, hook: F)
    where
        F: Fn(LoginFailure) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let hook: LoginHook =
            Arc::new(move |failure: LoginFailure| hook(failure).boxed());
        replace(
            &mut self.inactive_platform,
            hook,
            "inactive platform",
            &mut self.duplicate,
        );
    }

    /// Freezes the overrides into a dispatcher.
    pub(crate) fn build(self) -> Result<CallbackDispatcher, ConfigurationError> {
        if let Some(hook) = self.duplicate {
            return Err(ConfigurationError::HookAlreadySet { hook });
        }
        let defaults = CallbackDispatcher::default();
        Ok(CallbackDispatcher {
            connect: self.connect.unwrap_or(defaults.connect),
            deep_linking: self.deep_linking.unwrap_or(defaults.deep_linking),
            dynamic_registration: self
                .dynamic_registration
                .unwrap_or(defaults.dynamic_registration),
            invalid_credential: self.invalid_credential.unwrap_or(defaults.invalid_credential),
            unregistered_platform: self
                .unregistered_platform
                .unwrap_or(defaults.unregistered_platform),
            inactive_platform: self.inactive_platform.unwrap_or(defaults.inactive_platform),
        })
    }
}

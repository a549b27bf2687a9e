//! The authenticated launch attached to a request, and its extractors.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use launchgate_provider::{LaunchContext, Ltik};
use std::collections::BTreeMap;

use crate::error::ErrorBody;

/// A verified launch, inserted into request extensions by the gatekeeper.
#[derive(Debug, Clone)]
pub struct Launch {
    pub context: LaunchContext,
    pub ltik: Ltik,
    /// Query parameters queued at login. Only populated on the request that
    /// completed the launch in forward mode.
    pub queued: BTreeMap<String, String>,
}

impl Launch {
    #[must_use]
    pub fn new(context: LaunchContext, ltik: Ltik) -> Self {
        Self {
            context,
            ltik,
            queued: BTreeMap::new(),
        }
    }
}

/// Extractor for requiring an authenticated launch.
pub struct RequireLaunch(pub Launch);

impl<S> FromRequestParts<S> for RequireLaunch
where
    S: Send + Sync,
{
    type Rejection = LaunchRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Launch>()
            .cloned()
            .map(RequireLaunch)
            .ok_or(LaunchRejection::NotLaunched)
    }
}

/// Extractor for optionally getting the authenticated launch.
///
/// Returns None on whitelisted routes reached without credentials.
pub struct OptionalLaunch(pub Option<Launch>);

impl<S> FromRequestParts<S> for OptionalLaunch
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalLaunch(parts.extensions.get::<Launch>().cloned()))
    }
}

/// Rejection type for launch extractors.
#[derive(Debug)]
pub enum LaunchRejection {
    NotLaunched,
}

impl IntoResponse for LaunchRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotLaunched => {
                ErrorBody::new(StatusCode::UNAUTHORIZED, "MISSING_CREDENTIAL").into_response()
            }
        }
    }
}

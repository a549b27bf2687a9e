//! The login initiation route.

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Redirect, Response};
use launchgate_provider::{
    LoginError, LoginParams, STATE_TTL, StateRecord, resolve_platform,
};
use tracing::{error, info, instrument, warn};
use url::form_urlencoded;

use super::cookies;
use super::hooks::LoginFailure;
use super::AppState;
use crate::error::ErrorBody;

const FORM_LIMIT: usize = 64 * 1024;

/// Starts a third-party initiated login.
///
/// Accepts the login parameters from the query string or a form body. The
/// platform is resolved, a state record is stored, the `state{state}` cookie
/// is set and the browser is sent to the platform's authentication endpoint.
#[instrument(skip_all, fields(method = %request.method()))]
pub async fn login(State(provider): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let query: Vec<(String, String)> =
        form_urlencoded::parse(parts.uri.query().unwrap_or_default().as_bytes())
            .into_owned()
            .collect();
    let is_form = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
    let form: Vec<(String, String)> = if is_form {
        let bytes = match to_bytes(body, FORM_LIMIT).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to read login form");
                return ErrorBody::new(StatusCode::PAYLOAD_TOO_LARGE, "BODY_UNREADABLE")
                    .with_detail("reason", e.to_string())
                    .into_response();
            }
        };
        form_urlencoded::parse(&bytes).into_owned().collect()
    } else {
        Vec::new()
    };

    let mut params = match LoginParams::from_pairs(query.iter().cloned().chain(form)) {
        Ok(params) => params,
        Err(error) => {
            warn!(%error, "rejected login");
            return login_error(&error);
        }
    };
    params
        .queued
        .retain(|key, _| query.iter().any(|(name, _)| name == key));

    let platform = match resolve_platform(
        provider.platforms(),
        &params.issuer,
        params.client_id.as_deref(),
    )
    .await
    {
        Ok(platform) => platform,
        Err(report) => {
            let error = report.current_context().clone();
            warn!(issuer = %params.issuer, %error, "login platform not resolved");
            return match error {
                LoginError::UnregisteredPlatform { .. } => {
                    provider
                        .hooks()
                        .unregistered_platform(LoginFailure { error, params })
                        .await
                }
                error => login_error(&error),
            };
        }
    };

    if !platform.is_active() {
        warn!(issuer = %params.issuer, "login from inactive platform");
        let error = LoginError::PlatformNotActivated {
            issuer: params.issuer.clone(),
        };
        return provider
            .hooks()
            .inactive_platform(LoginFailure { error, params })
            .await;
    }

    let authorization = match provider.identity().authorization_request(&platform, &params) {
        Ok(authorization) => authorization,
        Err(report) => {
            error!(issuer = %params.issuer, error = %report, "failed to build authorization request");
            return login_error(report.current_context());
        }
    };

    let record = StateRecord::new(
        authorization.state.clone(),
        params.issuer.clone(),
        params.queued,
    );
    if let Err(report) = provider.states().put(record, STATE_TTL).await {
        error!(issuer = %params.issuer, error = %report, "failed to store login state");
        return login_error(&LoginError::Internal {
            details: report.current_context().to_string(),
        });
    }

    info!(issuer = %params.issuer, client_id = platform.client_id(), "login started");
    let jar = cookies::jar(&parts.headers, provider.cookie_key()).add(cookies::state_cookie(
        &authorization.state,
        &params.issuer,
        provider.cookies(),
    ));
    (jar, Redirect::to(&authorization.url)).into_response()
}

fn login_error(error: &LoginError) -> Response {
    let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    ErrorBody::new(status, error.code())
        .with_detail("reason", error.to_string())
        .into_response()
}

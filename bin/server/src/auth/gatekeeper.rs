//! Request classification middleware.
//!
//! Every request outside the reserved routes is either:
//! - an access: it carries an ltik, which is verified and attached
//! - a completion: the platform posting an identity token back, which is
//!   verified and answered with a redirect carrying a fresh ltik
//!
//! Failures fall through to the next handler on whitelisted routes and go to
//! the invalid-credential hook everywhere else.

use axum::body::{Body, HttpBody, to_bytes};
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::SignedCookieJar;
use launchgate_provider::redirect::compose;
use launchgate_provider::{
    IdentityValidation, LTIK_PARAM, LaunchError, Ltik, QueryParams, SessionValidation,
};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use super::cookies::{self, JarCookies};
use super::extract::Launch;
use super::hooks::InvalidCredential;
use super::{AppState, Provider};

/// Largest request body buffered while looking for credentials.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

enum Outcome {
    Continue(Launch),
    Redirect(String),
}

/// Authenticates the request before it reaches the application.
///
/// Install with `axum::middleware::from_fn_with_state`.
pub async fn gatekeeper(
    State(provider): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if provider.routes().is_reserved(request.uri().path()) {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let mut jar = cookies::jar(&parts.headers, provider.cookie_key());

    let (body, received, outcome) = match request_ltik(&parts) {
        Some(ltik) => (body, Value::Null, access(&provider, &jar, ltik).await),
        None => match read_body(&parts.headers, body).await {
            Ok((body, received)) => {
                let outcome = match body_ltik(&received) {
                    Some(ltik) => access(&provider, &jar, ltik).await,
                    None => complete(&provider, &mut jar, &parts, &received).await,
                };
                (body, received, outcome)
            }
            Err(error) => {
                warn!(path = %parts.uri.path(), %error, "failed to read request body");
                (Body::empty(), Value::Null, Err(error))
            }
        },
    };

    match outcome {
        Ok(Outcome::Continue(launch)) => {
            if !launch.queued.is_empty()
                && let Some(uri) = merge_query(&parts.uri, &launch.queued)
            {
                parts.uri = uri;
            }
            parts.extensions.insert(launch);
            let response = next.run(Request::from_parts(parts, body)).await;
            (jar, response).into_response()
        }
        Ok(Outcome::Redirect(url)) => (jar, Redirect::to(&url)).into_response(),
        Err(error) => {
            let path = parts.uri.path();
            if provider.whitelist().test(path, parts.method.as_str()) {
                debug!(path, code = error.code(), "unauthenticated request on whitelisted route");
                let response = next.run(Request::from_parts(parts, body)).await;
                return (jar, response).into_response();
            }

            warn!(path, code = error.code(), %error, "rejected launch");
            let query = query_object(parts.uri.query().unwrap_or_default());
            let response = provider
                .hooks()
                .invalid_credential(InvalidCredential {
                    error,
                    body: received,
                    query,
                })
                .await;
            (jar, response).into_response()
        }
    }
}

/// Verifies an ltik. The identity token is not consulted again.
async fn access(
    provider: &Provider,
    jar: &SignedCookieJar,
    ltik: String,
) -> Result<Outcome, LaunchError> {
    let cookies = JarCookies(jar);
    let validation = SessionValidation {
        cookies: &cookies,
        dev_mode: provider.dev_mode(),
        forward_mode: provider.forward_mode(),
        signing_key: provider.signing_key(),
    };
    let context = provider
        .session()
        .validate(&ltik, validation)
        .await
        .map_err(|report| report.current_context().clone())?;

    debug!(user = %context.user, "ltik accepted");
    Ok(Outcome::Continue(Launch::new(context, Ltik::new(ltik))))
}

/// Completes an OIDC login from the platform's form post.
async fn complete(
    provider: &Provider,
    jar: &mut SignedCookieJar,
    parts: &Parts,
    body: &Value,
) -> Result<Outcome, LaunchError> {
    let state = body.get("state").and_then(Value::as_str);
    let mut state_cookie = None;
    let mut queued = BTreeMap::new();

    if let Some(state) = state {
        let name = cookies::state_cookie_name(state);
        state_cookie = jar.get(&name).map(|cookie| cookie.value().to_string());
        *jar = jar.clone().remove(cookies::removal(name, provider.cookies()));

        match provider.states().consume(state).await {
            Ok(Some(record)) => queued = record.query,
            Ok(None) => debug!(
                state,
                "{}, no query parameters replayed",
                LaunchError::StateNotFound {
                    state: state.to_string()
                }
            ),
            Err(e) => warn!(state, error = %e, "failed to consume login state"),
        }
    }

    let id_token = body
        .get("id_token")
        .and_then(Value::as_str)
        .ok_or(LaunchError::MissingCredential)?;

    let validation = IdentityValidation {
        state,
        state_cookie: state_cookie.as_deref(),
        max_age: provider.max_age(),
        dev_mode: provider.dev_mode(),
        signing_key: provider.signing_key(),
        path: parts.uri.path(),
    };
    let validated = provider
        .identity()
        .validate(id_token, validation)
        .await
        .map_err(|report| report.current_context().clone())?;

    info!(
        issuer = %validated.context.platform.issuer,
        user = %validated.context.user,
        message_type = validated.context.message_type.as_str(),
        "launch completed"
    );

    if provider.forward_mode() {
        let mut launch = Launch::new(validated.context, validated.ltik);
        launch.queued = queued;
        return Ok(Outcome::Continue(launch));
    }

    *jar = jar.clone().add(cookies::session_cookie(
        &validated.session_cookie_name,
        &validated.context.user,
        provider.cookies(),
    ));
    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
    Ok(Outcome::Redirect(compose(
        target,
        queued,
        validated.ltik.as_str(),
    )))
}

/// Looks for the ltik in the query, then a bearer header.
fn request_ltik(parts: &Parts) -> Option<String> {
    parts
        .uri
        .query()
        .and_then(|query| QueryParams::parse(query).get(LTIK_PARAM).and_then(non_empty))
        .or_else(|| bearer(&parts.headers).and_then(non_empty))
}

fn body_ltik(body: &Value) -> Option<String> {
    body.get(LTIK_PARAM).and_then(Value::as_str).and_then(non_empty)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Form,
    Json,
}

/// Form and JSON bodies can carry an identity token or an ltik.
fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        Some(BodyKind::Form)
    } else if content_type.starts_with("application/json") {
        Some(BodyKind::Json)
    } else {
        None
    }
}

/// Buffers a form or JSON body and parses it. Other bodies, and bodies
/// declaring more than [`BODY_LIMIT`] bytes, are handed back unread.
async fn read_body(headers: &HeaderMap, body: Body) -> Result<(Body, Value), LaunchError> {
    let Some(kind) = body_kind(headers) else {
        return Ok((body, Value::Null));
    };
    if body.size_hint().lower() > BODY_LIMIT as u64 {
        debug!(declared = body.size_hint().lower(), "body too large to inspect for credentials");
        return Ok((body, Value::Null));
    }

    let bytes = to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|e| LaunchError::UnreadableBody {
            reason: e.to_string(),
        })?;
    let parsed = parse_body(kind, &bytes);
    Ok((Body::from(bytes), parsed))
}

fn parse_body(kind: BodyKind, bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match kind {
        BodyKind::Form => pairs_to_object(form_urlencoded::parse(bytes)),
        BodyKind::Json => serde_json::from_slice(bytes).unwrap_or(Value::Null),
    }
}

fn query_object(query: &str) -> Value {
    pairs_to_object(form_urlencoded::parse(query.as_bytes()))
}

fn pairs_to_object<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Value {
    Value::Object(
        pairs
            .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
            .collect(),
    )
}

/// Adds queued parameters to the request's own query.
fn merge_query(uri: &Uri, queued: &BTreeMap<String, String>) -> Option<Uri> {
    let mut params = QueryParams::parse(uri.query().unwrap_or_default());
    for (key, value) in queued {
        params.set(key.as_str(), value.as_str());
    }
    format!("{}?{}", uri.path(), params.encode()).parse().ok()
}

//! Login initiation: parameter parsing and the OIDC authorization request.

use std::collections::BTreeMap;
use url::Url;

use crate::error::LoginError;
use crate::platform::Platform;

/// Parameters of a third-party initiated login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginParams {
    pub issuer: String,
    pub login_hint: String,
    pub target_link_uri: String,
    pub client_id: Option<String>,
    pub lti_message_hint: Option<String>,
    pub lti_deployment_id: Option<String>,
    /// Every parameter that is not part of the LTI login request, replayed
    /// on the launch redirect.
    pub queued: BTreeMap<String, String>,
}

impl LoginParams {
    /// Collects login parameters from query and form pairs.
    ///
    /// Later pairs override earlier ones, so callers pass the query first
    /// and the body second. Empty values count as absent.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, LoginError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut all: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let mut take = |key: &str| all.remove(key);
        let issuer = take("iss");
        let login_hint = take("login_hint");
        let target_link_uri = take("target_link_uri");
        let client_id = take("client_id");
        let lti_message_hint = take("lti_message_hint");
        let lti_deployment_id = take("lti_deployment_id");

        match (issuer, login_hint, target_link_uri) {
            (Some(issuer), Some(login_hint), Some(target_link_uri)) => Ok(Self {
                issuer,
                login_hint,
                target_link_uri,
                client_id,
                lti_message_hint,
                lti_deployment_id,
                queued: all,
            }),
            (issuer, login_hint, target_link_uri) => {
                let missing = [
                    ("iss", issuer.is_none()),
                    ("login_hint", login_hint.is_none()),
                    ("target_link_uri", target_link_uri.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(LoginError::MissingLoginParameters { missing })
            }
        }
    }
}

/// An OIDC authorization redirect for one login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub state: String,
    pub nonce: String,
    pub url: String,
}

/// Generates an unguessable single-use token.
#[must_use]
pub fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Builds the authorization redirect to the platform's OIDC endpoint.
pub fn authorization_request(
    platform: &Platform,
    params: &LoginParams,
) -> Result<AuthorizationRequest, LoginError> {
    let mut url = Url::parse(platform.auth_endpoint()).map_err(|e| LoginError::Internal {
        details: format!("invalid authentication endpoint for {}: {e}", platform.issuer()),
    })?;

    let state = new_token();
    let nonce = new_token();
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "id_token")
            .append_pair("response_mode", "form_post")
            .append_pair("id_token_signed_response_alg", "RS256")
            .append_pair("scope", "openid")
            .append_pair("prompt", "none")
            .append_pair("client_id", platform.client_id())
            .append_pair("redirect_uri", &params.target_link_uri)
            .append_pair("login_hint", &params.login_hint)
            .append_pair("state", &state)
            .append_pair("nonce", &nonce);
        if let Some(hint) = &params.lti_message_hint {
            query.append_pair("lti_message_hint", hint);
        }
        if let Some(deployment) = &params.lti_deployment_id {
            query.append_pair("lti_deployment_id", deployment);
        }
    }

    Ok(AuthorizationRequest {
        state,
        nonce,
        url: url.into(),
    })
}

//! The verified launch context exposed to application code.
//!
//! A `LaunchContext` is built once per launch from the verified identity
//! token claims and then travels inside the ltik, so later requests never
//! re-verify the original identity token.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LaunchError;

/// LTI 1.3 claim names.
pub mod claims {
    pub const MESSAGE_TYPE: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
    pub const VERSION: &str = "https://purl.imsglobal.org/spec/lti/claim/version";
    pub const DEPLOYMENT_ID: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
    pub const TARGET_LINK_URI: &str = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri";
    pub const RESOURCE_LINK: &str = "https://purl.imsglobal.org/spec/lti/claim/resource_link";
    pub const CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
    pub const ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
    pub const CUSTOM: &str = "https://purl.imsglobal.org/spec/lti/claim/custom";
    pub const DEEP_LINKING_SETTINGS: &str =
        "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings";
}

const LTI_VERSION: &str = "1.3.0";

/// The kind of launch the platform requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// `LtiResourceLinkRequest`: render a resource for the user.
    ResourceLink,
    /// `LtiDeepLinkingRequest`: return a selection of content items.
    DeepLinking,
    /// Any other message type, carried verbatim.
    Other(String),
}

impl MessageType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ResourceLink => "LtiResourceLinkRequest",
            Self::DeepLinking => "LtiDeepLinkingRequest",
            Self::Other(other) => other,
        }
    }

    #[must_use]
    pub fn is_deep_linking(&self) -> bool {
        matches!(self, Self::DeepLinking)
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "LtiResourceLinkRequest" => Self::ResourceLink,
            "LtiDeepLinkingRequest" => Self::DeepLinking,
            _ => Self::Other(value),
        }
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        value.as_str().to_string()
    }
}

/// Identifies the platform registration a launch came through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformContext {
    pub issuer: String,
    pub client_id: String,
    pub deployment_id: String,
    /// Stable code derived from issuer, client id and deployment id. Also
    /// the name of the platform session cookie.
    pub platform_code: String,
}

/// The course or group the launch happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseContext {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// The placement of the tool inside the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLink {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Verified launch claims plus the navigation state of the launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchContext {
    pub message_type: MessageType,
    pub platform: PlatformContext,
    /// The platform's `sub` for the launching user.
    pub user: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CourseContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_link: Option<ResourceLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_link_uri: Option<String>,
    #[serde(default)]
    pub custom: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_linking_settings: Option<Value>,
    /// Current resource path of this (context, user). Kept in the context
    /// path store, never inside the ltik.
    #[serde(default, skip_serializing)]
    pub path: Option<String>,
    /// The raw identity token claims.
    #[serde(default)]
    pub raw: Value,
}

impl LaunchContext {
    /// Builds a context from verified identity token claims.
    ///
    /// Signature, issuer, audience and expiry are checked by the caller;
    /// this only checks the LTI message claims.
    pub fn from_id_token_claims(token: &Value, client_id: &str) -> Result<Self, LaunchError> {
        let text = |name: &str| token.get(name).and_then(Value::as_str).map(str::to_string);

        let version = text(claims::VERSION).ok_or_else(|| LaunchError::identity("missing LTI version"))?;
        if version != LTI_VERSION {
            return Err(LaunchError::identity(format!(
                "unsupported LTI version {version}"
            )));
        }

        let issuer = text("iss").ok_or_else(|| LaunchError::identity("missing iss"))?;
        let user = text("sub").ok_or_else(|| LaunchError::identity("missing sub"))?;
        let deployment_id = text(claims::DEPLOYMENT_ID)
            .ok_or_else(|| LaunchError::identity("missing deployment id"))?;
        let message_type = MessageType::from(
            text(claims::MESSAGE_TYPE)
                .ok_or_else(|| LaunchError::identity("missing message type"))?,
        );

        let resource_link: Option<ResourceLink> = parse_claim(token, claims::RESOURCE_LINK)?;
        let deep_linking_settings = token.get(claims::DEEP_LINKING_SETTINGS).cloned();

        match message_type {
            MessageType::ResourceLink if resource_link.is_none() => {
                return Err(LaunchError::identity("missing resource link claim"));
            }
            MessageType::DeepLinking if deep_linking_settings.is_none() => {
                return Err(LaunchError::identity("missing deep linking settings claim"));
            }
            _ => {}
        }

        let roles = token
            .get(claims::ROLES)
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(|r| r.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let custom = token
            .get(claims::CUSTOM)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let platform_code = platform_code(&issuer, client_id, &deployment_id);

        Ok(Self {
            message_type,
            platform: PlatformContext {
                issuer,
                client_id: client_id.to_string(),
                deployment_id,
                platform_code,
            },
            user,
            roles,
            context: parse_claim(token, claims::CONTEXT)?,
            resource_link,
            target_link_uri: text(claims::TARGET_LINK_URI),
            custom,
            deep_linking_settings,
            path: None,
            raw: token.clone(),
        })
    }

    /// Key of this launch's context path record.
    ///
    /// Deep-linking launches have no resource link, so the key falls back
    /// to the course context alone.
    #[must_use]
    pub fn context_id(&self) -> String {
        let course = self.context.as_ref().map_or("", |c| c.id.as_str());
        let link = self.resource_link.as_ref().map_or("", |r| r.id.as_str());
        URL_SAFE_NO_PAD.encode(format!(
            "{}\n{}\n{}\n{}\n{}",
            self.platform.issuer, self.platform.client_id, self.platform.deployment_id, course, link
        ))
    }

    /// Name of the cookie binding this platform to the launching user.
    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.platform.platform_code
    }
}

/// Derives the platform code for a registration and deployment.
#[must_use]
pub fn platform_code(issuer: &str, client_id: &str, deployment_id: &str) -> String {
    format!(
        "lti{}",
        URL_SAFE_NO_PAD.encode(format!("{issuer}{client_id}{deployment_id}"))
    )
}

fn parse_claim<T: serde::de::DeserializeOwned>(
    token: &Value,
    name: &str,
) -> Result<Option<T>, LaunchError> {
    match token.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| LaunchError::identity(format!("malformed claim {name}: {e}"))),
    }
}

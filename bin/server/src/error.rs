//! Diagnostic error bodies and server startup errors.
//!
//! Every failure the gatekeeper or the login route reports to a client is a
//! JSON body of the form:
//!
//! ```json
//! { "status": 401, "error": "Unauthorized", "details": { "message": "LTIK_INVALID" } }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// A JSON error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    status: u16,
    error: String,
    details: Map<String, Value>,
}

impl ErrorBody {
    /// An error body whose `details.message` is `message`.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let mut details = Map::new();
        details.insert("message".to_string(), Value::String(message.into()));
        Self {
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            details,
        }
    }

    /// Adds a detail field.
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Startup failures outside the provider's own configuration checks.
#[derive(Debug)]
pub enum StartupError {
    /// Environment configuration could not be loaded.
    Config { details: String },
    /// The database could not be reached or migrated.
    Database { details: String },
    /// A file referenced by the configuration could not be read.
    File { path: String, details: String },
    /// The provider rejected its configuration.
    Provider { details: String },
    /// The listener could not be bound or the server failed.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "failed to load configuration: {details}"),
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::File { path, details } => write!(f, "failed to read '{path}': {details}"),
            Self::Provider { details } => write!(f, "invalid provider configuration: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}

//! Redirects issued by application handlers during a launch.

use axum::response::{IntoResponse, Redirect, Response};
use launchgate_provider::redirect::{compose, split_path_and_query};
use tracing::warn;

use super::Provider;
use super::extract::Launch;

/// Options for [`Provider::redirect`].
#[derive(Debug, Clone, Default)]
pub struct RedirectOptions {
    /// Extra query parameters. They override the target's own parameters
    /// but never the `ltik`.
    pub query: Vec<(String, String)>,
    /// Records the target as the launch's current resource path.
    pub new_resource: bool,
}

impl RedirectOptions {
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn new_resource(mut self) -> Self {
        self.new_resource = true;
        self
    }
}

impl Provider {
    /// Redirects to `path`, carrying the launch's ltik.
    ///
    /// Without a launch this is a plain redirect with nothing injected.
    pub async fn redirect(
        &self,
        launch: Option<&Launch>,
        path: &str,
        options: RedirectOptions,
    ) -> Response {
        let Some(launch) = launch else {
            return Redirect::to(path).into_response();
        };

        if options.new_resource {
            let (resource, _) = split_path_and_query(path);
            let context_id = launch.context.context_id();
            if let Err(report) = self
                .paths()
                .set(&context_id, &launch.context.user, resource)
                .await
            {
                warn!(path = resource, error = %report, "failed to record context path");
            }
        }

        Redirect::to(&compose(path, options.query, launch.ltik.as_str())).into_response()
    }
}

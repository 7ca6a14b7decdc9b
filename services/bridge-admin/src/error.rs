//! Service-specific error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::metrics;

/// OAuth callback failures, each mapped to an HTTP status.
///
/// Command failures never take this path: they are rendered as notices.
#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("GitHub OAuth is not configured on this bridge")]
    NotConfigured,

    #[error("missing query parameter: {0}")]
    MissingParameter(&'static str),

    #[error("unknown or expired OAuth state, please run `github login` again")]
    UnknownState,

    #[error("authorization was not granted: {0}")]
    Denied(String),

    #[error("could not exchange the authorization code with GitHub")]
    Exchange(#[source] github_auth::Error),

    #[error("could not store the GitHub token")]
    Store(#[source] github_auth::Error),
}

impl CallbackError {
    pub fn status(&self) -> StatusCode {
        match self {
            CallbackError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            CallbackError::MissingParameter(_)
            | CallbackError::UnknownState
            | CallbackError::Denied(_) => StatusCode::BAD_REQUEST,
            CallbackError::Exchange(_) => StatusCode::BAD_GATEWAY,
            CallbackError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label for `bridge_oauth_callbacks_total`.
    pub fn outcome(&self) -> &'static str {
        match self {
            CallbackError::NotConfigured => "not_configured",
            CallbackError::MissingParameter(_) => "bad_request",
            CallbackError::UnknownState => "unknown_state",
            CallbackError::Denied(_) => "denied",
            CallbackError::Exchange(_) => "exchange_failed",
            CallbackError::Store(_) => "store_failed",
        }
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        metrics::record_oauth_callback(self.outcome());
        (self.status(), self.to_string()).into_response()
    }
}

//! Admin HTTP API
//!
//! Endpoints:
//! - POST /admin/command   run one bot command as `user_id`, return its notices
//! - GET  /oauth/callback  GitHub OAuth redirect target
//! - GET  /health          liveness plus which GitHub features are configured
//! - GET  /metrics         Prometheus text exposition

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bot_commands::{CommandRouter, Error};
use github_auth::{
    Credential, GITHUB_SERVICE, OAuthApp, TokenStore, exchange_code, unix_millis,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::CallbackError;
use crate::metrics;
use crate::session::{AdminSession, CollectedNotices};

const LINKED: &str =
    "Your GitHub account is now linked to the bridge. You can return to your chat.";

/// Shared state for admin API handlers.
#[derive(Clone)]
pub struct AdminState {
    config: Arc<Config>,
    token_store: Arc<TokenStore>,
    commands: Arc<CommandRouter<AdminSession>>,
    prometheus: PrometheusHandle,
}

impl AdminState {
    pub fn new(
        config: Arc<Config>,
        token_store: Arc<TokenStore>,
        commands: Arc<CommandRouter<AdminSession>>,
        prometheus: PrometheusHandle,
    ) -> Self {
        Self {
            config,
            token_store,
            commands,
            prometheus,
        }
    }
}

/// Build the admin router. `max_connections` caps concurrent requests.
pub fn build_admin_router(state: AdminState, max_connections: usize) -> Router {
    Router::new()
        .route("/admin/command", post(run_command))
        .route("/oauth/callback", get(oauth_callback))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    (status, [(CONTENT_TYPE, "application/json")], body.to_string()).into_response()
}

#[derive(Deserialize)]
struct CommandRequest {
    user_id: String,
    command: String,
}

/// POST /admin/command: dispatch `command` for `user_id`.
///
/// Always 200 once the request is well formed. Routing and configuration
/// failures are reported to the user as notices, like a chat bot would.
async fn run_command(
    State(state): State<AdminState>,
    axum::Json(body): axum::Json<CommandRequest>,
) -> Response {
    if body.user_id.trim().is_empty() {
        return json_response(
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": "user_id must not be empty" }),
        );
    }

    let notices = Arc::new(CollectedNotices::new());
    let session = AdminSession::new(
        body.user_id.clone(),
        state.config.clone(),
        state.token_store.clone(),
        notices.clone(),
    );

    let command = state
        .commands
        .lookup(&body.command)
        .map(|d| d.name())
        .unwrap_or_else(|| "unknown".to_owned());
    let result = state.commands.dispatch(&body.command, &session).await;

    let mut rendered = notices.take().await;
    let outcome = match result {
        Ok(()) => "ok",
        Err(e) => {
            let (outcome, notice) = render_error(&state.commands, &body.user_id, e);
            rendered.push(notice);
            outcome
        }
    };
    metrics::record_command(&command, outcome);
    info!(user_id = %body.user_id, command = %command, outcome, "command handled");

    json_response(StatusCode::OK, serde_json::json!({ "notices": rendered }))
}

/// Turn a dispatch failure into `(metric outcome, user notice)`.
fn render_error(
    commands: &CommandRouter<AdminSession>,
    user_id: &str,
    err: Error,
) -> (&'static str, String) {
    match err {
        Error::UnknownCommand(input) => (
            "unknown_command",
            format!(
                "Unknown command `{input}`. Available commands:\n{}",
                commands.help(None)
            ),
        ),
        Error::MissingArgument { command, argument } => {
            let usage = commands
                .descriptor(&command)
                .map(|d| d.usage())
                .unwrap_or(command);
            (
                "missing_argument",
                format!("Missing argument `{argument}`. Usage: `{usage}`"),
            )
        }
        Error::Parse(reason) => ("parse_error", format!("Could not parse command: {reason}")),
        Error::Configuration { message, .. } => (
            "configuration_error",
            format!("Failed to handle command: {message}"),
        ),
        err @ (Error::Handler(_) | Error::DuplicateCommand(_)) => {
            error!(user_id, error = %err, "command failed");
            ("failed", "Failed to handle command.".to_owned())
        }
    }
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /oauth/callback: finish the web flow started by `github login`.
async fn oauth_callback(
    State(state): State<AdminState>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, CallbackError> {
    let github = state
        .config
        .github
        .as_ref()
        .ok_or(CallbackError::NotConfigured)?;
    let oauth = github.oauth.as_ref().ok_or(CallbackError::NotConfigured)?;

    let oauth_state = params
        .state
        .as_deref()
        .ok_or(CallbackError::MissingParameter("state"))?;
    if params.error.is_none() && params.code.is_none() {
        return Err(CallbackError::MissingParameter("code"));
    }

    let user_id = state
        .token_store
        .consume_oauth_state(oauth_state)
        .await
        .map_err(|_| CallbackError::UnknownState)?;

    // GitHub redirects with `error` when the user declines.
    if let Some(error) = params.error {
        warn!(user_id = %user_id, error = %error, "GitHub authorization denied");
        return Err(CallbackError::Denied(params.error_description.unwrap_or(error)));
    }
    let code = params
        .code
        .as_deref()
        .ok_or(CallbackError::MissingParameter("code"))?;

    let app = OAuthApp {
        base_url: &github.base_url,
        client_id: &oauth.client_id,
        client_secret: &oauth.client_secret,
        redirect_uri: &oauth.redirect_uri,
    };
    let token = exchange_code(state.token_store.api().http(), app, code)
        .await
        .map_err(|e| {
            warn!(user_id = %user_id, error = %e, "OAuth code exchange failed");
            CallbackError::Exchange(e)
        })?;

    let credential = Credential::from_token_response(token, unix_millis());
    state
        .token_store
        .store_user_token(GITHUB_SERVICE, &user_id, &credential)
        .await
        .map_err(|e| {
            error!(user_id = %user_id, error = %e, "failed to store OAuth credential");
            CallbackError::Store(e)
        })?;

    info!(user_id = %user_id, "GitHub account linked via OAuth");
    metrics::record_oauth_callback("stored");
    Ok((StatusCode::OK, LINKED))
}

/// GET /health
async fn health(State(state): State<AdminState>) -> Response {
    let github = state.config.github.as_ref();
    json_response(
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "github": github.is_some(),
            "oauth": github.is_some_and(|g| g.oauth.is_some()),
        }),
    )
}

/// GET /metrics: Prometheus text exposition format.
async fn metrics_handler(State(state): State<AdminState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}

//! `github ...` account-linking commands
//!
//! - `github login`: start the OAuth web flow
//! - `github setpersonaltoken <accessToken>`: verify and store a PAT
//! - `github status`: report which GitHub account is linked
//!
//! Every command checks configuration before touching the token store or the
//! network, so an unconfigured bridge answers without side effects.

use bot_commands::{CommandArgs, CommandDescriptor, CommandRouter, Error, HandlerFuture, Result};
use common::Secret;
use github_auth::{Credential, GITHUB_SERVICE, TokenErrorCode, build_authorization_url};
use tracing::{error, info};

use crate::config::{GitHubConfig, GitHubOAuthConfig};
use crate::session::AdminSession;

pub const CATEGORY: &str = "github";

/// Error code carried by configuration failures.
pub const NO_GITHUB_SUPPORT: &str = "no-github-support";

const AUTH_FAILED: &str = "Could not authenticate with GitHub. Is your token correct?";
const NOT_AUTHENTICATED: &str = "You are not authenticated, please login.";
const LOGIN_AGAIN: &str = "Your authentication is no longer valid, please login again.";
const UNREADABLE: &str = "Your stored GitHub credential could not be read, please login again.";
const STATUS_UNAVAILABLE: &str =
    "Could not check your GitHub authentication status, please try again later.";

pub fn register(router: &mut CommandRouter<AdminSession>) -> Result<()> {
    router.register(
        CommandDescriptor::new("github login", "Log in to GitHub").category(CATEGORY),
        login,
    )?;
    router.register(
        CommandDescriptor::new(
            "github setpersonaltoken",
            "Set your personal access token for GitHub",
        )
        .category(CATEGORY)
        .required_args(&["accessToken"]),
        set_personal_token,
    )?;
    router.register(
        CommandDescriptor::new(
            "github status",
            "Check the status of your GitHub authentication",
        )
        .category(CATEGORY),
        status,
    )?;
    Ok(())
}

fn github_config(session: &AdminSession) -> Result<&GitHubConfig> {
    session.config.github.as_ref().ok_or_else(|| {
        Error::configuration(
            NO_GITHUB_SUPPORT,
            "The bridge is not configured with GitHub support.",
        )
    })
}

fn oauth_config(github: &GitHubConfig) -> Result<&GitHubOAuthConfig> {
    github.oauth.as_ref().ok_or_else(|| {
        Error::configuration(
            NO_GITHUB_SUPPORT,
            "The bridge is not configured with GitHub OAuth support.",
        )
    })
}

fn login(session: &AdminSession, _args: CommandArgs) -> HandlerFuture<'_> {
    Box::pin(async move {
        let github = github_config(session)?;
        let oauth = oauth_config(github)?;

        let state = session
            .token_store
            .create_state_for_oauth(&session.user_id)
            .await;
        let url = build_authorization_url(
            &github.base_url,
            &oauth.client_id,
            &oauth.redirect_uri,
            &state,
        );
        info!(user_id = %session.user_id, "issued GitHub authorization URL");
        session
            .send_notice(format!("Open {url} to link your account to the bridge."))
            .await;
        Ok(())
    })
}

fn set_personal_token(session: &AdminSession, args: CommandArgs) -> HandlerFuture<'_> {
    Box::pin(async move {
        github_config(session)?;
        let token = args.require("accessToken")?;

        let client = session
            .token_store
            .api()
            .client(Secret::new(token.to_owned()));
        let user = match client.get_authenticated().await {
            Ok(user) => user,
            Err(e) => {
                error!(user_id = %session.user_id, error = %e, "personal access token rejected");
                session.send_notice(AUTH_FAILED).await;
                return Ok(());
            }
        };

        session
            .token_store
            .store_user_token(GITHUB_SERVICE, &session.user_id, &Credential::pat(token))
            .await
            .map_err(Error::handler)?;
        session
            .send_notice(format!("Connected as {}. Token stored.", user.login))
            .await;
        Ok(())
    })
}

fn status(session: &AdminSession, _args: CommandArgs) -> HandlerFuture<'_> {
    Box::pin(async move {
        github_config(session)?;

        let client = match session.token_store.get_client_for_user(&session.user_id).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                session.send_notice(NOT_AUTHENTICATED).await;
                return Ok(());
            }
            Err(e) => {
                let notice = match e.token_code() {
                    Some(TokenErrorCode::Expired) => LOGIN_AGAIN,
                    Some(TokenErrorCode::Malformed) => UNREADABLE,
                    None => {
                        error!(
                            user_id = %session.user_id,
                            error = %e,
                            "failed to load GitHub credential"
                        );
                        STATUS_UNAVAILABLE
                    }
                };
                session.send_notice(notice).await;
                return Ok(());
            }
        };

        match client.get_authenticated().await {
            Ok(user) => {
                session
                    .send_notice(format!("You are logged in as {}", user.login))
                    .await;
            }
            // Revoked on GitHub's side.
            Err(github_auth::Error::Api { status: 401, .. }) => {
                session.send_notice(LOGIN_AGAIN).await;
            }
            Err(e) => {
                error!(user_id = %session.user_id, error = %e, "failed to fetch GitHub identity");
                session.send_notice(STATUS_UNAVAILABLE).await;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use github_auth::{GitHubApi, KeyValueStore, MemoryStore, OAuthCredential, TokenStore};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::Config;
    use crate::session::CollectedNotices;

    const USER: &str = "@alice:example.org";

    const GITHUB_WITH_OAUTH: &str = r#"
[github]
base_url = "https://github.example"

[github.oauth]
client_id = "abc"
redirect_uri = "https://bridge/cb"
"#;

    struct Harness {
        router: CommandRouter<AdminSession>,
        session: AdminSession,
        notices: Arc<CollectedNotices>,
        backend: Arc<MemoryStore>,
        store: Arc<TokenStore>,
    }

    fn harness(config_toml: &str, api_url: &str) -> Harness {
        let config = Arc::new(Config::parse(config_toml).unwrap());
        let backend = Arc::new(MemoryStore::new());
        let store = Arc::new(TokenStore::new(
            backend.clone(),
            GitHubApi::new(reqwest::Client::new(), api_url),
        ));
        let notices = Arc::new(CollectedNotices::new());
        let session = AdminSession::new(USER, config, store.clone(), notices.clone());

        let mut router = CommandRouter::new();
        register(&mut router).unwrap();
        Harness {
            router,
            session,
            notices,
            backend,
            store,
        }
    }

    impl Harness {
        async fn run(&self, input: &str) -> Result<()> {
            self.router.dispatch(input, &self.session).await
        }
    }

    async fn mock_user(server: &MockServer, token: &str, login: &str) {
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "login": login,
                "id": 1
            })))
            .mount(server)
            .await;
    }

    fn assert_no_github_support(result: Result<()>) {
        match result {
            Err(Error::Configuration { code, .. }) => assert_eq!(code, NO_GITHUB_SUPPORT),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unconfigured_bridge_rejects_every_command_before_side_effects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let h = harness("", &server.uri());

        assert_no_github_support(h.run("github login").await);
        assert_no_github_support(h.run("github setpersonaltoken ghp_x").await);
        assert_no_github_support(h.run("github status").await);

        assert!(h.notices.take().await.is_empty());
        assert!(h.backend.get("github:@alice:example.org").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_without_oauth_is_configuration_error() {
        let h = harness("[github]\n", "http://127.0.0.1:9");
        let err = h.run("github login").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "The bridge is not configured with GitHub OAuth support."
        );
    }

    #[tokio::test]
    async fn login_sends_authorization_url_bound_to_user() {
        let h = harness(GITHUB_WITH_OAUTH, "http://127.0.0.1:9");
        h.run("github login").await.unwrap();

        let notices = h.notices.take().await;
        assert_eq!(notices.len(), 1);
        let notice = &notices[0];
        let prefix = "Open https://github.example/login/oauth/authorize?client_id=abc&redirect_uri=https%3A%2F%2Fbridge%2Fcb&state=";
        assert!(notice.starts_with(prefix), "got: {notice}");
        assert!(notice.ends_with(" to link your account to the bridge."));

        let state = notice[prefix.len()..]
            .trim_end_matches(" to link your account to the bridge.")
            .to_owned();
        assert_eq!(h.store.consume_oauth_state(&state).await.unwrap(), USER);
        assert!(h.backend.get("github:@alice:example.org").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn personal_token_is_stored_after_verification() {
        let server = MockServer::start().await;
        mock_user(&server, "ghp_good", "octocat").await;
        let h = harness("[github]\n", &server.uri());

        h.run("github setpersonaltoken ghp_good").await.unwrap();

        assert_eq!(
            h.notices.take().await,
            ["Connected as octocat. Token stored."]
        );
        let stored = h
            .store
            .get_user_token(GITHUB_SERVICE, USER)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, Credential::pat("ghp_good"));
    }

    #[tokio::test]
    async fn rejected_personal_token_is_not_stored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "message": "Bad credentials"
            })))
            .mount(&server)
            .await;
        let h = harness("[github]\n", &server.uri());

        h.run("github setpersonaltoken ghp_bad").await.unwrap();

        assert_eq!(h.notices.take().await, [AUTH_FAILED]);
        assert!(h.backend.get("github:@alice:example.org").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejected_personal_token_keeps_existing_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer ghp_bad"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "message": "Bad credentials"
            })))
            .mount(&server)
            .await;
        let h = harness("[github]\n", &server.uri());
        h.store
            .store_user_token(GITHUB_SERVICE, USER, &Credential::pat("ghp_old"))
            .await
            .unwrap();

        h.run("github setpersonaltoken ghp_bad").await.unwrap();

        assert_eq!(h.notices.take().await, [AUTH_FAILED]);
        let stored = h
            .store
            .get_user_token(GITHUB_SERVICE, USER)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, Credential::pat("ghp_old"));
    }

    #[tokio::test]
    async fn setpersonaltoken_requires_token() {
        let h = harness("[github]\n", "http://127.0.0.1:9");
        let err = h.run("github setpersonaltoken").await.unwrap_err();
        assert!(
            matches!(err, Error::MissingArgument { ref argument, .. } if argument == "accessToken"),
            "got: {err:?}"
        );
        assert!(h.notices.take().await.is_empty());
    }

    #[tokio::test]
    async fn status_without_credential_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let h = harness("[github]\n", &server.uri());

        h.run("github status").await.unwrap();
        assert_eq!(h.notices.take().await, [NOT_AUTHENTICATED]);
    }

    #[tokio::test]
    async fn status_reports_linked_login() {
        let server = MockServer::start().await;
        mock_user(&server, "ghp_good", "octocat").await;
        let h = harness("[github]\n", &server.uri());
        h.store
            .store_user_token(GITHUB_SERVICE, USER, &Credential::pat("ghp_good"))
            .await
            .unwrap();

        h.run("github status").await.unwrap();
        assert_eq!(h.notices.take().await, ["You are logged in as octocat"]);
    }

    #[tokio::test]
    async fn status_ignores_surplus_arguments() {
        let h = harness("[github]\n", "http://127.0.0.1:9");
        h.run("github status extraArg").await.unwrap();
        assert_eq!(h.notices.take().await, [NOT_AUTHENTICATED]);
    }

    #[tokio::test]
    async fn status_with_expired_token_asks_for_login() {
        let h = harness("[github]\n", "http://127.0.0.1:9");
        let expired = Credential::OAuth(OAuthCredential {
            access_token: "gho_old".into(),
            refresh_token: None,
            expires_at: Some(1_000),
            refresh_token_expires_at: None,
        });
        h.store
            .store_user_token(GITHUB_SERVICE, USER, &expired)
            .await
            .unwrap();

        h.run("github status").await.unwrap();
        assert_eq!(h.notices.take().await, [LOGIN_AGAIN]);
    }

    #[tokio::test]
    async fn status_with_malformed_record_asks_for_login() {
        let h = harness("[github]\n", "http://127.0.0.1:9");
        h.backend
            .set("github:@alice:example.org", json!({"token_type": "carrier-pigeon"}))
            .await
            .unwrap();

        h.run("github status").await.unwrap();
        assert_eq!(h.notices.take().await, [UNREADABLE]);
    }

    #[tokio::test]
    async fn status_with_revoked_token_asks_for_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let h = harness("[github]\n", &server.uri());
        h.store
            .store_user_token(GITHUB_SERVICE, USER, &Credential::pat("ghp_revoked"))
            .await
            .unwrap();

        h.run("github status").await.unwrap();
        assert_eq!(h.notices.take().await, [LOGIN_AGAIN]);
    }

    #[tokio::test]
    async fn status_reports_unavailable_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let h = harness("[github]\n", &server.uri());
        h.store
            .store_user_token(GITHUB_SERVICE, USER, &Credential::pat("ghp_good"))
            .await
            .unwrap();

        h.run("github status").await.unwrap();
        assert_eq!(h.notices.take().await, [STATUS_UNAVAILABLE]);
    }

    #[test]
    fn commands_are_listed_under_github_category() {
        let mut router = CommandRouter::<AdminSession>::new();
        register(&mut router).unwrap();
        let help = router.help(Some(CATEGORY));
        assert!(help.contains("- `github login` - Log in to GitHub"));
        assert!(help.contains(
            "- `github setpersonaltoken <accessToken>` - Set your personal access token for GitHub"
        ));
        assert!(help.contains(
            "- `github status` - Check the status of your GitHub authentication"
        ));
    }
}

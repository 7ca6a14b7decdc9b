//! Authenticated GitHub REST client
//!
//! Only the identity lookup (`GET /user`) is needed: it validates a token and
//! tells the user which account is linked.

use common::Secret;
use reqwest::Url;
use reqwest::header::{ACCEPT, USER_AGENT as USER_AGENT_HEADER};
use serde::Deserialize;
use tracing::debug;

use crate::constants::{API_VERSION, GITHUB_API_URL, USER_AGENT};
use crate::error::{Error, Result};

/// The account a token belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatedUser {
    pub login: String,
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Shared HTTP client plus API root, used to mint per-token clients.
#[derive(Debug, Clone)]
pub struct GitHubApi {
    http: reqwest::Client,
    api_url: String,
}

impl GitHubApi {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_owned();
        Self { http, api_url }
    }

    /// REST root for a GitHub web origin: `api.github.com` for github.com,
    /// `{base}/api/v3` for GitHub Enterprise Server.
    pub fn api_url_for(base_url: &Url) -> String {
        match base_url.host_str() {
            Some("github.com") | Some("www.github.com") => GITHUB_API_URL.to_owned(),
            _ => format!("{}/api/v3", base_url.as_str().trim_end_matches('/')),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// A client acting as the owner of `token`.
    pub fn client(&self, token: Secret<String>) -> GitHubClient {
        GitHubClient {
            http: self.http.clone(),
            api_url: self.api_url.clone(),
            token,
        }
    }
}

/// Client bound to one user's token.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Secret<String>,
}

impl GitHubClient {
    /// Fetch the authenticated user (`GET /user`).
    pub async fn get_authenticated(&self) -> Result<AuthenticatedUser> {
        let response = self
            .http
            .get(format!("{}/user", self.api_url))
            .bearer_auth(self.token.expose())
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(USER_AGENT_HEADER, USER_AGENT)
            .send()
            .await
            .map_err(|e| Error::Http(format!("GET /user failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let user = response
            .json::<AuthenticatedUser>()
            .await
            .map_err(|e| Error::Http(format!("invalid /user response: {e}")))?;
        debug!(login = user.login, "resolved authenticated GitHub user");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn api_url_for_public_github() {
        let base = Url::parse("https://github.com").unwrap();
        assert_eq!(GitHubApi::api_url_for(&base), "https://api.github.com");
    }

    #[test]
    fn api_url_for_enterprise() {
        let base = Url::parse("https://ghe.corp.example/").unwrap();
        assert_eq!(
            GitHubApi::api_url_for(&base),
            "https://ghe.corp.example/api/v3"
        );
    }

    #[tokio::test]
    async fn get_authenticated_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer ghp_valid"))
            .and(header("x-github-api-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "login": "octocat",
                "id": 583231,
                "name": "The Octocat"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = GitHubApi::new(reqwest::Client::new(), format!("{}/", server.uri()));
        let user = api
            .client(Secret::new("ghp_valid".to_string()))
            .get_authenticated()
            .await
            .unwrap();
        assert_eq!(user.login, "octocat");
        assert_eq!(user.id, 583231);
    }

    #[tokio::test]
    async fn bad_credentials_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"message": "Bad credentials"})),
            )
            .mount(&server)
            .await;

        let api = GitHubApi::new(reqwest::Client::new(), server.uri());
        let err = api
            .client(Secret::new("ghp_revoked".to_string()))
            .get_authenticated()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { status: 401, .. }), "got: {err}");
    }
}

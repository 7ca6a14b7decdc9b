//! OAuth web flow: authorization URL and code exchange
//!
//! 1. `build_authorization_url()` points the user at
//!    `{base_url}/login/oauth/authorize` with `client_id`, `redirect_uri`
//!    and `state`.
//! 2. GitHub redirects to `redirect_uri?code=..&state=..`.
//! 3. `exchange_code()` POSTs the code to `{base_url}/login/oauth/access_token`.
//!
//! GitHub answers a failed exchange with HTTP 200 and an `error` field, so
//! the body is checked for both shapes.

use common::Secret;
use reqwest::Url;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::constants::{ACCESS_TOKEN_PATH, AUTHORIZE_PATH, USER_AGENT};
use crate::error::{Error, Result};

/// Build the URL the user opens to authorize the bridge.
///
/// The path is replaced (not appended), so a base URL with a trailing path
/// still yields `/login/oauth/authorize`. Query values are form-urlencoded.
pub fn build_authorization_url(
    base_url: &Url,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> String {
    let mut url = endpoint(base_url, AUTHORIZE_PATH);
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", state);
    url.to_string()
}

/// Successful reply from the access token endpoint.
///
/// `expires_in` and `refresh_token_expires_in` are only present when the
/// OAuth app has token expiration enabled.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Secret<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<Secret<String>>,
    #[serde(default)]
    pub refresh_token_expires_in: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AccessTokenReply {
    Token(TokenResponse),
    Error {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
}

/// Client registration used for the code exchange.
#[derive(Debug, Clone, Copy)]
pub struct OAuthApp<'a> {
    pub base_url: &'a Url,
    pub client_id: &'a str,
    pub client_secret: &'a Secret<String>,
    pub redirect_uri: &'a str,
}

/// Exchange an authorization code for an access token.
pub async fn exchange_code(
    client: &reqwest::Client,
    app: OAuthApp<'_>,
    code: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint(app.base_url, ACCESS_TOKEN_PATH))
        .header(ACCEPT, "application/json")
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .form(&[
            ("client_id", app.client_id),
            ("client_secret", app.client_secret.expose().as_str()),
            ("code", code),
            ("redirect_uri", app.redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    match response
        .json::<AccessTokenReply>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?
    {
        AccessTokenReply::Token(token) => Ok(token),
        AccessTokenReply::Error {
            error,
            error_description,
        } => Err(Error::TokenExchange(match error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        })),
    }
}

fn endpoint(base_url: &Url, path: &str) -> Url {
    let mut url = base_url.clone();
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn authorization_url_matches_expected_shape() {
        let base = Url::parse("https://github.example").unwrap();
        let url = build_authorization_url(&base, "abc", "https://bridge/cb", "s7a7e");
        assert_eq!(
            url,
            "https://github.example/login/oauth/authorize?client_id=abc&redirect_uri=https%3A%2F%2Fbridge%2Fcb&state=s7a7e"
        );
    }

    #[test]
    fn authorization_url_replaces_base_path() {
        let base = Url::parse("https://ghe.corp.example/some/path/?q=1").unwrap();
        let url = build_authorization_url(&base, "id", "https://bridge/cb", "st");
        assert!(
            url.starts_with("https://ghe.corp.example/login/oauth/authorize?"),
            "got: {url}"
        );
        assert!(!url.contains("q=1"));
    }

    fn app<'a>(base: &'a Url, secret: &'a Secret<String>) -> OAuthApp<'a> {
        OAuthApp {
            base_url: base,
            client_id: "abc",
            client_secret: secret,
            redirect_uri: "https://bridge/cb",
        }
    }

    #[tokio::test]
    async fn exchange_code_returns_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("client_secret=shh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "gho_abc",
                "token_type": "bearer",
                "scope": "",
                "expires_in": 28800,
                "refresh_token": "ghr_def",
                "refresh_token_expires_in": 15811200
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let secret = Secret::new("shh".to_string());
        let token = exchange_code(&reqwest::Client::new(), app(&base, &secret), "the-code")
            .await
            .unwrap();
        assert_eq!(token.access_token.expose(), "gho_abc");
        assert_eq!(token.expires_in, Some(28800));
    }

    #[tokio::test]
    async fn exchange_code_surfaces_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired."
            })))
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let secret = Secret::new("shh".to_string());
        let err = exchange_code(&reqwest::Client::new(), app(&base, &secret), "stale")
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("bad_verification_code"),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn exchange_code_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let secret = Secret::new("shh".to_string());
        let result = exchange_code(&reqwest::Client::new(), app(&base, &secret), "c").await;
        assert!(matches!(result, Err(Error::TokenExchange(_))));
    }
}

//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client secret is loaded from GITHUB_OAUTH_CLIENT_SECRET or
//! client_secret_file, never stored in the TOML directly to avoid leaking it.

use common::Secret;
use github_auth::{GITHUB_BASE_URL, GitHubApi};
use reqwest::Url;
use serde::{Deserialize, Deserializer};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Env var holding the OAuth app's client secret.
pub const CLIENT_SECRET_ENV: &str = "GITHUB_OAUTH_CLIENT_SECRET";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Absent: the bridge has no GitHub support and every GitHub command
    /// answers with a configuration error.
    #[serde(default)]
    pub github: Option<GitHubConfig>,
}

/// Admin listener settings
#[derive(Debug, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Timeout for GitHub HTTP calls
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

/// Token persistence. Without a path tokens live in memory only.
#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// GitHub integration
#[derive(Debug, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_base_url", deserialize_with = "deserialize_url")]
    pub base_url: Url,
    /// REST API root; derived from base_url when unset.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Absent: `github login` is unavailable, personal tokens still work.
    #[serde(default)]
    pub oauth: Option<GitHubOAuthConfig>,
}

impl GitHubConfig {
    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| GitHubApi::api_url_for(&self.base_url))
    }
}

/// GitHub OAuth app registration
#[derive(Debug, Deserialize)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(skip)]
    pub client_secret: Secret<String>,
    /// Path to a file containing the client secret (alternative to the env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    256
}

fn default_base_url() -> Url {
    Url::parse(GITHUB_BASE_URL).expect("GITHUB_BASE_URL is a valid URL")
}

fn deserialize_url<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Url, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Url::parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid URL {raw:?}: {e}")))
}

fn require_http(field: &str, url: &str) -> common::Result<()> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(common::Error::Config(format!(
            "{field} must be an absolute http:// or https:// URL, got: {url}"
        ))),
    }
}

impl Config {
    /// Parse and validate TOML. Secrets are not resolved here.
    pub fn parse(contents: &str) -> common::Result<Self> {
        let config: Config = toml::from_str(contents)?;

        if config.admin.timeout_secs == 0 {
            return Err(common::Error::Config(
                "admin.timeout_secs must be greater than 0".into(),
            ));
        }
        if config.admin.max_connections == 0 {
            return Err(common::Error::Config(
                "admin.max_connections must be greater than 0".into(),
            ));
        }

        if let Some(github) = &config.github {
            require_http("github.base_url", github.base_url.as_str())?;
            if let Some(api_url) = &github.api_url {
                require_http("github.api_url", api_url)?;
            }
            if let Some(oauth) = &github.oauth {
                if oauth.client_id.trim().is_empty() {
                    return Err(common::Error::Config(
                        "github.oauth.client_id must not be empty".into(),
                    ));
                }
                require_http("github.oauth.redirect_uri", &oauth.redirect_uri)?;
            }
        }

        Ok(config)
    }

    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. GITHUB_OAUTH_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;

        if let Some(oauth) = config.github.as_mut().and_then(|g| g.oauth.as_mut()) {
            if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
                oauth.client_secret = Secret::new(secret);
            } else if let Some(ref secret_file) = oauth.client_secret_file {
                let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                    common::Error::Config(format!(
                        "failed to read client_secret_file {}: {e}",
                        secret_file.display()
                    ))
                })?;
                oauth.client_secret = Secret::new(secret.trim().to_owned());
            }

            if oauth.client_secret.is_blank() {
                return Err(common::Error::Config(format!(
                    "github.oauth requires a client secret via {CLIENT_SECRET_ENV} or client_secret_file"
                )));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("github-bridge-admin.toml")
    }
}

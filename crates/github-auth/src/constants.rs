//! GitHub endpoints and OAuth flow constants

use std::time::Duration;

/// Public github.com web origin (authorize / access_token live here).
pub const GITHUB_BASE_URL: &str = "https://github.com";

/// REST API root for github.com. Enterprise servers use `{base}/api/v3`.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Path of the authorization page, relative to the web origin.
pub const AUTHORIZE_PATH: &str = "/login/oauth/authorize";

/// Path of the code exchange endpoint, relative to the web origin.
pub const ACCESS_TOKEN_PATH: &str = "/login/oauth/access_token";

/// REST API version pinned in every request.
pub const API_VERSION: &str = "2022-11-28";

/// GitHub rejects API requests without a User-Agent.
pub const USER_AGENT: &str = concat!("github-bridge-admin/", env!("CARGO_PKG_VERSION"));

/// Service name under which GitHub credentials are stored.
pub const GITHUB_SERVICE: &str = "github";

/// How long a pending OAuth state stays consumable.
pub const STATE_EXPIRY: Duration = Duration::from_secs(600);

/// Random bytes per OAuth state (43 chars once base64url encoded).
pub const STATE_BYTES: usize = 32;

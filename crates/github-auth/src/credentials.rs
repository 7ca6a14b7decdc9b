//! Stored GitHub credentials
//!
//! A user links their GitHub account either through the OAuth web flow or by
//! pasting a personal access token. Both end up as a [`Credential`], persisted
//! as a JSON record tagged by `token_type`:
//!
//! ```json
//! {"token_type":"oauth","access_token":"gho_..","refresh_token":"ghr_..","expires_at":1735500000000}
//! {"token_type":"pat","access_token":"ghp_.."}
//! ```
//!
//! Timestamps are unix milliseconds (absolute, not a delta), computed at
//! storage time from the token endpoint's `expires_in` seconds.

use std::time::{SystemTime, UNIX_EPOCH};

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::oauth::TokenResponse;

/// One user's link to GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "token_type")]
pub enum Credential {
    #[serde(rename = "oauth")]
    OAuth(OAuthCredential),
    #[serde(rename = "pat")]
    Pat(PatCredential),
}

/// Token obtained through the OAuth web flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCredential {
    pub access_token: Secret<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret<String>>,
    /// Expiry as unix ms. `None` for OAuth apps with token expiration disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_at: Option<u64>,
}

/// Personal access token supplied by the user. Never expires from our side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatCredential {
    pub access_token: Secret<String>,
}

impl Credential {
    pub fn pat(access_token: impl Into<Secret<String>>) -> Self {
        Credential::Pat(PatCredential {
            access_token: access_token.into(),
        })
    }

    /// Build an OAuth credential from a code exchange, anchoring the
    /// `expires_in` deltas at `now_millis`. Deltas too large to represent
    /// saturate at `u64::MAX`.
    pub fn from_token_response(response: TokenResponse, now_millis: u64) -> Self {
        let deadline = |secs: u64| now_millis.saturating_add(secs.saturating_mul(1000));
        Credential::OAuth(OAuthCredential {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_in.map(deadline),
            refresh_token_expires_at: response.refresh_token_expires_in.map(deadline),
        })
    }

    pub fn access_token(&self) -> &Secret<String> {
        match self {
            Credential::OAuth(c) => &c.access_token,
            Credential::Pat(c) => &c.access_token,
        }
    }

    /// The `token_type` tag written to storage.
    pub fn token_type(&self) -> &'static str {
        match self {
            Credential::OAuth(_) => "oauth",
            Credential::Pat(_) => "pat",
        }
    }

    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        match self {
            Credential::OAuth(c) => c.expires_at.is_some_and(|at| at <= now_millis),
            Credential::Pat(_) => false,
        }
    }

    /// Reject credentials that could never authenticate.
    pub fn validate(&self) -> Result<()> {
        if self.access_token().is_blank() {
            return Err(Error::malformed(format!(
                "{} credential has an empty access_token",
                self.token_type()
            )));
        }
        Ok(())
    }

    /// Encode as the storage record.
    pub fn to_payload(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| Error::malformed(format!("serializing credential: {e}")))
    }

    /// Decode and validate a storage record.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self> {
        let credential: Credential = serde_json::from_value(payload)
            .map_err(|e| Error::malformed(format!("decoding stored credential: {e}")))?;
        credential.validate()?;
        Ok(credential)
    }
}

/// Current time as unix milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

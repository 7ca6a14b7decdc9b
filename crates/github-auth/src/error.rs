//! Error types for GitHub credential operations

use std::fmt;

/// Why a stored credential cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorCode {
    /// OAuth access token is past its `expires_at`.
    Expired,
    /// Payload missing, empty, or not a recognised `token_type`.
    Malformed,
}

impl fmt::Display for TokenErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenErrorCode::Expired => f.write_str("expired"),
            TokenErrorCode::Malformed => f.write_str("malformed"),
        }
    }
}

/// Errors from token storage, OAuth state handling and the GitHub API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("token {code}: {message}")]
    Token {
        code: TokenErrorCode,
        message: String,
    },

    #[error("OAuth state not found (expired, already used, or never issued)")]
    StateNotFound,

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("GitHub API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("token exchange failed: {0}")]
    TokenExchange(String),
}

impl Error {
    pub fn expired(message: impl Into<String>) -> Self {
        Error::Token {
            code: TokenErrorCode::Expired,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Error::Token {
            code: TokenErrorCode::Malformed,
            message: message.into(),
        }
    }

    /// The token error kind, if this is a credential problem.
    pub fn token_code(&self) -> Option<TokenErrorCode> {
        match self {
            Error::Token { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_code_only_for_token_errors() {
        assert_eq!(
            Error::expired("gone").token_code(),
            Some(TokenErrorCode::Expired)
        );
        assert_eq!(
            Error::malformed("bad json").token_code(),
            Some(TokenErrorCode::Malformed)
        );
        assert_eq!(Error::StateNotFound.token_code(), None);
        assert_eq!(Error::Http("reset".into()).token_code(), None);
    }

    #[test]
    fn display_names_the_kind() {
        assert_eq!(
            Error::expired("expired at 1000").to_string(),
            "token expired: expired at 1000"
        );
        let api = Error::Api {
            status: 401,
            body: "Bad credentials".into(),
        };
        assert_eq!(api.to_string(), "GitHub API returned 401: Bad credentials");
    }
}

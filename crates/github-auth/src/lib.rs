//! GitHub account linking for the bridge
//!
//! Stores per-user GitHub credentials and runs the OAuth state correlation
//! the login flow needs. This crate has no dependency on the command layer or
//! the HTTP service; it can be tested and used on its own.
//!
//! Credential flow:
//! 1. `github login` calls `TokenStore::create_state_for_oauth()` and sends the
//!    user `oauth::build_authorization_url()`
//! 2. GitHub redirects to the callback with `code` and `state`
//! 3. The callback calls `TokenStore::consume_oauth_state()` to find the user,
//!    then `oauth::exchange_code()`
//! 4. The token is saved via `TokenStore::store_user_token()`
//! 5. Later commands call `TokenStore::get_client_for_user()`; expired or
//!    unreadable credentials come back as `Error::Token`
//!
//! Personal access tokens skip steps 1-3: the token is checked with
//! `GitHubClient::get_authenticated()` and stored directly.

pub mod client;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod oauth;
pub mod persistence;
pub mod state;
pub mod store;

pub use client::{AuthenticatedUser, GitHubApi, GitHubClient};
pub use constants::*;
pub use credentials::{Credential, OAuthCredential, PatCredential, unix_millis};
pub use error::{Error, Result, TokenErrorCode};
pub use oauth::{OAuthApp, TokenResponse, build_authorization_url, exchange_code};
pub use persistence::{JsonFileStore, KeyValueStore, MemoryStore, StoreFuture};
pub use state::{OAuthStateRegistry, generate_state};
pub use store::TokenStore;

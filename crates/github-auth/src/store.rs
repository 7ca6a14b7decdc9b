//! Per-user credential store
//!
//! Ties together the persistence backend, the pending OAuth state registry and
//! the GitHub API. Callers get three distinguishable outcomes when asking for
//! a user's client:
//!
//! - `Ok(None)`: never linked; prompt a login.
//! - `Err(Error::Token { .. })`: linked, but the credential is unusable
//!   (expired or malformed); prompt a re-login.
//! - `Ok(Some(client))`: ready to call GitHub.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::{GitHubApi, GitHubClient};
use crate::constants::GITHUB_SERVICE;
use crate::credentials::{Credential, unix_millis};
use crate::error::{Error, Result};
use crate::persistence::KeyValueStore;
use crate::state::OAuthStateRegistry;

pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
    states: OAuthStateRegistry,
    api: GitHubApi,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, api: GitHubApi) -> Self {
        Self::with_state_registry(backend, api, OAuthStateRegistry::default())
    }

    pub fn with_state_registry(
        backend: Arc<dyn KeyValueStore>,
        api: GitHubApi,
        states: OAuthStateRegistry,
    ) -> Self {
        Self {
            backend,
            states,
            api,
        }
    }

    pub fn api(&self) -> &GitHubApi {
        &self.api
    }

    /// Issue an OAuth state bound to `user_id` for the authorization URL.
    pub async fn create_state_for_oauth(&self, user_id: &str) -> String {
        self.states.create(user_id).await
    }

    /// Redeem a state from the OAuth callback. Single use.
    pub async fn consume_oauth_state(&self, state: &str) -> Result<String> {
        self.states.consume(state).await
    }

    /// Persist `credential` for `(service, user_id)`, replacing any previous one.
    pub async fn store_user_token(
        &self,
        service: &str,
        user_id: &str,
        credential: &Credential,
    ) -> Result<()> {
        credential.validate()?;
        let payload = credential.to_payload()?;
        self.backend
            .set(&storage_key(service, user_id), payload)
            .await?;
        info!(
            service,
            user_id,
            token_type = credential.token_type(),
            "stored user token"
        );
        Ok(())
    }

    /// Read the credential for `(service, user_id)`, if any.
    pub async fn get_user_token(
        &self,
        service: &str,
        user_id: &str,
    ) -> Result<Option<Credential>> {
        let Some(payload) = self.backend.get(&storage_key(service, user_id)).await? else {
            return Ok(None);
        };
        Credential::from_payload(payload)
            .map(Some)
            .inspect_err(|e| warn!(service, user_id, error = %e, "stored credential unreadable"))
    }

    /// Build an authenticated GitHub client for `user_id`.
    ///
    /// Expired OAuth tokens are reported as `Token { code: Expired }` rather
    /// than handed out as a client that would fail on first use.
    pub async fn get_client_for_user(&self, user_id: &str) -> Result<Option<GitHubClient>> {
        let Some(credential) = self.get_user_token(GITHUB_SERVICE, user_id).await? else {
            debug!(user_id, "no GitHub credential stored");
            return Ok(None);
        };

        let now = unix_millis();
        if credential.is_expired_at(now) {
            return Err(Error::expired(format!(
                "GitHub OAuth token for {user_id} has expired"
            )));
        }

        Ok(Some(self.api.client(credential.access_token().clone())))
    }
}

fn storage_key(service: &str, user_id: &str) -> String {
    format!("{service}:{user_id}")
}

//! Pending OAuth states
//!
//! `github login` issues a random state value and embeds it in the
//! authorization URL. GitHub echoes it back to the callback, which consumes it
//! to learn which user started the flow. Entries are keyed by their own random
//! value, so users never contend on each other's entries; removal under the
//! lock makes consumption single-use even when two callbacks race.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::constants::{STATE_BYTES, STATE_EXPIRY};
use crate::error::{Error, Result};

struct PendingState {
    user_id: String,
    created_at: Instant,
}

/// Process-wide registry of states awaiting their callback.
pub struct OAuthStateRegistry {
    pending: Mutex<HashMap<String, PendingState>>,
    expiry: Duration,
}

impl Default for OAuthStateRegistry {
    fn default() -> Self {
        Self::new(STATE_EXPIRY)
    }
}

impl OAuthStateRegistry {
    pub fn new(expiry: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    /// Issue a fresh state bound to `user_id`.
    pub async fn create(&self, user_id: &str) -> String {
        let mut pending = self.pending.lock().await;
        // Lazy cleanup while holding the lock
        pending.retain(|_, s| s.created_at.elapsed() < self.expiry);

        let mut state = generate_state();
        while pending.contains_key(&state) {
            state = generate_state();
        }
        pending.insert(
            state.clone(),
            PendingState {
                user_id: user_id.to_owned(),
                created_at: Instant::now(),
            },
        );
        debug!(user_id, pending = pending.len(), "issued OAuth state");
        state
    }

    /// Remove `state` and return the user who requested it.
    pub async fn consume(&self, state: &str) -> Result<String> {
        let entry = self.pending.lock().await.remove(state);
        match entry {
            Some(entry) if entry.created_at.elapsed() < self.expiry => Ok(entry.user_id),
            Some(entry) => {
                debug!(user_id = entry.user_id, "OAuth state expired");
                Err(Error::StateNotFound)
            }
            None => Err(Error::StateNotFound),
        }
    }

    /// Number of states awaiting a callback (including not-yet-pruned expired ones).
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Generate an unguessable state value: 32 CSPRNG bytes, base64url, no padding.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

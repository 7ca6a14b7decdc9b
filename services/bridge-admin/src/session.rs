//! Per-command execution context
//!
//! A session is the "who is asking, and where do replies go" half of a
//! command. Handlers never talk to a transport directly; they push notices
//! into the session's [`NoticeSink`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use github_auth::TokenStore;
use tokio::sync::Mutex;

use crate::config::Config;

pub type NoticeFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Destination for user-facing notices.
pub trait NoticeSink: Send + Sync {
    fn send_notice<'a>(&'a self, body: String) -> NoticeFuture<'a>;
}

/// Buffers notices for a request/response transport.
#[derive(Debug, Default)]
pub struct CollectedNotices {
    notices: Mutex<Vec<String>>,
}

impl CollectedNotices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything sent so far, in order.
    pub async fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.notices.lock().await)
    }
}

impl NoticeSink for CollectedNotices {
    fn send_notice<'a>(&'a self, body: String) -> NoticeFuture<'a> {
        Box::pin(async move {
            self.notices.lock().await.push(body);
        })
    }
}

pub struct AdminSession {
    pub user_id: String,
    pub config: Arc<Config>,
    pub token_store: Arc<TokenStore>,
    notices: Arc<dyn NoticeSink>,
}

impl AdminSession {
    pub fn new(
        user_id: impl Into<String>,
        config: Arc<Config>,
        token_store: Arc<TokenStore>,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            config,
            token_store,
            notices,
        }
    }

    pub async fn send_notice(&self, body: impl Into<String>) {
        self.notices.send_notice(body.into()).await;
    }
}

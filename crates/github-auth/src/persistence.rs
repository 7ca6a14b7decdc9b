//! Key-value persistence behind the token store
//!
//! The token store only needs "read the record at key" and "replace the record
//! at key". Two backends:
//!
//! - [`MemoryStore`]: process-local, lost on restart. Used when no store path
//!   is configured, and in tests.
//! - [`JsonFileStore`]: a JSON object on disk. Writes build the next state,
//!   persist it with temp-file + rename, and only then swap it in memory, so a
//!   failed write leaves both disk and memory at the previous state.
//!
//! Each `set` replaces the whole value under the lock; readers see either the
//! old record or the new one.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Boxed future returned by [`KeyValueStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Persistence collaborator for credential records.
///
/// Uses `Pin<Box<dyn Future>>` return types so stores can be shared as
/// `Arc<dyn KeyValueStore>`.
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>>;

    /// Replace the record at `key`. Last write wins.
    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
        Box::pin(async move { Ok(self.records.read().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.records.write().await.insert(key.to_owned(), value);
            Ok(())
        })
    }
}

/// JSON-file store. The file holds one object mapping keys to records.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, Value>>,
}

impl JsonFileStore {
    /// Load records from `path`, creating an empty `{}` file on first start.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::Persistence(format!("checking token file: {e}")))?
        {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Persistence(format!("reading token file: {e}")))?;
            let records: HashMap<String, Value> = serde_json::from_str(&contents)
                .map_err(|e| Error::Persistence(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), records = records.len(), "loaded token file");
            records
        } else {
            info!(path = %path.display(), "token file not found, starting empty");
            let records = HashMap::new();
            write_atomic(&path, &records).await?;
            records
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl KeyValueStore for JsonFileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
        Box::pin(async move { Ok(self.state.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let mut next = state.clone();
            next.insert(key.to_owned(), value);
            write_atomic(&self.path, &next).await?;
            *state = next;
            debug!(key, "stored record");
            Ok(())
        })
    }
}

/// Write records atomically with 0600 permissions (the file holds tokens).
async fn write_atomic(path: &Path, records: &HashMap<String, Value>) -> Result<()> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| Error::Persistence(format!("serializing token file: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Persistence("token file path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tokens".into());
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Persistence(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| Error::Persistence(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Persistence(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token file");
    Ok(())
}

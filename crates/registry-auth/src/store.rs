//! Bearer token persistence
//!
//! The client treats storage as an injected dependency with `get/set/clear`.
//! `MemoryTokenStore` keeps the token for the life of the process;
//! `FileTokenStore` persists it as a small JSON object keyed by
//! [`STORAGE_KEY`], so a CLI session survives between invocations.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::constants::STORAGE_KEY;
use crate::error::{Error, Result};

/// Storage for the single bearer token.
///
/// Uses `Pin<Box<dyn Future>>` return types so stores can be shared as
/// `Arc<dyn TokenStore>`.
pub trait TokenStore: Send + Sync {
    /// Current token, or `None` when no session exists.
    fn get(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>>;

    /// Replace the stored token.
    fn set<'a>(&'a self, token: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Forget the stored token. Clearing an empty store is not an error.
    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// In-process token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { self.token.read().await.clone() })
    }

    fn set<'a>(&'a self, token: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            *self.token.write().await = Some(token.to_string());
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.token.write().await.take();
            Ok(())
        })
    }
}

/// Token store backed by a JSON file.
///
/// The Mutex serializes writes; reads are served from the in-memory copy.
/// Every write goes through a temp file + rename with 0600 permissions.
pub struct FileTokenStore {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileTokenStore {
    /// Open the store at `path`, creating an empty file if none exists.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Store(format!("reading token file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Store(format!("parsing token file: {e}")))?;
            info!(
                path = %path.display(),
                has_token = entries.contains_key(STORAGE_KEY),
                "loaded token file"
            );
            entries
        } else {
            info!(path = %path.display(), "token file not found, starting signed out");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.get(STORAGE_KEY).cloned() })
    }

    fn set<'a>(&'a self, token: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(STORAGE_KEY.to_string(), token.to_string());
            debug!("stored token");
            write_atomic(&self.path, &state).await
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.remove(STORAGE_KEY).is_some() {
                debug!("cleared token");
                write_atomic(&self.path, &state).await?;
            }
            Ok(())
        })
    }
}

/// Write the token map atomically (temp file in the same directory, then rename).
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Store(format!("serializing token file: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Store("token path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".token.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Store(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Store(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Store(format!("renaming temp token file: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_set_then_get_returns_same_string() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get().await, None);

        store.set("eyJ.abc.def").await.unwrap();
        assert_eq!(store.get().await.as_deref(), Some("eyJ.abc.def"));

        store.clear().await.unwrap();
        assert_eq!(store.get().await, None);
    }

    #[tokio::test]
    async fn memory_clear_when_empty_is_ok() {
        let store = MemoryTokenStore::new();
        store.clear().await.unwrap();
        assert_eq!(store.get().await, None);
    }

    #[tokio::test]
    async fn file_roundtrip_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::load(path.clone()).await.unwrap();
        store.set("tok-123").await.unwrap();
        assert_eq!(store.get().await.as_deref(), Some("tok-123"));

        let reopened = FileTokenStore::load(path.clone()).await.unwrap();
        assert_eq!(reopened.get().await.as_deref(), Some("tok-123"));

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed[STORAGE_KEY], "tok-123");
    }

    #[tokio::test]
    async fn file_clear_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::load(path.clone()).await.unwrap();
        store.set("tok-123").await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get().await, None);

        let reopened = FileTokenStore::load(path).await.unwrap();
        assert_eq!(reopened.get().await, None);
    }

    #[tokio::test]
    async fn cold_start_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        assert!(!path.exists());
        let store = FileTokenStore::load(path.clone()).await.unwrap();
        assert_eq!(store.get().await, None);
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let err = FileTokenStore::load(path).await.err().unwrap();
        assert!(matches!(err, Error::Store(_)), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::load(path.clone()).await.unwrap();
        store.set("tok").await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "token file must be 0600, got {mode:o}");
    }
}

//! Whole-document JSON persistence with atomic replace.
//!
//! A document is serialized in memory, written to a sibling `*.tmp` file,
//! fsynced and renamed over the target. Readers therefore see either the old
//! document or the new one, never a mix.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::retry::WriteRetry;
use crate::domain::error::StorageError;

/// Result of reading a persisted document.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<T> {
    Loaded(T),
    NotFound,
    Corrupt { reason: String },
}

impl<T> LoadOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::NotFound | Self::Corrupt { .. } => None,
        }
    }

    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// A JSON document at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonDocument<T> {
    path: PathBuf,
    retry: WriteRetry,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>, retry: WriteRetry) -> Self {
        Self {
            path: path.into(),
            retry,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling temp file used for staged writes
    pub fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read and parse the document. Leftover temp files are never consulted.
    pub async fn load(&self) -> Result<LoadOutcome<T>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LoadOutcome::NotFound),
            Err(e) => return Err(StorageError::io(&self.path, 1, e)),
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(LoadOutcome::Loaded(value)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "persisted document is corrupt");
                Ok(LoadOutcome::Corrupt {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Atomically replace the document with `value`.
    pub async fn save(&self, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Encode {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.tmp_path();
        let target = self.path.as_path();
        self.retry
            .execute(target, || write_replace(&tmp, target, &bytes))
            .await?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "document saved");
        Ok(())
    }

    /// Delete the document. Deleting a missing document succeeds.
    pub async fn remove(&self) -> Result<bool, StorageError> {
        let removed = match tokio::fs::remove_file(&self.path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(StorageError::io(&self.path, 1, e)),
        };
        if let Err(e) = tokio::fs::remove_file(self.tmp_path()).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.tmp_path().display(), error = %e, "failed to remove temp file");
            }
        }
        Ok(removed)
    }

    /// Move the document aside to `<file>.<suffix>` and return the new path.
    pub async fn quarantine(&self, suffix: &str) -> Result<Option<PathBuf>, StorageError> {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(suffix);
        let dest = self.path.with_file_name(name);

        match tokio::fs::rename(&self.path, &dest).await {
            Ok(()) => {
                sync_parent(&dest).await.map_err(|e| StorageError::io(&dest, 1, e))?;
                Ok(Some(dest))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&self.path, 1, e)),
        }
    }
}

async fn write_replace(tmp: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(tmp, target).await?;
    sync_parent(target).await
}

/// Make a rename durable by syncing the containing directory.
#[cfg(unix)]
async fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            tokio::fs::File::open(parent).await?.sync_all().await
        }
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    fn doc(dir: &TempDir) -> JsonDocument<Doc> {
        JsonDocument::new(dir.path().join("state.json"), WriteRetry::from_millis(1))
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let dir = TempDir::new().unwrap();
        assert_eq!(doc(&dir).load().await.unwrap(), LoadOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = doc(&dir);
        let value = Doc {
            name: "a".to_string(),
            count: 3,
        };
        store.save(&value).await.unwrap();
        assert_eq!(store.load().await.unwrap(), LoadOutcome::Loaded(value));
        assert!(!store.tmp_path().exists());
    }

    #[tokio::test]
    async fn test_garbage_is_corrupt_not_error() {
        let dir = TempDir::new().unwrap();
        let store = doc(&dir);
        tokio::fs::write(store.path(), b"{\"name\": \"a\", \"cou").await.unwrap();
        assert!(store.load().await.unwrap().is_corrupt());
    }

    #[tokio::test]
    async fn test_stale_tmp_is_ignored_and_replaced() {
        let dir = TempDir::new().unwrap();
        let store = doc(&dir);
        let first = Doc {
            name: "first".to_string(),
            count: 1,
        };
        store.save(&first).await.unwrap();
        tokio::fs::write(store.tmp_path(), b"{ half written").await.unwrap();

        assert_eq!(store.load().await.unwrap(), LoadOutcome::Loaded(first));

        let second = Doc {
            name: "second".to_string(),
            count: 2,
        };
        store.save(&second).await.unwrap();
        assert!(!store.tmp_path().exists());
        assert_eq!(store.load().await.unwrap(), LoadOutcome::Loaded(second));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = doc(&dir);
        assert!(!store.remove().await.unwrap());
        store
            .save(&Doc {
                name: "x".to_string(),
                count: 0,
            })
            .await
            .unwrap();
        assert!(store.remove().await.unwrap());
        assert_eq!(store.load().await.unwrap(), LoadOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_quarantine_moves_file_aside() {
        let dir = TempDir::new().unwrap();
        let store = doc(&dir);
        tokio::fs::write(store.path(), b"not json").await.unwrap();

        let moved = store.quarantine("corrupt-1").await.unwrap().unwrap();
        assert!(moved.ends_with("state.json.corrupt-1"));
        assert!(moved.exists());
        assert_eq!(store.load().await.unwrap(), LoadOutcome::NotFound);
        assert_eq!(store.quarantine("again").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_into_unwritable_location_fails_after_retry() {
        let dir = TempDir::new().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, b"").await.unwrap();
        let store: JsonDocument<Doc> =
            JsonDocument::new(blocker.join("state.json"), WriteRetry::from_millis(1));

        let err = store
            .save(&Doc {
                name: "x".to_string(),
                count: 0,
            })
            .await
            .unwrap_err();
        match err {
            StorageError::Io { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}

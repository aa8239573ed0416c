//! Crash-recoverable pipeline checkpoint.
//!
//! The checkpoint is a single JSON document replaced atomically on every
//! save. Loading distinguishes a missing checkpoint from a corrupt one so the
//! caller decides whether to restart.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::domain::error::StorageError;
use crate::domain::models::checkpoint::CheckpointState;
use crate::infrastructure::persistence::{JsonDocument, LoadOutcome, WriteRetry};

/// What [`CheckpointStore::reset`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    /// A readable checkpoint was removed
    Cleared,
    /// A corrupt checkpoint was moved aside to the given path
    Quarantined(PathBuf),
    /// There was no checkpoint
    NothingToReset,
}

/// Atomic, idempotent checkpoint persistence.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    document: JsonDocument<CheckpointState>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, retry: WriteRetry) -> Self {
        Self {
            document: JsonDocument::new(path, retry),
        }
    }

    pub fn path(&self) -> &Path {
        self.document.path()
    }

    /// Persist `state`, replacing any previous checkpoint.
    ///
    /// A failed write is retried once; a second failure is returned and the
    /// previous checkpoint is left intact.
    #[instrument(skip(self, state), fields(run_id = %state.run_id))]
    pub async fn save(&self, state: &CheckpointState) -> Result<(), StorageError> {
        self.document.save(state).await?;
        info!(
            last_completed_phase = ?state.last_completed_phase,
            "checkpoint saved"
        );
        Ok(())
    }

    /// Load the checkpoint. Corruption is reported as a value, not an error.
    pub async fn load(&self) -> Result<LoadOutcome<CheckpointState>, StorageError> {
        self.document.load().await
    }

    /// Load the checkpoint or start fresh for `run_id` when none exists.
    /// Corrupt state is an error here; use [`Self::reset`] to recover.
    pub async fn load_or_new(&self, run_id: &str) -> Result<CheckpointState, StorageError> {
        match self.load().await? {
            LoadOutcome::Loaded(state) => Ok(state),
            LoadOutcome::NotFound => Ok(CheckpointState::new(run_id)),
            LoadOutcome::Corrupt { reason } => Err(StorageError::Corrupt {
                path: self.path().to_path_buf(),
                reason,
            }),
        }
    }

    /// Remove the checkpoint. Clearing an absent checkpoint succeeds.
    pub async fn clear(&self) -> Result<(), StorageError> {
        if self.document.remove().await? {
            info!(path = %self.path().display(), "checkpoint cleared");
        }
        Ok(())
    }

    /// Start over: clear a readable checkpoint, or move a corrupt one aside
    /// to `<file>.corrupt-<timestamp>` so it can still be inspected.
    pub async fn reset(&self) -> Result<ResetOutcome, StorageError> {
        match self.load().await? {
            LoadOutcome::NotFound => Ok(ResetOutcome::NothingToReset),
            LoadOutcome::Loaded(_) => {
                self.clear().await?;
                Ok(ResetOutcome::Cleared)
            }
            LoadOutcome::Corrupt { reason } => {
                let suffix = format!("corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"));
                match self.document.quarantine(&suffix).await? {
                    Some(dest) => {
                        warn!(
                            reason = %reason,
                            moved_to = %dest.display(),
                            "corrupt checkpoint moved aside"
                        );
                        Ok(ResetOutcome::Quarantined(dest))
                    }
                    None => Ok(ResetOutcome::NothingToReset),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::checkpoint::Issue;
    use crate::domain::models::constraint::Severity;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> CheckpointStore {
        CheckpointStore::new(dir.path().join("checkpoint.json"), WriteRetry::from_millis(1))
    }

    fn sample_state() -> CheckpointState {
        let mut state = CheckpointState::new("run-42");
        state.last_completed_phase = Some(2);
        state.current_section = Some("introduction".to_string());
        state.record_artifact(2, "outline.md");
        state.record_summary(2, serde_json::json!({"sections": 6}));
        state.flag_issue(Issue::new("i-1", 3, Severity::Warning, "thin evidence"));
        state
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let state = sample_state();

        store.save(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), LoadOutcome::Loaded(state));
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let state = sample_state();

        store.save(&state).await.unwrap();
        let first = std::fs::read(store.path()).unwrap();
        store.save(&state).await.unwrap();
        let second = std::fs::read(store.path()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_and_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert_eq!(store.load().await.unwrap(), LoadOutcome::NotFound);

        std::fs::write(store.path(), "{\"last_completed_phase\": 3, \"time").unwrap();
        let outcome = store.load().await.unwrap();
        assert!(outcome.is_corrupt());
        assert!(store.load_or_new("r").await.unwrap_err().is_corrupt());
    }

    #[tokio::test]
    async fn test_interrupted_write_never_yields_partial_state() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let state = sample_state();
        store.save(&state).await.unwrap();

        // A crash between temp write and rename leaves only a stray temp file.
        let tmp = dir.path().join("checkpoint.json.tmp");
        std::fs::write(&tmp, "{\"run_id\": \"run-42\", \"last_compl").unwrap();

        assert_eq!(store.load().await.unwrap(), LoadOutcome::Loaded(state.clone()));

        let mut next = state;
        next.last_completed_phase = Some(3);
        store.save(&next).await.unwrap();
        assert!(!tmp.exists());
        assert_eq!(store.load().await.unwrap(), LoadOutcome::Loaded(next));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.clear().await.unwrap();
        store.save(&sample_state()).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), LoadOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_reset_quarantines_corrupt_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert_eq!(store.reset().await.unwrap(), ResetOutcome::NothingToReset);

        std::fs::write(store.path(), "not json at all").unwrap();
        let ResetOutcome::Quarantined(moved) = store.reset().await.unwrap() else {
            panic!("expected the corrupt file to be quarantined");
        };
        assert!(moved
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("checkpoint.json.corrupt-"));
        assert_eq!(std::fs::read_to_string(&moved).unwrap(), "not json at all");
        assert_eq!(store.load().await.unwrap(), LoadOutcome::NotFound);

        store.save(&sample_state()).await.unwrap();
        assert_eq!(store.reset().await.unwrap(), ResetOutcome::Cleared);
    }
}

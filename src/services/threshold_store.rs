//! Persisted enforcement thresholds. Only the adjustment engine writes here.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::domain::error::StorageError;
use crate::domain::models::threshold::{ThresholdParameter, ThresholdSet};
use crate::infrastructure::persistence::{JsonDocument, LoadOutcome, WriteRetry};

struct StoreState {
    document: JsonDocument<ThresholdSet>,
    set: ThresholdSet,
}

/// Cloneable handle to the threshold set.
#[derive(Clone)]
pub struct ThresholdStore {
    inner: Arc<RwLock<StoreState>>,
}

impl ThresholdStore {
    /// Open the set at `path`. Parameters in `defaults` that are missing on
    /// disk are added; values already on disk are kept.
    pub async fn open(
        path: impl Into<PathBuf>,
        retry: WriteRetry,
        defaults: ThresholdSet,
    ) -> Result<Self, StorageError> {
        let document: JsonDocument<ThresholdSet> = JsonDocument::new(path, retry);
        let mut set = match document.load().await? {
            LoadOutcome::Loaded(set) => set,
            LoadOutcome::NotFound => ThresholdSet::new(),
            LoadOutcome::Corrupt { reason } => {
                return Err(StorageError::Corrupt {
                    path: document.path().to_path_buf(),
                    reason,
                })
            }
        };

        let mut added = 0;
        for (id, parameter) in defaults.parameters {
            if set.get(&id).is_none() {
                set.insert(parameter);
                added += 1;
            }
        }
        if added > 0 {
            document.save(&set).await?;
            info!(added, total = set.len(), "default thresholds seeded");
        }

        Ok(Self {
            inner: Arc::new(RwLock::new(StoreState { document, set })),
        })
    }

    pub async fn get(&self, id: &str) -> Option<ThresholdParameter> {
        self.inner.read().await.set.get(id).cloned()
    }

    /// Parameter controlling `hook_id`.
    pub async fn for_hook(&self, hook_id: &str) -> Option<ThresholdParameter> {
        self.inner.read().await.set.for_hook(hook_id).cloned()
    }

    /// Persist a new value. Returns the previous value, or `None` (and writes
    /// nothing) for an unknown parameter.
    #[instrument(skip(self))]
    pub async fn set(&self, id: &str, value: f64) -> Result<Option<f64>, StorageError> {
        let mut state = self.inner.write().await;
        let mut next = state.set.clone();
        let Some(old) = next.set(id, value) else {
            return Ok(None);
        };
        state.document.save(&next).await?;
        state.set = next;
        info!(old, new = value, "threshold updated");
        Ok(Some(old))
    }

    /// Persist a value derived from the first `evidence_mark` events of the
    /// parameter's hook. Returns the previous value, as [`Self::set`] does.
    #[instrument(skip(self))]
    pub async fn adjust(&self, id: &str, value: f64, evidence_mark: u64) -> Result<Option<f64>, StorageError> {
        let mut state = self.inner.write().await;
        let mut next = state.set.clone();
        let Some(old) = next.adjust(id, value, evidence_mark) else {
            return Ok(None);
        };
        state.document.save(&next).await?;
        state.set = next;
        info!(old, new = value, evidence_mark, "threshold adjusted");
        Ok(Some(old))
    }

    /// Snapshot of every parameter.
    pub async fn all(&self) -> ThresholdSet {
        self.inner.read().await.set.clone()
    }
}

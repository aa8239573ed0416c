//! Append-only record of everything the adjustment engine did in one run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::domain::error::StorageError;
use crate::domain::models::evolution::{EvolutionLogEntry, EvolutionRecord, Proposal};
use crate::infrastructure::persistence::{read_all, JsonlWriter, WriteRetry};

struct LogState {
    writer: JsonlWriter,
    records: Vec<EvolutionRecord>,
}

/// Cloneable handle to one run's evolution log.
#[derive(Clone)]
pub struct EvolutionLog {
    run_id: String,
    inner: Arc<Mutex<LogState>>,
}

impl EvolutionLog {
    pub async fn open(
        path: impl Into<PathBuf>,
        run_id: impl Into<String>,
        retry: WriteRetry,
    ) -> Result<Self, StorageError> {
        let (writer, records) = JsonlWriter::open::<EvolutionRecord>(path, retry).await?;
        let run_id = run_id.into();
        debug!(run_id = %run_id, records = records.len(), "evolution log opened");
        Ok(Self {
            run_id,
            inner: Arc::new(Mutex::new(LogState { writer, records })),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Append one entry stamped with this log's run id.
    pub async fn append(&self, entry: EvolutionLogEntry) -> Result<EvolutionRecord, StorageError> {
        let record = EvolutionRecord::new(self.run_id.clone(), entry);
        let mut state = self.inner.lock().await;
        state.writer.append(&record).await?;
        state.records.push(record.clone());
        debug!(kind = record.entry.kind(), "evolution entry appended");
        Ok(record)
    }

    pub async fn records(&self) -> Vec<EvolutionRecord> {
        self.inner.lock().await.records.clone()
    }

    /// Every proposal raised in this run, with its resolved status applied.
    pub async fn proposals(&self) -> Vec<Proposal> {
        fold_proposals(&self.inner.lock().await.records)
    }

    pub async fn find_proposal(&self, id: Uuid) -> Option<Proposal> {
        self.proposals().await.into_iter().find(|p| p.id == id)
    }

    pub async fn pending_proposals(&self) -> Vec<Proposal> {
        self.proposals()
            .await
            .into_iter()
            .filter(Proposal::is_pending)
            .collect()
    }
}

/// Read a run's evolution log without opening it for writing.
pub async fn read_run(path: &Path) -> Result<Vec<EvolutionRecord>, StorageError> {
    read_all(path).await
}

/// Replay `ProposalRaised`/`ProposalResolved` entries into current proposal state.
pub fn fold_proposals(records: &[EvolutionRecord]) -> Vec<Proposal> {
    let mut proposals: Vec<Proposal> = Vec::new();
    for record in records {
        match &record.entry {
            EvolutionLogEntry::ProposalRaised { proposal } => proposals.push(proposal.clone()),
            EvolutionLogEntry::ProposalResolved {
                proposal_id,
                status,
                ..
            } => {
                if let Some(p) = proposals.iter_mut().find(|p| p.id == *proposal_id) {
                    p.status = *status;
                }
            }
            _ => {}
        }
    }
    proposals
}

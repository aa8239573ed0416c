//! Append-only ledger of hook check outcomes.
//!
//! Every recorded event is one JSON line in the ledger file. Statistics are
//! always recomputed from the events, never stored.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::domain::error::LedgerError;
use crate::domain::models::hook::{HookEvent, HookEventKey, HookStats};
use crate::infrastructure::persistence::{JsonlWriter, WriteRetry};

/// Result of recording an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Appended to the ledger
    Recorded,
    /// Identical to an event already in the ledger; nothing written
    Duplicate,
}

struct LedgerState {
    writer: JsonlWriter,
    events: Vec<HookEvent>,
    seen: HashSet<HookEventKey>,
}

/// Cloneable handle to a hook event ledger. Clones share one writer.
#[derive(Clone)]
pub struct HookEventLedger {
    inner: Arc<Mutex<LedgerState>>,
}

impl HookEventLedger {
    /// Open the ledger at `path`, replaying any events already recorded.
    pub async fn open(path: impl Into<PathBuf>, retry: WriteRetry) -> Result<Self, LedgerError> {
        let (writer, replayed) = JsonlWriter::open::<HookEvent>(path, retry).await?;

        let mut seen = HashSet::with_capacity(replayed.len());
        let mut events = Vec::with_capacity(replayed.len());
        for event in replayed {
            if seen.insert(event.dedup_key()) {
                events.push(event);
            }
        }
        debug!(path = %writer.path().display(), events = events.len(), "hook ledger opened");

        Ok(Self {
            inner: Arc::new(Mutex::new(LedgerState {
                writer,
                events,
                seen,
            })),
        })
    }

    /// Record one event. Re-recording an identical event is a no-op.
    #[instrument(skip(self, event), fields(hook_id = %event.hook_id, event_type = %event.event_type))]
    pub async fn record(&self, event: HookEvent) -> Result<RecordOutcome, LedgerError> {
        if event.hook_id.trim().is_empty() {
            return Err(LedgerError::EmptyHookId);
        }

        let mut state = self.inner.lock().await;
        let key = event.dedup_key();
        if state.seen.contains(&key) {
            warn!("duplicate hook event ignored");
            return Ok(RecordOutcome::Duplicate);
        }

        state.writer.append(&event).await?;
        state.seen.insert(key);
        state.events.push(event);
        Ok(RecordOutcome::Recorded)
    }

    /// Statistics for one hook. Unknown hooks have zero counts.
    pub async fn stats(&self, hook_id: &str) -> HookStats {
        let state = self.inner.lock().await;
        HookStats::from_events(hook_id, &state.events)
    }

    /// Statistics for one hook over its events after the first `skip`.
    pub async fn stats_after(&self, hook_id: &str, skip: u64) -> HookStats {
        let state = self.inner.lock().await;
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let later: Vec<&HookEvent> = state
            .events
            .iter()
            .filter(|e| e.hook_id == hook_id)
            .skip(skip)
            .collect();
        HookStats::from_events(hook_id, later)
    }

    /// Number of events recorded for one hook.
    pub async fn event_count(&self, hook_id: &str) -> u64 {
        let state = self.inner.lock().await;
        state.events.iter().filter(|e| e.hook_id == hook_id).count() as u64
    }

    /// Statistics for every hook with at least one event, ordered by hook id.
    pub async fn all_stats(&self) -> Vec<HookStats> {
        let state = self.inner.lock().await;
        let ids: BTreeSet<&str> = state.events.iter().map(|e| e.hook_id.as_str()).collect();
        ids.into_iter()
            .map(|id| HookStats::from_events(id, &state.events))
            .collect()
    }

    /// Raw events for one hook, in recording order.
    pub async fn events(&self, hook_id: &str) -> Vec<HookEvent> {
        let state = self.inner.lock().await;
        state
            .events
            .iter()
            .filter(|e| e.hook_id == hook_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

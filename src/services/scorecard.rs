//! Per-round quality scorecard backed by an append-only score log.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::error::ScorecardError;
use crate::domain::models::scorecard::{
    RoundMean, RoundScores, ScoreHistory, ScoreRecord, Weights,
};
use crate::infrastructure::persistence::{JsonlWriter, WriteRetry};

struct ScorecardState {
    writer: JsonlWriter,
    history: ScoreHistory,
}

/// Cloneable handle to one run's scorecard.
#[derive(Clone)]
pub struct QualityScorecard {
    inner: Arc<RwLock<ScorecardState>>,
}

impl QualityScorecard {
    /// Open the score log at `path`, replaying earlier rounds.
    pub async fn open(path: impl Into<PathBuf>, retry: WriteRetry) -> Result<Self, ScorecardError> {
        let (writer, records) = JsonlWriter::open::<ScoreRecord>(path, retry).await?;
        let history = ScoreHistory::from_records(records);
        debug!(rounds = history.rounds().len(), "scorecard opened");
        Ok(Self {
            inner: Arc::new(RwLock::new(ScorecardState { writer, history })),
        })
    }

    /// Record a score. Re-scoring a dimension in the same round replaces the
    /// earlier score; nothing is ever deleted from the log.
    #[instrument(skip(self))]
    pub async fn record(&self, round: u32, dimension: &str, score: f64) -> Result<ScoreRecord, ScorecardError> {
        let record = ScoreRecord::new(round, dimension, score)?;
        let mut state = self.inner.write().await;
        state.writer.append(&record).await?;
        state.history.insert(record.clone());
        Ok(record)
    }

    /// Weighted aggregate of `round`.
    pub async fn aggregate(&self, round: u32, weights: &Weights) -> Result<f64, ScorecardError> {
        self.inner.read().await.history.aggregate(round, weights)
    }

    /// Dimensions below `threshold` in `round`, weakest first.
    pub async fn weak_dimensions(&self, round: u32, threshold: f64) -> Vec<ScoreRecord> {
        self.inner.read().await.history.weak_dimensions(round, threshold)
    }

    pub async fn round(&self, round: u32) -> Option<RoundScores> {
        self.inner.read().await.history.round(round).cloned()
    }

    pub async fn rounds(&self) -> Vec<u32> {
        self.inner.read().await.history.rounds()
    }

    pub async fn trend(&self) -> Vec<RoundMean> {
        self.inner.read().await.history.trend()
    }

    /// Snapshot of the full history.
    pub async fn history(&self) -> ScoreHistory {
        self.inner.read().await.history.clone()
    }
}

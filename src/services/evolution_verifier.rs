//! Read-only aggregation of evolution logs and score trends across runs.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::error::{StorageError, VerifierError};
use crate::domain::models::constraint::Severity;
use crate::domain::models::evolution::{EvolutionLogEntry, EvolutionRecord, ProposalStatus};
use crate::domain::models::scorecard::{ScoreHistory, ScoreRecord};
use crate::infrastructure::layout::run_files;
use crate::infrastructure::persistence::read_all;
use crate::services::evolution_log::fold_proposals;

/// First-to-last round movement of one run's mean score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreTrend {
    pub rounds: usize,
    pub first_mean: Option<f64>,
    pub last_mean: Option<f64>,
    /// `None` with fewer than two rounds
    pub improved: Option<bool>,
}

impl ScoreTrend {
    fn from_history(history: &ScoreHistory) -> Self {
        let trend = history.trend();
        let first_mean = trend.first().map(|r| r.mean);
        let last_mean = trend.last().map(|r| r.mean);
        let improved = match (trend.len(), first_mean, last_mean) {
            (n, Some(first), Some(last)) if n >= 2 => Some(last > first),
            _ => None,
        };
        Self {
            rounds: trend.len(),
            first_mean,
            last_mean,
            improved,
        }
    }

    /// Net drop from first to last round, zero when the score held or rose.
    pub fn decline(&self) -> f64 {
        match (self.first_mean, self.last_mean) {
            (Some(first), Some(last)) if self.rounds >= 2 => (first - last).max(0.0),
            _ => 0.0,
        }
    }
}

/// Counts for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub auto_applied: usize,
    pub confirmed_adjustments: usize,
    pub pending_proposals: usize,
    pub confirmed_proposals: usize,
    pub declined_proposals: usize,
    pub lessons: usize,
    /// Constraints learned in this run, by their severity at the end of the run
    pub learned_by_severity: BTreeMap<Severity, usize>,
    pub escalations: usize,
    pub rejected_changes: usize,
    pub trend: ScoreTrend,
}

impl RunReport {
    fn build(run_dir: &Path, records: &[EvolutionRecord], history: &ScoreHistory) -> Self {
        let run_id = records.first().map_or_else(
            || {
                run_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            },
            |r| r.run_id.clone(),
        );

        let mut auto_applied = 0;
        let mut confirmed_adjustments = 0;
        let mut lessons = 0;
        let mut escalations = 0;
        let mut rejected_changes = 0;
        let mut learned: HashMap<&str, Severity> = HashMap::new();

        for record in records {
            match &record.entry {
                EvolutionLogEntry::ThresholdAdjusted { adjustment } if adjustment.auto_applied => {
                    auto_applied += 1;
                }
                EvolutionLogEntry::ProposalResolved {
                    adjustment: Some(_),
                    ..
                } => confirmed_adjustments += 1,
                EvolutionLogEntry::LessonRecorded { .. } => lessons += 1,
                EvolutionLogEntry::ConstraintLearned { constraint } => {
                    learned.insert(&constraint.id, constraint.severity);
                }
                EvolutionLogEntry::ConstraintEscalated {
                    constraint_id, to, ..
                } => {
                    escalations += 1;
                    if let Some(severity) = learned.get_mut(constraint_id.as_str()) {
                        *severity = *to;
                    }
                }
                EvolutionLogEntry::ChangeRejected { .. } => rejected_changes += 1,
                _ => {}
            }
        }

        let mut learned_by_severity = BTreeMap::new();
        for severity in learned.into_values() {
            *learned_by_severity.entry(severity).or_insert(0) += 1;
        }

        let proposals = fold_proposals(records);
        let count = |status: ProposalStatus| proposals.iter().filter(|p| p.status == status).count();

        Self {
            run_id,
            run_dir: run_dir.to_path_buf(),
            auto_applied,
            confirmed_adjustments,
            pending_proposals: count(ProposalStatus::Pending),
            confirmed_proposals: count(ProposalStatus::Confirmed),
            declined_proposals: count(ProposalStatus::Declined),
            lessons,
            learned_by_severity,
            escalations,
            rejected_changes,
            trend: ScoreTrend::from_history(history),
        }
    }

    pub fn learned_total(&self) -> usize {
        self.learned_by_severity.values().sum()
    }
}

/// Totals across runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub runs: Vec<RunReport>,
    pub auto_applied: usize,
    pub pending_proposals: usize,
    pub declined_proposals: usize,
    pub lessons: usize,
    pub learned_by_severity: BTreeMap<Severity, usize>,
    pub rejected_changes: usize,
    /// Runs with at least two scored rounds
    pub runs_with_trend: usize,
    pub improved_runs: usize,
    /// The system changed itself and no run declined beyond tolerance
    pub adapting: bool,
}

impl VerificationReport {
    fn aggregate(runs: Vec<RunReport>, decline_tolerance: f64) -> Self {
        let mut learned_by_severity = BTreeMap::new();
        for run in &runs {
            for (severity, n) in &run.learned_by_severity {
                *learned_by_severity.entry(*severity).or_insert(0) += n;
            }
        }
        let auto_applied = runs.iter().map(|r| r.auto_applied).sum();
        let learned: usize = learned_by_severity.values().sum();
        let no_decline = runs
            .iter()
            .all(|r| r.trend.decline() <= decline_tolerance);

        Self {
            auto_applied,
            pending_proposals: runs.iter().map(|r| r.pending_proposals).sum(),
            declined_proposals: runs.iter().map(|r| r.declined_proposals).sum(),
            lessons: runs.iter().map(|r| r.lessons).sum(),
            rejected_changes: runs.iter().map(|r| r.rejected_changes).sum(),
            runs_with_trend: runs.iter().filter(|r| r.trend.improved.is_some()).count(),
            improved_runs: runs.iter().filter(|r| r.trend.improved == Some(true)).count(),
            adapting: (auto_applied + learned) > 0 && no_decline,
            learned_by_severity,
            runs,
        }
    }
}

/// Cross-run verifier. Never writes.
#[derive(Debug, Clone, Copy)]
pub struct EvolutionVerifier {
    decline_tolerance: f64,
}

impl EvolutionVerifier {
    pub const fn new(decline_tolerance: f64) -> Self {
        Self { decline_tolerance }
    }

    /// Aggregate the given run directories, read concurrently.
    #[instrument(skip(self, run_dirs), fields(runs = run_dirs.len()))]
    pub async fn verify(&self, run_dirs: &[PathBuf]) -> Result<VerificationReport, VerifierError> {
        let runs = try_join_all(run_dirs.iter().map(|dir| read_run_dir(dir))).await?;
        let report = VerificationReport::aggregate(runs, self.decline_tolerance);
        info!(
            runs = report.runs.len(),
            auto_applied = report.auto_applied,
            improved_runs = report.improved_runs,
            adapting = report.adapting,
            "verification complete"
        );
        Ok(report)
    }

    /// Every run directory under `runs_dir`, sorted by name.
    pub async fn discover(runs_dir: &Path) -> Result<Vec<PathBuf>, VerifierError> {
        let mut entries = match tokio::fs::read_dir(runs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(runs_dir, 1, e).into()),
        };
        let mut dirs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(runs_dir, 1, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| StorageError::io(entry.path(), 1, e))?
                .is_dir();
            if is_dir {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

async fn read_run_dir(dir: &Path) -> Result<RunReport, VerifierError> {
    if !tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
        return Err(VerifierError::RunNotFound(dir.to_path_buf()));
    }
    let (scores, evolution) = run_files(dir);
    let (score_records, records) = futures::try_join!(
        read_all::<ScoreRecord>(&scores),
        read_all::<EvolutionRecord>(&evolution)
    )?;
    let history = ScoreHistory::from_records(score_records);
    debug!(dir = %dir.display(), entries = records.len(), "run read");
    Ok(RunReport::build(dir, &records, &history))
}

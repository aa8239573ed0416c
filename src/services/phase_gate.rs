//! Phase transition gate.
//!
//! The gate only decides; it never writes the checkpoint. After a pass the
//! caller persists [`PhaseGate::next_state`].

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::error::GateError;
use crate::domain::models::checkpoint::CheckpointState;
use crate::domain::models::constraint::{ContentSummary, Severity};
use crate::domain::models::phase::{PhaseIndex, PhasePlan, PipelinePhase};
use crate::domain::models::scorecard::Weights;
use crate::domain::ports::ArtifactProbe;
use crate::services::constraint_store::ConstraintStore;
use crate::services::scorecard::QualityScorecard;

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reasons", rename_all = "snake_case")]
pub enum GateDecision {
    Pass,
    Fail(Vec<String>),
}

impl GateDecision {
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            Self::Pass => &[],
            Self::Fail(reasons) => reasons,
        }
    }

    fn from_reasons(reasons: Vec<String>) -> Self {
        if reasons.is_empty() {
            Self::Pass
        } else {
            Self::Fail(reasons)
        }
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::Fail(reasons) => write!(f, "FAIL({})", reasons.join("; ")),
        }
    }
}

/// Evidence for the quality checks of quality-sensitive phases.
#[derive(Clone, Default)]
pub struct GateContext {
    scorecard: Option<QualityScorecard>,
    round: Option<u32>,
    weights: Option<Weights>,
    summary: Option<ContentSummary>,
}

impl GateContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_scorecard(mut self, scorecard: QualityScorecard) -> Self {
        self.scorecard = Some(scorecard);
        self
    }

    /// Round to score; defaults to the latest recorded round.
    #[must_use]
    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    #[must_use]
    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = Some(weights);
        self
    }

    #[must_use]
    pub fn with_summary(mut self, summary: ContentSummary) -> Self {
        self.summary = Some(summary);
        self
    }
}

/// Decides whether the pipeline may move from phase N to N+1.
#[derive(Clone)]
pub struct PhaseGate {
    plan: PhasePlan,
    probe: Arc<dyn ArtifactProbe>,
    constraints: ConstraintStore,
    gate_threshold: f64,
    weights: Weights,
}

impl PhaseGate {
    pub fn new(
        plan: PhasePlan,
        probe: Arc<dyn ArtifactProbe>,
        constraints: ConstraintStore,
        gate_threshold: f64,
        weights: Weights,
    ) -> Self {
        Self {
            plan,
            probe,
            constraints,
            gate_threshold,
            weights,
        }
    }

    pub fn plan(&self) -> &PhasePlan {
        &self.plan
    }

    /// Evaluate leaving `from`. Every failing check contributes a reason.
    #[instrument(skip(self, state, ctx), fields(run_id = %state.run_id))]
    pub async fn can_advance(
        &self,
        from: PhaseIndex,
        state: &CheckpointState,
        ctx: &GateContext,
    ) -> Result<GateDecision, GateError> {
        let phase = self.plan.phase(from).ok_or(GateError::UnknownPhase(from))?;
        let mut reasons = Vec::new();

        if phase.terminal {
            reasons.push(format!("phase {from} ({}) is terminal", phase.name));
        }

        let expected = state.current_phase();
        if from < expected {
            reasons.push(format!(
                "phase {from} ({}) already completed; reset the checkpoint to re-enter it",
                phase.name
            ));
        } else if from > expected {
            reasons.push(format!(
                "cannot skip to phase {from} ({}): current phase is {expected}",
                phase.name
            ));
        }

        self.check_artifacts(phase, state, &mut reasons).await;

        if phase.quality_sensitive {
            self.check_quality(phase, state, ctx, &mut reasons).await;
        }

        let decision = GateDecision::from_reasons(reasons);
        debug!(phase = from, decision = %decision, "gate evaluated");
        Ok(decision)
    }

    /// The checkpoint the caller should persist after `from` passed.
    pub fn next_state(&self, from: PhaseIndex, state: &CheckpointState) -> CheckpointState {
        let mut next = state.clone();
        next.last_completed_phase = Some(from);
        next.timestamp = Utc::now();
        next
    }

    async fn check_artifacts(
        &self,
        phase: &PipelinePhase,
        state: &CheckpointState,
        reasons: &mut Vec<String>,
    ) {
        for artifact in &phase.required_artifacts {
            let present =
                state.has_artifact(phase.index, artifact) && self.probe.exists(artifact).await;
            if !present {
                reasons.push(format!("artifact {artifact} missing"));
            }
        }
    }

    async fn check_quality(
        &self,
        phase: &PipelinePhase,
        state: &CheckpointState,
        ctx: &GateContext,
        reasons: &mut Vec<String>,
    ) {
        let mut round_scores = None;
        match &ctx.scorecard {
            None => reasons.push("no scorecard available for quality check".to_string()),
            Some(scorecard) => {
                let round = match ctx.round {
                    Some(round) => Some(round),
                    None => scorecard.rounds().await.last().copied(),
                };
                match round {
                    None => reasons.push("no scores recorded".to_string()),
                    Some(round) => {
                        let weights = ctx.weights.as_ref().unwrap_or(&self.weights);
                        match scorecard.aggregate(round, weights).await {
                            Ok(total) if total < self.gate_threshold => reasons.push(format!(
                                "aggregate score {total:.2} for round {round} below {:.2}",
                                self.gate_threshold
                            )),
                            Ok(_) => {}
                            Err(e) => reasons.push(format!("aggregate unavailable: {e}")),
                        }
                        round_scores = scorecard.round(round).await;
                    }
                }
            }
        }

        match &ctx.summary {
            None => reasons.push("content summary required for constraint check".to_string()),
            Some(summary) => {
                // Learned floors read `score.<dim>` from the evaluated round.
                let summary = match &round_scores {
                    Some(scores) => summary.clone().with_scores(
                        scores
                            .values()
                            .map(|record| (record.dimension.as_str(), record.score)),
                    ),
                    None => summary.clone(),
                };
                for v in self.constraints.validate(&summary).await {
                    if v.severity == Severity::Critical {
                        reasons.push(format!("critical violation {}: {}", v.constraint_id, v.detail));
                    }
                }
            }
        }

        for issue in state.unresolved_critical(phase.index) {
            reasons.push(format!(
                "unresolved critical issue {}: {}",
                issue.id, issue.description
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::checkpoint::Issue;
    use crate::domain::models::constraint::{default_base_constraints, score_metric, Constraint, Predicate};
    use crate::domain::models::scorecard::default_weights;
    use crate::domain::ports::RecordedArtifactProbe;
    use crate::infrastructure::persistence::WriteRetry;
    use crate::infrastructure::FsArtifactProbe;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        gate: PhaseGate,
        constraints: ConstraintStore,
        scorecard: QualityScorecard,
    }

    async fn fixture(probe_files: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let retry = WriteRetry::from_millis(1);
        let constraints = ConstraintStore::open(
            dir.path().join("constraints.json"),
            retry,
            default_base_constraints(),
        )
        .await
        .unwrap();
        let scorecard = QualityScorecard::open(dir.path().join("scores.jsonl"), retry)
            .await
            .unwrap();
        let probe: Arc<dyn ArtifactProbe> = if probe_files {
            Arc::new(FsArtifactProbe::new(dir.path().join("work")))
        } else {
            Arc::new(RecordedArtifactProbe)
        };
        let gate = PhaseGate::new(
            PhasePlan::document_pipeline(),
            probe,
            constraints.clone(),
            7.0,
            default_weights(),
        );
        Fixture {
            dir,
            gate,
            constraints,
            scorecard,
        }
    }

    fn completed_through(phase: PhaseIndex) -> CheckpointState {
        let mut state = CheckpointState::new("run-1");
        state.last_completed_phase = Some(phase);
        state
    }

    fn clean_summary() -> ContentSummary {
        ContentSummary::new()
            .with_metric("citations.unverified", 0.0)
            .with_metric("evidence.unsupported_claims", 0.0)
            .with_metric("clarity.avg_sentence_words", 17.0)
            .with_metric("structure.section_imbalance", 0.1)
    }

    async fn score_round(card: &QualityScorecard, round: u32, value: f64) {
        for dim in default_weights().keys() {
            card.record(round, dim, value).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_first_phase_passes_with_artifact() {
        let f = fixture(false).await;
        let mut state = CheckpointState::new("run-1");
        let ctx = GateContext::new();

        let decision = f.gate.can_advance(0, &state, &ctx).await.unwrap();
        assert_eq!(decision, GateDecision::Fail(vec!["artifact brief.md missing".to_string()]));

        state.record_artifact(0, "brief.md");
        assert!(f.gate.can_advance(0, &state, &ctx).await.unwrap().is_pass());

        let next = f.gate.next_state(0, &state);
        assert_eq!(next.last_completed_phase, Some(0));
        assert_eq!(state.last_completed_phase, None, "gate never mutates the input");
    }

    #[tokio::test]
    async fn test_revision_gate_missing_artifact_then_pass() {
        let f = fixture(true).await;
        score_round(&f.scorecard, 1, 8.0).await;
        let ctx = GateContext::new()
            .with_scorecard(f.scorecard.clone())
            .with_summary(clean_summary());
        let mut state = completed_through(4);

        let decision = f.gate.can_advance(5, &state, &ctx).await.unwrap();
        assert_eq!(
            decision,
            GateDecision::Fail(vec!["artifact review/response.md missing".to_string()])
        );

        // Recorded but not on disk is still missing.
        state.record_artifact(5, "review/response.md");
        assert!(!f.gate.can_advance(5, &state, &ctx).await.unwrap().is_pass());

        let work = f.dir.path().join("work/review");
        std::fs::create_dir_all(&work).unwrap();
        std::fs::write(work.join("response.md"), "Responses to reviewers").unwrap();
        assert_eq!(f.gate.can_advance(5, &state, &ctx).await.unwrap(), GateDecision::Pass);
    }

    #[tokio::test]
    async fn test_skipping_and_reentry_are_rejected() {
        let f = fixture(false).await;
        let mut state = completed_through(2);
        state.record_artifact(1, "research/sources.json");
        state.record_artifact(1, "research/notes.md");
        state.record_artifact(4, "review/report.md");
        let ctx = GateContext::new();

        let reentry = f.gate.can_advance(1, &state, &ctx).await.unwrap();
        assert!(reentry.reasons()[0].contains("already completed"));

        let skip = f.gate.can_advance(4, &state, &ctx).await.unwrap();
        assert_eq!(skip.reasons().len(), 1);
        assert!(skip.reasons()[0].contains("cannot skip"));
    }

    #[tokio::test]
    async fn test_terminal_phase_cannot_advance() {
        let f = fixture(false).await;
        let state = completed_through(6);
        let decision = f.gate.can_advance(7, &state, &GateContext::new()).await.unwrap();
        assert!(decision.reasons()[0].contains("terminal"));
    }

    #[tokio::test]
    async fn test_unknown_phase_is_an_error() {
        let f = fixture(false).await;
        assert!(matches!(
            f.gate.can_advance(42, &CheckpointState::new("r"), &GateContext::new()).await,
            Err(GateError::UnknownPhase(42))
        ));
    }

    #[tokio::test]
    async fn test_quality_failures_are_all_collected() {
        let f = fixture(false).await;
        score_round(&f.scorecard, 1, 5.0).await;
        let mut state = completed_through(4);
        state.flag_issue(Issue::new("ISS-1", 5, Severity::Critical, "results contradict table 2"));
        state.flag_issue(Issue::new("ISS-2", 5, Severity::Warning, "typo"));
        let ctx = GateContext::new()
            .with_scorecard(f.scorecard.clone())
            .with_summary(clean_summary().with_flag("fabricated_reference"));

        let decision = f.gate.can_advance(5, &state, &ctx).await.unwrap();
        let reasons = decision.reasons();
        assert_eq!(reasons.len(), 4, "{reasons:?}");
        assert!(reasons[0].starts_with("artifact"));
        assert!(reasons[1].starts_with("aggregate score 5.00"));
        assert!(reasons[2].contains("CIT-02"));
        assert!(reasons[3].contains("ISS-1"));

        state.resolve_issue("ISS-1");
        let after = f.gate.can_advance(5, &state, &ctx).await.unwrap();
        assert_eq!(after.reasons().len(), 3);
    }

    #[tokio::test]
    async fn test_learned_floor_reads_scores_of_evaluated_round() {
        let f = fixture(false).await;
        f.constraints
            .add_learned(Constraint::learned(
                "learned.clarity.floor",
                "clarity",
                Severity::Critical,
                "clarity must score at least 6.0",
                Predicate::MetricAtLeast {
                    metric: score_metric("clarity"),
                    min: 6.0,
                },
            ))
            .await
            .unwrap();
        let mut state = completed_through(4);
        state.record_artifact(5, "review/response.md");

        score_round(&f.scorecard, 1, 9.0).await;
        f.scorecard.record(1, "clarity", 4.0).await.unwrap();
        let ctx = GateContext::new()
            .with_scorecard(f.scorecard.clone())
            .with_summary(clean_summary())
            .with_round(1);
        let weak = f.gate.can_advance(5, &state, &ctx).await.unwrap();
        assert_eq!(weak.reasons().len(), 1, "{:?}", weak.reasons());
        assert!(weak.reasons()[0].contains("learned.clarity.floor"));

        // Clarity recovered in the next round.
        score_round(&f.scorecard, 2, 9.0).await;
        let ctx = GateContext::new()
            .with_scorecard(f.scorecard.clone())
            .with_summary(clean_summary());
        assert_eq!(f.gate.can_advance(5, &state, &ctx).await.unwrap(), GateDecision::Pass);
    }

    #[tokio::test]
    async fn test_quality_phase_without_evidence_fails_closed() {
        let f = fixture(false).await;
        let mut state = completed_through(4);
        state.record_artifact(5, "review/response.md");
        let decision = f.gate.can_advance(5, &state, &GateContext::new()).await.unwrap();
        assert_eq!(decision.reasons().len(), 2);
    }
}

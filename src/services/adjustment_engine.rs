//! Self-adjustment: reads hook statistics and round scores, loosens noisy
//! thresholds within the drift cap, raises proposals for everything else and
//! distills lessons and learned constraints from weak dimensions.
//!
//! Analysis runs in two passes. The first plans every change without side
//! effects and checks each target against [`PROTECTED_TARGETS`]; a hit aborts
//! the whole analysis before anything is written. The second pass applies
//! the plan and appends every item to the run's evolution log.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::error::{AdjustmentError, ConstraintError};
use crate::domain::models::config::{AdjustmentConfig, ScorecardConfig};
use crate::domain::models::constraint::{score_metric, Constraint, Predicate, Severity};
use crate::domain::models::evolution::{
    EvolutionLogEntry, LessonLearned, Proposal, ProposalKind, ProposalStatus, RunContext,
    ThresholdAdjustment,
};
use crate::domain::models::hook::HookStats;
use crate::domain::models::scorecard::ScoreRecord;
use crate::domain::models::threshold::DriftCheck;
use crate::services::constraint_store::{ChangeOutcome, ConstraintStore};
use crate::services::evolution_log::EvolutionLog;
use crate::services::hook_ledger::HookEventLedger;
use crate::services::scorecard::QualityScorecard;
use crate::services::threshold_store::ThresholdStore;

/// Targets the engine may never adjust or propose changes to. A target
/// matches an entry exactly or as a dotted child (`core.identity.name`).
pub const PROTECTED_TARGETS: &[&str] = &[
    "core.identity",
    "governance.non_regression",
    "governance.drift_cap",
];

pub fn is_protected(target: &str) -> bool {
    PROTECTED_TARGETS.iter().any(|p| {
        target
            .strip_prefix(p)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    })
}

/// A constraint whose severity was raised during analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Escalation {
    pub constraint_id: String,
    pub from: Severity,
    pub to: Severity,
}

/// A change the constraint store refused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub target: String,
    pub reason: String,
}

/// Everything one analysis produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub run_id: String,
    pub round: u32,
    /// Weighted aggregate of the round, when it could be computed
    pub aggregate: Option<f64>,
    pub adjustments: Vec<ThresholdAdjustment>,
    pub proposals: Vec<Proposal>,
    pub lessons: Vec<LessonLearned>,
    pub learned_constraints: Vec<Constraint>,
    pub escalations: Vec<Escalation>,
    pub rejections: Vec<Rejection>,
}

impl AnalysisReport {
    pub fn is_empty(&self) -> bool {
        self.adjustments.is_empty()
            && self.proposals.is_empty()
            && self.lessons.is_empty()
            && self.learned_constraints.is_empty()
            && self.escalations.is_empty()
            && self.rejections.is_empty()
    }
}

/// Result of resolving a proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmOutcome {
    pub proposal: Proposal,
    /// Threshold change applied on confirmation, if the proposal carried one
    pub adjustment: Option<ThresholdAdjustment>,
}

#[derive(Debug)]
enum PlannedChange {
    Apply {
        parameter_id: String,
        old_value: f64,
        new_value: f64,
        reason: String,
        evidence_mark: u64,
    },
    Propose(Proposal),
}

impl PlannedChange {
    fn targets(&self) -> Vec<&str> {
        match self {
            Self::Apply { parameter_id, .. } => vec![parameter_id.as_str()],
            Self::Propose(p) => {
                let mut targets = vec![p.hook_id.as_str()];
                targets.extend(p.parameter_id.as_deref());
                targets
            }
        }
    }
}

/// Bounded self-adjustment over a hook ledger, threshold set and constraint set.
#[derive(Clone)]
pub struct AdjustmentEngine {
    config: AdjustmentConfig,
    scoring: ScorecardConfig,
    hooks: HookEventLedger,
    thresholds: ThresholdStore,
    constraints: ConstraintStore,
}

impl AdjustmentEngine {
    pub fn new(
        config: AdjustmentConfig,
        scoring: ScorecardConfig,
        hooks: HookEventLedger,
        thresholds: ThresholdStore,
        constraints: ConstraintStore,
    ) -> Self {
        Self {
            config,
            scoring,
            hooks,
            thresholds,
            constraints,
        }
    }

    /// Analyze one round of a run and apply or propose the resulting changes.
    #[instrument(skip_all, fields(run_id = %ctx.run_id, round = ctx.round))]
    pub async fn analyze(
        &self,
        ctx: &RunContext,
        scorecard: &QualityScorecard,
        log: &EvolutionLog,
    ) -> Result<AnalysisReport, AdjustmentError> {
        let mut plan = Vec::new();
        for stats in self.hooks.all_stats().await {
            self.classify(&stats, &mut plan).await;
        }

        if let Some(target) = plan
            .iter()
            .flat_map(PlannedChange::targets)
            .find(|t| is_protected(t))
        {
            warn!(protected = target, "analysis touched a protected target; nothing applied");
            return Err(AdjustmentError::ProtectedTarget {
                target: target.to_string(),
            });
        }

        let weights = ctx
            .weights
            .clone()
            .unwrap_or_else(|| self.scoring.weights.clone());
        let aggregate = match scorecard.aggregate(ctx.round, &weights).await {
            Ok(total) => Some(total),
            Err(e) => {
                debug!(error = %e, "round aggregate unavailable");
                None
            }
        };

        let mut report = AnalysisReport {
            run_id: ctx.run_id.clone(),
            round: ctx.round,
            aggregate,
            ..AnalysisReport::default()
        };

        for change in plan {
            self.execute(change, log, &mut report).await?;
        }

        let weak = scorecard
            .weak_dimensions(ctx.round, self.scoring.weak_threshold)
            .await;
        let previous = match ctx.round.checked_sub(1) {
            Some(prev) => scorecard.round(prev).await.unwrap_or_default(),
            None => BTreeMap::new(),
        };

        for record in &weak {
            let lesson = self.lesson_for(record).await;
            log.append(EvolutionLogEntry::LessonRecorded {
                lesson: lesson.clone(),
            })
            .await?;
            report.lessons.push(lesson);

            let weak_before = previous
                .get(&record.dimension)
                .is_some_and(|r| r.score < self.scoring.weak_threshold);
            if weak_before {
                self.learn_floor(record, log, &mut report).await?;
            }
        }

        info!(
            adjustments = report.adjustments.len(),
            proposals = report.proposals.len(),
            lessons = report.lessons.len(),
            learned = report.learned_constraints.len(),
            rejections = report.rejections.len(),
            "analysis complete"
        );
        Ok(report)
    }

    /// Apply or decline a pending proposal after external confirmation.
    #[instrument(skip(self, log))]
    pub async fn confirm(
        &self,
        log: &EvolutionLog,
        proposal_id: Uuid,
        approve: bool,
    ) -> Result<ConfirmOutcome, AdjustmentError> {
        let mut proposal = log
            .find_proposal(proposal_id)
            .await
            .ok_or(AdjustmentError::ProposalNotFound(proposal_id))?;
        if !proposal.is_pending() {
            return Err(AdjustmentError::ProposalNotPending(proposal_id));
        }

        let status = if approve {
            ProposalStatus::Confirmed
        } else {
            ProposalStatus::Declined
        };

        let adjustment = if approve && proposal.kind == ProposalKind::Loosen {
            let (Some(parameter_id), Some(proposed)) =
                (proposal.parameter_id.clone(), proposal.proposed_value)
            else {
                return Err(AdjustmentError::ProposalNotNumeric(proposal_id));
            };
            if is_protected(&parameter_id) {
                return Err(AdjustmentError::ProtectedTarget {
                    target: parameter_id,
                });
            }
            let evidence_mark = self.hooks.event_count(&proposal.hook_id).await;
            let old = self
                .thresholds
                .adjust(&parameter_id, proposed, evidence_mark)
                .await?
                .ok_or_else(|| AdjustmentError::UnknownParameter(parameter_id.clone()))?;
            Some(ThresholdAdjustment::new(
                parameter_id,
                old,
                proposed,
                format!("confirmed: {}", proposal.reason),
                false,
            ))
        } else {
            None
        };

        log.append(EvolutionLogEntry::ProposalResolved {
            proposal_id,
            status,
            adjustment: adjustment.clone(),
        })
        .await?;
        proposal.status = status;
        info!(status = ?status, applied = adjustment.is_some(), "proposal resolved");

        Ok(ConfirmOutcome {
            proposal,
            adjustment,
        })
    }

    async fn classify(&self, stats: &HookStats, plan: &mut Vec<PlannedChange>) {
        if stats.executions < self.config.min_samples {
            debug!(
                hook_id = %stats.hook_id,
                executions = stats.executions,
                "not enough samples to classify"
            );
            return;
        }

        if stats.trigger_rate.above(self.config.high_trigger_rate) {
            self.plan_loosening(stats, plan).await;
        } else if stats.trigger_rate.below(self.config.low_trigger_rate)
            && stats.runs_observed >= self.config.removal_min_runs
        {
            plan.push(PlannedChange::Propose(Proposal::new(
                ProposalKind::CandidateForRemoval,
                &stats.hook_id,
                format!(
                    "trigger rate {} across {} runs",
                    stats.trigger_rate, stats.runs_observed
                ),
            )));
        }

        if stats.false_positive_rate.above(self.config.false_positive_rate) {
            plan.push(PlannedChange::Propose(Proposal::new(
                ProposalKind::LogicReview,
                &stats.hook_id,
                format!(
                    "false positive rate {} over {} triggers",
                    stats.false_positive_rate, stats.triggers
                ),
            )));
        }
    }

    /// Loosen the hook's threshold when the events since its last adjustment
    /// still show a high trigger rate.
    async fn plan_loosening(&self, stats: &HookStats, plan: &mut Vec<PlannedChange>) {
        let Some(parameter) = self.thresholds.for_hook(&stats.hook_id).await else {
            warn!(hook_id = %stats.hook_id, "noisy hook has no adjustable threshold");
            return;
        };

        let evidence_mark = self.hooks.event_count(&stats.hook_id).await;
        let fresh = if parameter.evidence_mark == 0 {
            stats.clone()
        } else {
            self.hooks
                .stats_after(&stats.hook_id, parameter.evidence_mark)
                .await
        };
        if fresh.executions < self.config.min_samples
            || !fresh.trigger_rate.above(self.config.high_trigger_rate)
        {
            debug!(
                hook_id = %stats.hook_id,
                executions = fresh.executions,
                "no new evidence since last adjustment"
            );
            return;
        }

        let rate = fresh.trigger_rate.value().unwrap_or(1.0);
        let new_value = parameter.loosened(self.loosen_fraction(rate));
        let reason = format!(
            "trigger rate {} above {:.0}% over {} executions",
            fresh.trigger_rate,
            self.config.high_trigger_rate * 100.0,
            fresh.executions
        );
        match DriftCheck::evaluate(parameter.value, new_value, self.config.drift_cap) {
            DriftCheck::WithinCap { .. } => plan.push(PlannedChange::Apply {
                parameter_id: parameter.id,
                old_value: parameter.value,
                new_value,
                reason,
                evidence_mark,
            }),
            DriftCheck::Exceeded { .. } => plan.push(PlannedChange::Propose(
                Proposal::new(
                    ProposalKind::Loosen,
                    &stats.hook_id,
                    format!("{reason}; change exceeds drift cap"),
                )
                .with_change(parameter.id, parameter.value, new_value),
            )),
        }
    }

    /// Loosening step scaled by how far `rate` exceeds the high-trigger band.
    fn loosen_fraction(&self, rate: f64) -> f64 {
        let high = self.config.high_trigger_rate;
        let max = self.config.max_loosen_step;
        let span = 1.0 - high;
        let excess = if span > 0.0 { (rate - high) / span } else { 1.0 };
        (max * excess).max(self.config.min_loosen_step).min(max)
    }

    async fn execute(
        &self,
        change: PlannedChange,
        log: &EvolutionLog,
        report: &mut AnalysisReport,
    ) -> Result<(), AdjustmentError> {
        match change {
            PlannedChange::Apply {
                parameter_id,
                old_value,
                new_value,
                reason,
                evidence_mark,
            } => {
                self.thresholds
                    .adjust(&parameter_id, new_value, evidence_mark)
                    .await?
                    .ok_or_else(|| AdjustmentError::UnknownParameter(parameter_id.clone()))?;
                let adjustment =
                    ThresholdAdjustment::new(parameter_id, old_value, new_value, reason, true);
                log.append(EvolutionLogEntry::ThresholdAdjusted {
                    adjustment: adjustment.clone(),
                })
                .await?;
                info!(
                    parameter_id = %adjustment.parameter_id,
                    old_value,
                    new_value,
                    "threshold auto-adjusted"
                );
                report.adjustments.push(adjustment);
            }
            PlannedChange::Propose(proposal) => {
                let already_pending = log
                    .pending_proposals()
                    .await
                    .iter()
                    .any(|p| p.kind == proposal.kind && p.hook_id == proposal.hook_id);
                if already_pending {
                    debug!(hook_id = %proposal.hook_id, kind = ?proposal.kind, "proposal already pending");
                    return Ok(());
                }
                log.append(EvolutionLogEntry::ProposalRaised {
                    proposal: proposal.clone(),
                })
                .await?;
                info!(hook_id = %proposal.hook_id, kind = ?proposal.kind, "proposal raised");
                report.proposals.push(proposal);
            }
        }
        Ok(())
    }

    async fn lesson_for(&self, record: &ScoreRecord) -> LessonLearned {
        let hooks = self
            .config
            .dimension_hooks
            .get(&record.dimension)
            .cloned()
            .unwrap_or_default();
        let constraints: Vec<String> = self
            .constraints
            .by_category(&record.dimension)
            .await
            .into_iter()
            .map(|c| c.id)
            .collect();

        let mut text = format!(
            "{} scored {:.1} in round {}, below {:.1}.",
            record.dimension, record.score, record.round, self.scoring.weak_threshold
        );
        if !hooks.is_empty() {
            text.push_str(&format!(" Check hooks: {}.", hooks.join(", ")));
        }
        if !constraints.is_empty() {
            text.push_str(&format!(" Related constraints: {}.", constraints.join(", ")));
        }

        let mut refs = vec![format!(
            "score:{}:{}={}",
            record.round, record.dimension, record.score
        )];
        refs.extend(hooks.iter().map(|h| format!("hook:{h}")));
        refs.extend(constraints.iter().map(|c| format!("constraint:{c}")));

        LessonLearned::new(&record.dimension, text, refs)
    }

    /// Add or escalate the learned floor for a dimension weak two rounds running.
    async fn learn_floor(
        &self,
        record: &ScoreRecord,
        log: &EvolutionLog,
        report: &mut AnalysisReport,
    ) -> Result<(), AdjustmentError> {
        let id = format!("learned.{}.floor", record.dimension);
        let severity = match self.constraints.get(&id).await {
            None => Severity::Warning,
            Some(_) if record.score < self.scoring.critical_floor => Severity::Critical,
            Some(_) => return Ok(()),
        };
        let constraint = Constraint::learned(
            &id,
            &record.dimension,
            severity,
            format!(
                "{} must score at least {:.1}",
                record.dimension, self.scoring.weak_threshold
            ),
            Predicate::MetricAtLeast {
                metric: score_metric(&record.dimension),
                min: self.scoring.weak_threshold,
            },
        );

        match self.constraints.add_learned(constraint.clone()).await {
            Ok(ChangeOutcome::Added) => {
                log.append(EvolutionLogEntry::ConstraintLearned {
                    constraint: constraint.clone(),
                })
                .await?;
                report.learned_constraints.push(constraint);
            }
            Ok(ChangeOutcome::Escalated { from, to }) => {
                log.append(EvolutionLogEntry::ConstraintEscalated {
                    constraint_id: id.clone(),
                    from,
                    to,
                })
                .await?;
                report.escalations.push(Escalation {
                    constraint_id: id,
                    from,
                    to,
                });
            }
            Ok(ChangeOutcome::Unchanged) => {}
            Err(ConstraintError::Regression { id, reason }) => {
                log.append(EvolutionLogEntry::ChangeRejected {
                    target: id.clone(),
                    reason: reason.clone(),
                })
                .await?;
                report.rejections.push(Rejection { target: id, reason });
            }
            Err(ConstraintError::Invalid(reason)) => {
                warn!(id = %id, reason = %reason, "learned constraint invalid");
                report.rejections.push(Rejection { target: id, reason });
            }
            Err(ConstraintError::Storage(e)) => return Err(e.into()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::constraint::default_base_constraints;
    use crate::domain::models::hook::{HookEvent, HookEventType};
    use crate::domain::models::scorecard::default_weights;
    use crate::domain::models::threshold::{default_thresholds, Bound, ThresholdParameter};
    use crate::infrastructure::persistence::WriteRetry;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        engine: AdjustmentEngine,
        hooks: HookEventLedger,
        thresholds: ThresholdStore,
        constraints: ConstraintStore,
        scorecard: QualityScorecard,
        log: EvolutionLog,
    }

    async fn harness_with(config: AdjustmentConfig, extra: Option<ThresholdParameter>) -> Harness {
        let dir = TempDir::new().unwrap();
        let retry = WriteRetry::from_millis(1);
        let hooks = HookEventLedger::open(dir.path().join("hooks.jsonl"), retry)
            .await
            .unwrap();
        let mut defaults = default_thresholds();
        if let Some(p) = extra {
            defaults.insert(p);
        }
        let thresholds = ThresholdStore::open(dir.path().join("thresholds.json"), retry, defaults)
            .await
            .unwrap();
        let constraints = ConstraintStore::open(
            dir.path().join("constraints.json"),
            retry,
            default_base_constraints(),
        )
        .await
        .unwrap();
        let scorecard = QualityScorecard::open(dir.path().join("run/scores.jsonl"), retry)
            .await
            .unwrap();
        let log = EvolutionLog::open(dir.path().join("run/evolution.jsonl"), "run-1", retry)
            .await
            .unwrap();
        let engine = AdjustmentEngine::new(
            config,
            ScorecardConfig::default(),
            hooks.clone(),
            thresholds.clone(),
            constraints.clone(),
        );
        Harness {
            _dir: dir,
            engine,
            hooks,
            thresholds,
            constraints,
            scorecard,
            log,
        }
    }

    async fn harness() -> Harness {
        harness_with(AdjustmentConfig::default(), None).await
    }

    async fn emit(h: &Harness, hook: &str, kind: HookEventType, n: usize, run: &str) {
        for i in 0..n {
            h.hooks
                .record(HookEvent::new(hook, kind, format!("{run}:{kind}:{i}")).in_run(run))
                .await
                .unwrap();
        }
    }

    async fn score_round(h: &Harness, round: u32, overrides: &[(&str, f64)]) {
        for dim in default_weights().keys() {
            let score = overrides
                .iter()
                .find(|(d, _)| d == dim)
                .map_or(8.0, |(_, s)| *s);
            h.scorecard.record(round, dim, score).await.unwrap();
        }
    }

    #[test]
    fn test_protected_matching() {
        assert!(is_protected("core.identity"));
        assert!(is_protected("governance.drift_cap.value"));
        assert!(!is_protected("governance.drift_capacity"));
        assert!(!is_protected("hook.sentence_length.max_words"));
    }

    #[tokio::test]
    async fn test_noisy_hook_is_loosened_within_cap() {
        let h = harness().await;
        emit(&h, "sentence-length", HookEventType::Trigger, 9, "run-1").await;
        emit(&h, "sentence-length", HookEventType::Fix, 9, "run-1").await;
        emit(&h, "sentence-length", HookEventType::Pass, 1, "run-1").await;

        let report = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap();

        assert_eq!(report.adjustments.len(), 1);
        let adj = &report.adjustments[0];
        assert!(adj.auto_applied);
        assert_eq!(adj.parameter_id, "hook.sentence_length.max_words");
        assert!(adj.new_value > adj.old_value);
        assert!(adj.drift().unwrap() <= 0.20);
        assert!((adj.new_value - 32.25).abs() < 1e-9);

        let stored = h.thresholds.get("hook.sentence_length.max_words").await.unwrap();
        assert!((stored.value - adj.new_value).abs() < f64::EPSILON);
        let records = h.log.records().await;
        let kinds: Vec<&str> = records.iter().map(|r| r.entry.kind()).collect();
        assert_eq!(kinds, vec!["threshold_adjusted"]);
    }

    #[tokio::test]
    async fn test_too_few_samples_are_ignored() {
        let h = harness().await;
        emit(&h, "sentence-length", HookEventType::Trigger, 4, "run-1").await;
        let report = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_change_over_cap_becomes_pending_proposal() {
        let config = AdjustmentConfig {
            max_loosen_step: 0.5,
            min_loosen_step: 0.3,
            ..AdjustmentConfig::default()
        };
        let h = harness_with(config, None).await;
        emit(&h, "hedging", HookEventType::Trigger, 10, "run-1").await;

        let report = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap();

        assert!(report.adjustments.is_empty());
        assert_eq!(report.proposals.len(), 1);
        let proposal = &report.proposals[0];
        assert_eq!(proposal.kind, ProposalKind::Loosen);
        assert!(proposal.is_pending());
        assert_eq!(proposal.proposed_value, Some(4.5));

        let untouched = h.thresholds.get("hook.hedging.max_per_page").await.unwrap();
        assert!((untouched.value - 3.0).abs() < f64::EPSILON);

        let again = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap();
        assert!(again.proposals.is_empty(), "pending proposal is not raised twice");
        assert_eq!(h.log.pending_proposals().await.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_analysis_loosens_only_on_new_evidence() {
        let h = harness().await;
        emit(&h, "sentence-length", HookEventType::Trigger, 9, "run-1").await;
        emit(&h, "sentence-length", HookEventType::Fix, 9, "run-1").await;
        emit(&h, "sentence-length", HookEventType::Pass, 1, "run-1").await;
        let ctx = RunContext::new("run-1", 1);

        let first = h.engine.analyze(&ctx, &h.scorecard, &h.log).await.unwrap();
        assert_eq!(first.adjustments.len(), 1);
        let second = h.engine.analyze(&ctx, &h.scorecard, &h.log).await.unwrap();
        assert!(second.adjustments.is_empty());
        let stored = h.thresholds.get("hook.sentence_length.max_words").await.unwrap();
        assert!((stored.value - 32.25).abs() < 1e-9);
        assert_eq!(stored.evidence_mark, 19);

        // A fresh batch that is still noisy justifies one more step.
        emit(&h, "sentence-length", HookEventType::Trigger, 10, "run-2").await;
        let third = h.engine.analyze(&ctx, &h.scorecard, &h.log).await.unwrap();
        assert_eq!(third.adjustments.len(), 1);
        assert!((third.adjustments[0].old_value - 32.25).abs() < 1e-9);
        assert!(third.adjustments[0].drift().unwrap() <= 0.20);
        let fourth = h.engine.analyze(&ctx, &h.scorecard, &h.log).await.unwrap();
        assert!(fourth.adjustments.is_empty());
    }

    #[tokio::test]
    async fn test_zero_baseline_is_never_auto_applied() {
        let zero = ThresholdParameter::new("hook.jargon.max_terms", 0.0, Bound::Upper).for_hook("jargon");
        let h = harness_with(AdjustmentConfig::default(), Some(zero)).await;
        emit(&h, "jargon", HookEventType::Trigger, 6, "run-1").await;

        let report = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap();
        assert!(report.adjustments.is_empty());
        assert_eq!(report.proposals[0].kind, ProposalKind::Loosen);
    }

    #[tokio::test]
    async fn test_protected_target_aborts_analysis() {
        let guarded = ThresholdParameter::new("governance.drift_cap.value", 0.2, Bound::Upper)
            .for_hook("drift-guard");
        let h = harness_with(AdjustmentConfig::default(), Some(guarded)).await;
        emit(&h, "sentence-length", HookEventType::Trigger, 9, "run-1").await;
        emit(&h, "sentence-length", HookEventType::Pass, 1, "run-1").await;
        emit(&h, "drift-guard", HookEventType::Trigger, 10, "run-1").await;

        let err = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AdjustmentError::ProtectedTarget { ref target } if target == "governance.drift_cap.value")
        );
        assert!(h.log.records().await.is_empty());
        let untouched = h.thresholds.get("hook.sentence_length.max_words").await.unwrap();
        assert!((untouched.value - 30.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_silent_hook_across_runs_is_removal_candidate() {
        let h = harness().await;
        for run in ["r0", "r1", "r2", "r3", "r4"] {
            emit(&h, "citation-density", HookEventType::Pass, 4, run).await;
        }

        let report = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap();
        assert_eq!(report.proposals.len(), 1);
        assert_eq!(report.proposals[0].kind, ProposalKind::CandidateForRemoval);
        assert!(report.adjustments.is_empty());
    }

    #[tokio::test]
    async fn test_silent_hook_in_few_runs_is_left_alone() {
        let h = harness().await;
        emit(&h, "citation-density", HookEventType::Pass, 20, "r0").await;
        let report = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap();
        assert!(report.proposals.is_empty());
    }

    #[tokio::test]
    async fn test_false_positives_raise_logic_review() {
        let h = harness().await;
        emit(&h, "passive-voice", HookEventType::Trigger, 5, "run-1").await;
        emit(&h, "passive-voice", HookEventType::Pass, 5, "run-1").await;
        emit(&h, "passive-voice", HookEventType::FalsePositive, 2, "run-1").await;

        let report = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap();
        assert_eq!(report.proposals.len(), 1);
        assert_eq!(report.proposals[0].kind, ProposalKind::LogicReview);
        assert!(report.proposals[0].parameter_id.is_none());
    }

    #[tokio::test]
    async fn test_weak_dimension_yields_lesson_with_refs() {
        let h = harness().await;
        score_round(&h, 1, &[("clarity", 5.0)]).await;

        let report = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap();

        assert_eq!(report.lessons.len(), 1);
        let lesson = &report.lessons[0];
        assert_eq!(lesson.category, "clarity");
        assert!(lesson.source_evidence_refs.contains(&"score:1:clarity=5".to_string()));
        assert!(lesson.source_evidence_refs.contains(&"hook:sentence-length".to_string()));
        assert!(lesson.source_evidence_refs.contains(&"constraint:CLR-01".to_string()));
        assert!(report.learned_constraints.is_empty(), "weak only once");
        assert!(report.aggregate.is_some());
    }

    #[tokio::test]
    async fn test_persistently_weak_dimension_learns_then_escalates() {
        let h = harness().await;
        score_round(&h, 1, &[("clarity", 5.0)]).await;
        score_round(&h, 2, &[("clarity", 5.5)]).await;

        let second = h
            .engine
            .analyze(&RunContext::new("run-1", 2), &h.scorecard, &h.log)
            .await
            .unwrap();
        assert_eq!(second.learned_constraints.len(), 1);
        let learned = &second.learned_constraints[0];
        assert_eq!(learned.id, "learned.clarity.floor");
        assert_eq!(learned.severity, Severity::Warning);

        score_round(&h, 3, &[("clarity", 3.0)]).await;
        let third = h
            .engine
            .analyze(&RunContext::new("run-1", 3), &h.scorecard, &h.log)
            .await
            .unwrap();
        assert!(third.learned_constraints.is_empty());
        assert_eq!(
            third.escalations,
            vec![Escalation {
                constraint_id: "learned.clarity.floor".to_string(),
                from: Severity::Warning,
                to: Severity::Critical,
            }]
        );
        let stored = h.constraints.get("learned.clarity.floor").await.unwrap();
        assert_eq!(stored.severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_rejected_constraint_is_logged_not_fatal() {
        let h = harness().await;
        h.constraints
            .add_learned(Constraint::learned(
                "learned.clarity.floor",
                "clarity",
                Severity::Critical,
                "hand-set floor",
                Predicate::MetricAtLeast {
                    metric: "score.clarity".to_string(),
                    min: 5.0,
                },
            ))
            .await
            .unwrap();
        score_round(&h, 1, &[("clarity", 3.0)]).await;
        score_round(&h, 2, &[("clarity", 3.5)]).await;

        let report = h
            .engine
            .analyze(&RunContext::new("run-1", 2), &h.scorecard, &h.log)
            .await
            .unwrap();
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].target, "learned.clarity.floor");
        assert!(h
            .log
            .records()
            .await
            .iter()
            .any(|r| r.entry.kind() == "change_rejected"));
    }

    #[tokio::test]
    async fn test_confirm_applies_pending_loosening() {
        let config = AdjustmentConfig {
            max_loosen_step: 0.5,
            min_loosen_step: 0.3,
            ..AdjustmentConfig::default()
        };
        let h = harness_with(config, None).await;
        emit(&h, "hedging", HookEventType::Trigger, 10, "run-1").await;
        let report = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap();
        let id = report.proposals[0].id;

        let outcome = h.engine.confirm(&h.log, id, true).await.unwrap();
        assert_eq!(outcome.proposal.status, ProposalStatus::Confirmed);
        let adj = outcome.adjustment.unwrap();
        assert!(!adj.auto_applied);
        assert!((adj.new_value - 4.5).abs() < 1e-9);
        let stored = h.thresholds.get("hook.hedging.max_per_page").await.unwrap();
        assert!((stored.value - 4.5).abs() < 1e-9);

        assert!(matches!(
            h.engine.confirm(&h.log, id, true).await,
            Err(AdjustmentError::ProposalNotPending(_))
        ));
        assert!(matches!(
            h.engine.confirm(&h.log, Uuid::new_v4(), true).await,
            Err(AdjustmentError::ProposalNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_decline_leaves_threshold_untouched() {
        let h = harness().await;
        emit(&h, "passive-voice", HookEventType::Trigger, 5, "run-1").await;
        emit(&h, "passive-voice", HookEventType::Pass, 5, "run-1").await;
        emit(&h, "passive-voice", HookEventType::FalsePositive, 3, "run-1").await;
        let report = h
            .engine
            .analyze(&RunContext::new("run-1", 1), &h.scorecard, &h.log)
            .await
            .unwrap();

        let outcome = h
            .engine
            .confirm(&h.log, report.proposals[0].id, false)
            .await
            .unwrap();
        assert_eq!(outcome.proposal.status, ProposalStatus::Declined);
        assert!(outcome.adjustment.is_none());
        assert!(h.log.pending_proposals().await.is_empty());
        let before = default_thresholds();
        assert_eq!(h.thresholds.all().await, before);
    }
}

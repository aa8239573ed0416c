//! Self-adjustment records: threshold changes, proposals, lessons and the
//! evolution log entries that carry them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::constraint::{Constraint, Severity};
use super::scorecard::Weights;

/// A change to one enforcement threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdAdjustment {
    pub id: Uuid,
    pub parameter_id: String,
    pub old_value: f64,
    pub new_value: f64,
    pub reason: String,
    /// True only when the change passed the drift cap and was written without confirmation
    pub auto_applied: bool,
    pub timestamp: DateTime<Utc>,
}

impl ThresholdAdjustment {
    pub fn new(
        parameter_id: impl Into<String>,
        old_value: f64,
        new_value: f64,
        reason: impl Into<String>,
        auto_applied: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parameter_id: parameter_id.into(),
            old_value,
            new_value,
            reason: reason.into(),
            auto_applied,
            timestamp: Utc::now(),
        }
    }

    /// Relative size of the change, `None` for a zero baseline.
    pub fn drift(&self) -> Option<f64> {
        (self.old_value != 0.0).then(|| (self.new_value - self.old_value).abs() / self.old_value.abs())
    }
}

/// What a proposal asks a human to confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    /// Loosening that exceeded the drift cap
    Loosen,
    /// Hook that almost never fires
    CandidateForRemoval,
    /// Hook whose findings are often wrong
    LogicReview,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    #[default]
    Pending,
    Confirmed,
    Declined,
}

/// A change that requires external confirmation before it takes effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub kind: ProposalKind,
    pub hook_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_value: Option<f64>,
    pub reason: String,
    #[serde(default)]
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    pub fn new(kind: ProposalKind, hook_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            hook_id: hook_id.into(),
            parameter_id: None,
            old_value: None,
            proposed_value: None,
            reason: reason.into(),
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_change(mut self, parameter_id: impl Into<String>, old_value: f64, proposed_value: f64) -> Self {
        self.parameter_id = Some(parameter_id.into());
        self.old_value = Some(old_value);
        self.proposed_value = Some(proposed_value);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }
}

/// A lesson distilled from a weak round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonLearned {
    pub id: Uuid,
    pub category: String,
    pub text: String,
    #[serde(default)]
    pub source_evidence_refs: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl LessonLearned {
    pub fn new(category: impl Into<String>, text: impl Into<String>, refs: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: category.into(),
            text: text.into(),
            source_evidence_refs: refs,
            timestamp: Utc::now(),
        }
    }
}

/// One entry in a run's evolution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvolutionLogEntry {
    ThresholdAdjusted {
        adjustment: ThresholdAdjustment,
    },
    ProposalRaised {
        proposal: Proposal,
    },
    ProposalResolved {
        proposal_id: Uuid,
        status: ProposalStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        adjustment: Option<ThresholdAdjustment>,
    },
    LessonRecorded {
        lesson: LessonLearned,
    },
    ConstraintLearned {
        constraint: Constraint,
    },
    ConstraintEscalated {
        constraint_id: String,
        from: Severity,
        to: Severity,
    },
    ChangeRejected {
        target: String,
        reason: String,
    },
}

impl EvolutionLogEntry {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ThresholdAdjusted { .. } => "threshold_adjusted",
            Self::ProposalRaised { .. } => "proposal_raised",
            Self::ProposalResolved { .. } => "proposal_resolved",
            Self::LessonRecorded { .. } => "lesson_recorded",
            Self::ConstraintLearned { .. } => "constraint_learned",
            Self::ConstraintEscalated { .. } => "constraint_escalated",
            Self::ChangeRejected { .. } => "change_rejected",
        }
    }
}

/// An evolution log line: the entry plus the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: EvolutionLogEntry,
}

impl EvolutionRecord {
    pub fn new(run_id: impl Into<String>, entry: EvolutionLogEntry) -> Self {
        Self {
            run_id: run_id.into(),
            recorded_at: Utc::now(),
            entry,
        }
    }
}

/// Explicit per-run context handed to the adjustment engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: String,
    /// Evaluation round to analyze
    pub round: u32,
    /// Weights for this round; falls back to configured weights when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Weights>,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, round: u32) -> Self {
        Self {
            run_id: run_id.into(),
            round,
            weights: None,
        }
    }

    #[must_use]
    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = Some(weights);
        self
    }
}

pub mod checkpoint;
pub mod config;
pub mod constraint;
pub mod evolution;
pub mod hook;
pub mod phase;
pub mod scorecard;
pub mod threshold;

pub use checkpoint::{CheckpointState, Issue, PhaseOutput};
pub use config::{
    AdjustmentConfig, Config, LoggingConfig, ScorecardConfig, StorageConfig, VerifierConfig,
};
pub use constraint::{
    default_base_constraints, Constraint, ConstraintChange, ContentSummary, Origin, Predicate,
    Severity, Violation,
};
pub use evolution::{
    EvolutionLogEntry, EvolutionRecord, LessonLearned, Proposal, ProposalKind, ProposalStatus,
    RunContext, ThresholdAdjustment,
};
pub use hook::{HookEvent, HookEventType, HookStats, Rate};
pub use phase::{default_document_phases, PhaseIndex, PhasePlan, PipelinePhase};
pub use scorecard::{default_weights, RoundMean, ScoreHistory, ScoreRecord, Weights};
pub use threshold::{default_thresholds, Bound, DriftCheck, ThresholdParameter, ThresholdSet};

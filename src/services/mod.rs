//! Governance services.
//!
//! Each service is a cloneable handle over its own persisted state:
//! - CheckpointStore: atomic pipeline checkpoint
//! - HookEventLedger: append-only hook outcomes and their statistics
//! - QualityScorecard: per-round dimension scores
//! - ConstraintStore: base and learned rules under non-regression
//! - ThresholdStore: adjustable enforcement thresholds
//! - EvolutionLog: per-run record of self-adjustment
//! - AdjustmentEngine: bounded threshold changes, proposals and lessons
//! - PhaseGate: N to N+1 transition decisions
//! - EvolutionVerifier: read-only cross-run aggregation

pub mod adjustment_engine;
pub mod checkpoint_store;
pub mod constraint_store;
pub mod evolution_log;
pub mod evolution_verifier;
pub mod governance;
pub mod hook_ledger;
pub mod phase_gate;
pub mod scorecard;
pub mod threshold_store;

pub use adjustment_engine::{
    is_protected, AdjustmentEngine, AnalysisReport, ConfirmOutcome, Escalation, Rejection,
    PROTECTED_TARGETS,
};
pub use checkpoint_store::{CheckpointStore, ResetOutcome};
pub use constraint_store::{ChangeOutcome, ConstraintStore};
pub use evolution_log::EvolutionLog;
pub use evolution_verifier::{EvolutionVerifier, RunReport, ScoreTrend, VerificationReport};
pub use governance::{Governance, RunHandle};
pub use hook_ledger::{HookEventLedger, RecordOutcome};
pub use phase_gate::{GateContext, GateDecision, PhaseGate};
pub use scorecard::QualityScorecard;
pub use threshold_store::ThresholdStore;

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Persistence failures shared by every file-backed store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path} after {attempts} attempt(s): {source}")]
    Io {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode record for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, attempts: u32, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            attempts,
            source,
        }
    }

    /// Whether this error reports unreadable persisted state rather than a failed write.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Errors raised while validating a phase plan.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlanError {
    #[error("phase plan is empty")]
    Empty,

    #[error("phase at position {position} has index {index}; indices must be contiguous from 0")]
    NonContiguous { position: usize, index: u32 },

    #[error("duplicate phase name: {0}")]
    DuplicateName(String),

    #[error("phase plan must end with exactly one terminal phase")]
    TerminalPlacement,
}

/// Hook event ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("hook id cannot be empty")]
    EmptyHookId,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Quality scorecard errors
#[derive(Error, Debug)]
pub enum ScorecardError {
    #[error("score {score} for dimension '{dimension}' is outside [0, 10]")]
    OutOfRange { dimension: String, score: f64 },

    #[error("dimension name cannot be empty")]
    EmptyDimension,

    #[error("incomplete weights: {0}")]
    IncompleteWeights(String),

    #[error("round {round} has no score for weighted dimension(s): {missing:?}")]
    RoundIncomplete { round: u32, missing: Vec<String> },

    #[error("round {0} has no recorded scores")]
    RoundNotFound(u32),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Constraint store errors
#[derive(Error, Debug)]
pub enum ConstraintError {
    #[error("regression rejected for constraint '{id}': {reason}")]
    Regression { id: String, reason: String },

    #[error("invalid constraint: {0}")]
    Invalid(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Adjustment engine errors
#[derive(Error, Debug)]
pub enum AdjustmentError {
    #[error("internal error: '{target}' is on the never-adjustable exclusion list")]
    ProtectedTarget { target: String },

    #[error("proposal not found: {0}")]
    ProposalNotFound(Uuid),

    #[error("proposal {0} is not pending")]
    ProposalNotPending(Uuid),

    #[error("proposal {0} carries no numeric change to apply")]
    ProposalNotNumeric(Uuid),

    #[error("threshold parameter not found: {0}")]
    UnknownParameter(String),

    #[error(transparent)]
    Scorecard(#[from] ScorecardError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Phase gate errors. A failed gate is a decision, not an error; these
/// report misuse or unreadable inputs.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("phase {0} is not part of the pipeline")]
    UnknownPhase(u32),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Evolution verifier errors
#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("run directory not found: {0}")]
    RunNotFound(PathBuf),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Top-level governance errors
#[derive(Error, Debug)]
pub enum GovernanceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Scorecard error: {0}")]
    Scorecard(#[from] ScorecardError),

    #[error("Constraint error: {0}")]
    Constraint(#[from] ConstraintError),

    #[error("Adjustment error: {0}")]
    Adjustment(#[from] AdjustmentError),

    #[error("Gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Verifier error: {0}")]
    Verifier(#[from] VerifierError),

    #[error("Checkpoint belongs to run '{found}', not '{expected}'")]
    RunMismatch { expected: String, found: String },
}

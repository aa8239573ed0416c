//! Domain layer for the Quire governance engine
//!
//! Record types, pure rules and the ports the services depend on.

pub mod error;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use error::{
    AdjustmentError, ConstraintError, GateError, GovernanceError, LedgerError, PlanError,
    ScorecardError, StorageError, VerifierError,
};

//! Quire - governance engine for multi-phase document pipelines
//!
//! Quire decides when a document pipeline may leave a phase, keeps a durable
//! checkpoint of where it is, gathers statistics on the hooks that review
//! its output, scores each revision round and tunes its own enforcement
//! thresholds within a bounded drift.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): record types, pure rules and ports
//! - **Service Layer** (`services`): stores, the adjustment engine, the phase gate and the verifier
//! - **Infrastructure Layer** (`infrastructure`): persistence, configuration, logging
//! - **CLI Layer** (`cli`): command-line host
//!
//! # Example
//!
//! ```ignore
//! use quire::{Config, Governance};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gov = Governance::open(&Config::default()).await?;
//!     let run = gov.run("run-1").await?;
//!     run.scorecard.record(1, "clarity", 7.5).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    CheckpointState, Config, Constraint, ContentSummary, HookEvent, HookEventType, PhasePlan,
    Proposal, RunContext, Severity,
};
pub use domain::GovernanceError;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AnalysisReport, GateContext, GateDecision, Governance, RunHandle, VerificationReport,
};

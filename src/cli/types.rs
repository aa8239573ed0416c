//! CLI type definitions
//!
//! Top-level clap structures. Each command's arguments live next to its
//! implementation in [`super::commands`].

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::{
    checkpoint::CheckpointArgs,
    constraint::ConstraintArgs,
    evolution::{AnalyzeArgs, ConfirmArgs, VerifyArgs},
    gate::GateArgs,
    hook::HookArgs,
    init::InitArgs,
    score::ScoreArgs,
};

#[derive(Parser, Debug)]
#[command(name = "quire")]
#[command(about = "Quire - governance engine for multi-phase document pipelines", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .quire/config.yaml plus .quire/local.yaml)
    #[arg(short, long, global = true, env = "QUIRE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the data directory, default config and seeded rule sets
    Init(InitArgs),

    /// Inspect or reset the pipeline checkpoint
    Checkpoint(CheckpointArgs),

    /// Record hook events and show hook statistics
    Hook(HookArgs),

    /// Record and aggregate quality scores
    Score(ScoreArgs),

    /// List and evaluate constraints
    Constraint(ConstraintArgs),

    /// Evaluate the phase gate
    Gate(GateArgs),

    /// Run the adjustment engine over one round
    Analyze(AnalyzeArgs),

    /// Confirm or decline a pending proposal
    Confirm(ConfirmArgs),

    /// Aggregate evolution logs across runs
    Verify(VerifyArgs),
}

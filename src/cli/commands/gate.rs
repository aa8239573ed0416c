//! Implementation of the `quire gate` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::constraint::read_summary;
use crate::cli::output::{output, pass_fail, CommandOutput};
use crate::cli::resolve_run_id;
use crate::domain::models::phase::PhaseIndex;
use crate::services::{GateContext, GateDecision, Governance};

#[derive(Args, Debug)]
pub struct GateArgs {
    #[command(subcommand)]
    pub command: GateCommands,
}

#[derive(Subcommand, Debug)]
pub enum GateCommands {
    /// Check whether the pipeline may leave a phase
    Check {
        phase: PhaseIndex,
        /// Content summary JSON for the constraint check
        #[arg(long)]
        summary: Option<PathBuf>,
        /// Round whose aggregate is checked (defaults to the latest)
        #[arg(long)]
        round: Option<u32>,
        /// Run to check (defaults to the checkpoint's run)
        #[arg(long)]
        run: Option<String>,
        /// Persist the advanced checkpoint on a pass
        #[arg(long)]
        advance: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct GateOutput {
    pub run_id: String,
    pub phase: PhaseIndex,
    pub phase_name: String,
    pub decision: GateDecision,
    pub advanced: bool,
}

impl CommandOutput for GateOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "{} phase {} ({}) of {}",
            pass_fail(self.decision.is_pass()),
            self.phase,
            self.phase_name,
            self.run_id
        )];
        lines.extend(self.decision.reasons().iter().map(|r| format!("  - {r}")));
        if self.advanced {
            lines.push("Checkpoint advanced.".to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: GateArgs, gov: &Governance, json_mode: bool) -> Result<()> {
    let GateCommands::Check {
        phase,
        summary,
        round,
        run,
        advance,
    } = args.command;

    let run_id = resolve_run_id(gov, run).await?;
    let run = gov.run(&run_id).await?;
    let mut ctx = GateContext::new().with_scorecard(run.scorecard);
    if let Some(path) = summary {
        ctx = ctx.with_summary(read_summary(&path).await?);
    }
    if let Some(round) = round {
        ctx = ctx.with_round(round);
    }

    let (decision, advanced) = if advance {
        let (decision, _) = gov.advance(&run_id, phase, &ctx).await?;
        let advanced = decision.is_pass();
        (decision, advanced)
    } else {
        let (decision, _) = gov.check(&run_id, phase, &ctx).await?;
        (decision, false)
    };

    let phase_name = gov
        .gate()
        .plan()
        .phase(phase)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    output(
        &GateOutput {
            run_id,
            phase,
            phase_name,
            decision,
            advanced,
        },
        json_mode,
    );
    Ok(())
}

//! Implementation of the `quire checkpoint` commands.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{list_table, output, severity_style, CommandOutput};
use crate::domain::models::checkpoint::{CheckpointState, Issue};
use crate::domain::models::constraint::Severity;
use crate::domain::models::phase::PhaseIndex;
use crate::infrastructure::persistence::LoadOutcome;
use crate::services::{Governance, ResetOutcome};

#[derive(Args, Debug)]
pub struct CheckpointArgs {
    #[command(subcommand)]
    pub command: CheckpointCommands,
}

#[derive(Subcommand, Debug)]
pub enum CheckpointCommands {
    /// Show the current checkpoint
    Show,
    /// Start a new run (fails if a checkpoint exists)
    Start {
        /// Run identifier
        run_id: String,
    },
    /// Record an artifact produced in a phase
    Artifact {
        phase: PhaseIndex,
        /// Path relative to the artifact root
        artifact: String,
    },
    /// Flag a reviewer issue against a phase
    Issue {
        phase: PhaseIndex,
        /// Issue identifier
        id: String,
        description: String,
        #[arg(long, default_value = "warning")]
        severity: Severity,
    },
    /// Mark a flagged issue resolved
    Resolve {
        /// Issue identifier
        id: String,
    },
    /// Delete the checkpoint
    Clear,
    /// Clear the checkpoint, moving a corrupt one aside
    Reset,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckpointOutput {
    Found { checkpoint: CheckpointState, phase_names: Vec<(PhaseIndex, String)> },
    NotFound,
    Corrupt { reason: String },
    Updated { checkpoint: CheckpointState, message: String },
    Cleared,
    Quarantined { moved_to: PathBuf },
    NothingToReset,
}

fn issues_table(issues: &[Issue]) -> String {
    let mut table = list_table(&["id", "phase", "severity", "resolved", "description"]);
    for issue in issues {
        table.add_row(vec![
            issue.id.clone(),
            issue.phase.to_string(),
            severity_style(issue.severity).to_string(),
            issue.resolved.to_string(),
            issue.description.clone(),
        ]);
    }
    table.to_string()
}

impl CommandOutput for CheckpointOutput {
    fn to_human(&self) -> String {
        match self {
            Self::Found {
                checkpoint,
                phase_names,
            } => {
                let name = |index: PhaseIndex| {
                    phase_names
                        .iter()
                        .find(|(i, _)| *i == index)
                        .map_or("?", |(_, n)| n.as_str())
                        .to_string()
                };
                let mut lines = vec![
                    format!("Run:            {}", checkpoint.run_id),
                    format!(
                        "Last completed: {}",
                        checkpoint
                            .last_completed_phase
                            .map_or_else(|| "none".to_string(), |p| format!("{p} ({})", name(p)))
                    ),
                    format!(
                        "Current phase:  {} ({})",
                        checkpoint.current_phase(),
                        name(checkpoint.current_phase())
                    ),
                    format!("Saved at:       {}", checkpoint.timestamp.to_rfc3339()),
                ];
                if let Some(section) = &checkpoint.current_section {
                    lines.push(format!("Section:        {section}"));
                }
                for (phase, out) in &checkpoint.phase_outputs {
                    if !out.artifacts.is_empty() {
                        lines.push(format!("Phase {phase} artifacts: {}", out.artifacts.join(", ")));
                    }
                }
                if !checkpoint.flagged_issues.is_empty() {
                    lines.push(String::new());
                    lines.push(issues_table(&checkpoint.flagged_issues));
                }
                lines.join("\n")
            }
            Self::NotFound => "No checkpoint found.".to_string(),
            Self::Corrupt { reason } => {
                format!("Checkpoint is corrupt: {reason}\nRun `quire checkpoint reset` to move it aside.")
            }
            Self::Updated { message, .. } => message.clone(),
            Self::Cleared => "Checkpoint cleared.".to_string(),
            Self::Quarantined { moved_to } => {
                format!("Corrupt checkpoint moved to {}", moved_to.display())
            }
            Self::NothingToReset => "No checkpoint to reset.".to_string(),
        }
    }
}

pub async fn execute(args: CheckpointArgs, gov: &Governance, json_mode: bool) -> Result<()> {
    let store = gov.checkpoint();
    let result = match args.command {
        CheckpointCommands::Show => match store.load().await? {
            LoadOutcome::Loaded(checkpoint) => CheckpointOutput::Found {
                checkpoint,
                phase_names: gov
                    .gate()
                    .plan()
                    .iter()
                    .map(|p| (p.index, p.name.clone()))
                    .collect(),
            },
            LoadOutcome::NotFound => CheckpointOutput::NotFound,
            LoadOutcome::Corrupt { reason } => CheckpointOutput::Corrupt { reason },
        },
        CheckpointCommands::Start { run_id } => {
            if !matches!(store.load().await?, LoadOutcome::NotFound) {
                bail!("a checkpoint already exists; clear or reset it first");
            }
            let checkpoint = CheckpointState::new(&run_id);
            store.save(&checkpoint).await?;
            gov.run(&run_id).await?;
            CheckpointOutput::Updated {
                checkpoint,
                message: format!("Started run {run_id}."),
            }
        }
        CheckpointCommands::Artifact { phase, artifact } => {
            let mut checkpoint = load_existing(gov).await?;
            checkpoint.record_artifact(phase, &artifact);
            store.save(&checkpoint).await?;
            CheckpointOutput::Updated {
                checkpoint,
                message: format!("Recorded {artifact} for phase {phase}."),
            }
        }
        CheckpointCommands::Issue {
            phase,
            id,
            description,
            severity,
        } => {
            let mut checkpoint = load_existing(gov).await?;
            checkpoint.flag_issue(Issue::new(&id, phase, severity, description));
            store.save(&checkpoint).await?;
            CheckpointOutput::Updated {
                checkpoint,
                message: format!("Flagged issue {id} against phase {phase}."),
            }
        }
        CheckpointCommands::Resolve { id } => {
            let mut checkpoint = load_existing(gov).await?;
            if !checkpoint.resolve_issue(&id) {
                bail!("no issue with id {id}");
            }
            store.save(&checkpoint).await?;
            CheckpointOutput::Updated {
                checkpoint,
                message: format!("Resolved issue {id}."),
            }
        }
        CheckpointCommands::Clear => {
            store.clear().await?;
            CheckpointOutput::Cleared
        }
        CheckpointCommands::Reset => match store.reset().await? {
            ResetOutcome::Cleared => CheckpointOutput::Cleared,
            ResetOutcome::Quarantined(moved_to) => CheckpointOutput::Quarantined { moved_to },
            ResetOutcome::NothingToReset => CheckpointOutput::NothingToReset,
        },
    };
    output(&result, json_mode);
    Ok(())
}

async fn load_existing(gov: &Governance) -> Result<CheckpointState> {
    match gov.checkpoint().load().await? {
        LoadOutcome::Loaded(state) => Ok(state),
        LoadOutcome::NotFound => bail!("no checkpoint; start a run with `quire checkpoint start <run_id>`"),
        LoadOutcome::Corrupt { reason } => bail!("checkpoint is corrupt: {reason}"),
    }
}

//! Implementation of the `quire hook` commands.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::cli::resolve_run_id;
use crate::domain::models::hook::{HookEvent, HookEventType, HookStats};
use crate::services::{Governance, RecordOutcome};

#[derive(Args, Debug)]
pub struct HookArgs {
    #[command(subcommand)]
    pub command: HookCommands,
}

#[derive(Subcommand, Debug)]
pub enum HookCommands {
    /// Record one hook outcome
    Record {
        /// Hook identifier
        hook_id: String,
        /// trigger, pass, fix or false_positive
        event_type: HookEventType,
        /// Artifact or finding the event refers to
        #[arg(long, default_value = "")]
        context: String,
        /// Run the event belongs to (defaults to the checkpoint's run)
        #[arg(long)]
        run: Option<String>,
        /// Event time (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Show statistics for one hook or all hooks
    Stats {
        /// Hook identifier
        hook_id: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct RecordOutput {
    pub event: HookEvent,
    pub duplicate: bool,
}

impl CommandOutput for RecordOutput {
    fn to_human(&self) -> String {
        if self.duplicate {
            format!(
                "Duplicate {} event for {} ignored.",
                self.event.event_type, self.event.hook_id
            )
        } else {
            format!("Recorded {} for {}.", self.event.event_type, self.event.hook_id)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsOutput {
    pub hooks: Vec<HookStats>,
}

impl CommandOutput for StatsOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&[
            "hook", "executions", "triggers", "fixes", "false pos", "runs", "trigger", "fix", "fp",
        ]);
        for s in &self.hooks {
            table.add_row(vec![
                s.hook_id.clone(),
                s.executions.to_string(),
                s.triggers.to_string(),
                s.fixes.to_string(),
                s.false_positives.to_string(),
                s.runs_observed.to_string(),
                s.trigger_rate.to_string(),
                s.fix_rate.to_string(),
                s.false_positive_rate.to_string(),
            ]);
        }
        render_list("hook", &table, self.hooks.len())
    }
}

pub async fn execute(args: HookArgs, gov: &Governance, json_mode: bool) -> Result<()> {
    match args.command {
        HookCommands::Record {
            hook_id,
            event_type,
            context,
            run,
            at,
        } => {
            let mut event = HookEvent::new(hook_id, event_type, context);
            if let Ok(run_id) = resolve_run_id(gov, run).await {
                event = event.in_run(run_id);
            }
            if let Some(at) = at {
                event = event.at(at);
            }
            let outcome = gov.hooks().record(event.clone()).await?;
            output(
                &RecordOutput {
                    event,
                    duplicate: outcome == RecordOutcome::Duplicate,
                },
                json_mode,
            );
        }
        HookCommands::Stats { hook_id } => {
            let hooks = match hook_id {
                Some(id) => vec![gov.hooks().stats(&id).await],
                None => gov.hooks().all_stats().await,
            };
            output(&StatsOutput { hooks }, json_mode);
        }
    }
    Ok(())
}

//! Implementation of the `quire analyze`, `quire confirm` and `quire verify` commands.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::style;
use serde::Serialize;
use uuid::Uuid;

use crate::cli::output::{list_table, opt_num, output, render_list, CommandOutput};
use crate::cli::resolve_run_id;
use crate::domain::models::evolution::RunContext;
use crate::services::{AnalysisReport, ConfirmOutcome, Governance, VerificationReport};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Run to analyze (defaults to the checkpoint's run)
    #[arg(long)]
    pub run: Option<String>,
    /// Round to analyze
    #[arg(long)]
    pub round: u32,
}

#[derive(Args, Debug)]
pub struct ConfirmArgs {
    /// Proposal identifier
    pub proposal_id: Uuid,
    /// Decline instead of confirming
    #[arg(long)]
    pub decline: bool,
    /// Run that raised the proposal (searched when omitted)
    #[arg(long)]
    pub run: Option<String>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Run directories to aggregate (defaults to every run in the data directory)
    pub run_dirs: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct AnalyzeOutput(pub AnalysisReport);

impl CommandOutput for AnalyzeOutput {
    fn to_human(&self) -> String {
        let r = &self.0;
        let mut lines = vec![format!(
            "Analysis of {} round {} (aggregate {})",
            r.run_id,
            r.round,
            opt_num(r.aggregate, 2)
        )];
        if r.is_empty() {
            lines.push("Nothing to adjust.".to_string());
            return lines.join("\n");
        }
        for a in &r.adjustments {
            lines.push(format!(
                "{} {}: {} -> {:.3} ({})",
                style("adjusted").green(),
                a.parameter_id,
                a.old_value,
                a.new_value,
                a.reason
            ));
        }
        for p in &r.proposals {
            lines.push(format!(
                "{} {:?} for {} [{}]: {}",
                style("proposed").yellow(),
                p.kind,
                p.hook_id,
                p.id,
                p.reason
            ));
        }
        for l in &r.lessons {
            lines.push(format!("{} {}", style("lesson").cyan(), l.text));
        }
        for c in &r.learned_constraints {
            lines.push(format!("{} {} ({})", style("learned").magenta(), c.id, c.severity));
        }
        for e in &r.escalations {
            lines.push(format!(
                "{} {}: {} -> {}",
                style("escalated").red(),
                e.constraint_id,
                e.from,
                e.to
            ));
        }
        for x in &r.rejections {
            lines.push(format!("{} {}: {}", style("rejected").dim(), x.target, x.reason));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfirmOutput(pub ConfirmOutcome);

impl CommandOutput for ConfirmOutput {
    fn to_human(&self) -> String {
        let p = &self.0.proposal;
        let mut line = format!("Proposal {} is now {:?}.", p.id, p.status);
        if let Some(a) = &self.0.adjustment {
            line.push_str(&format!(" {} set {} -> {}.", style("Applied").green(), a.old_value, a.new_value));
        }
        line
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct VerifyOutput(pub VerificationReport);

impl CommandOutput for VerifyOutput {
    fn to_human(&self) -> String {
        let r = &self.0;
        let mut table = list_table(&[
            "run", "auto", "pending", "declined", "lessons", "learned", "rejected", "first", "last",
        ]);
        for run in &r.runs {
            table.add_row(vec![
                run.run_id.clone(),
                run.auto_applied.to_string(),
                run.pending_proposals.to_string(),
                run.declined_proposals.to_string(),
                run.lessons.to_string(),
                run.learned_total().to_string(),
                run.rejected_changes.to_string(),
                opt_num(run.trend.first_mean, 2),
                opt_num(run.trend.last_mean, 2),
            ]);
        }
        let verdict = if r.adapting {
            style("adapting").green().bold()
        } else {
            style("not adapting").yellow().bold()
        };
        format!(
            "{}\n\n{} of {} run(s) with a trend improved; {}",
            render_list("run", &table, r.runs.len()),
            r.improved_runs,
            r.runs_with_trend,
            verdict
        )
    }
}

pub async fn analyze(args: AnalyzeArgs, gov: &Governance, json_mode: bool) -> Result<()> {
    let run_id = resolve_run_id(gov, args.run).await?;
    let report = gov.analyze(&RunContext::new(run_id, args.round)).await?;
    output(&AnalyzeOutput(report), json_mode);
    Ok(())
}

pub async fn confirm(args: ConfirmArgs, gov: &Governance, json_mode: bool) -> Result<()> {
    let outcome = gov
        .confirm(args.proposal_id, !args.decline, args.run.as_deref())
        .await?;
    output(&ConfirmOutput(outcome), json_mode);
    Ok(())
}

pub async fn verify(args: VerifyArgs, gov: &Governance, json_mode: bool) -> Result<()> {
    let report = gov.verify(&args.run_dirs).await?;
    output(&VerifyOutput(report), json_mode);
    Ok(())
}

//! Implementation of the `quire score` commands.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::cli::resolve_run_id;
use crate::domain::models::scorecard::{RoundMean, ScoreRecord};
use crate::services::Governance;

#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[command(subcommand)]
    pub command: ScoreCommands,

    /// Run to score (defaults to the checkpoint's run)
    #[arg(long, global = true)]
    pub run: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ScoreCommands {
    /// Record a 0-10 score for one dimension of a round
    Record {
        round: u32,
        dimension: String,
        score: f64,
    },
    /// Show every score of a round
    Show { round: u32 },
    /// Weighted aggregate of a round
    Aggregate { round: u32 },
    /// Mean score per round
    Trend,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ScoreOutput {
    Recorded { run_id: String, record: ScoreRecord },
    Round {
        run_id: String,
        round: u32,
        scores: Vec<ScoreRecord>,
        weak: Vec<String>,
    },
    Aggregate { run_id: String, round: u32, aggregate: f64, gate_threshold: f64 },
    Trend { run_id: String, trend: Vec<RoundMean> },
}

impl CommandOutput for ScoreOutput {
    fn to_human(&self) -> String {
        match self {
            Self::Recorded { run_id, record } => format!(
                "Recorded {}={} for round {} of {run_id}.",
                record.dimension, record.score, record.round
            ),
            Self::Round {
                run_id,
                round,
                scores,
                weak,
            } => {
                let mut table = list_table(&["dimension", "score", "weak"]);
                for r in scores {
                    table.add_row(vec![
                        r.dimension.clone(),
                        format!("{:.1}", r.score),
                        if weak.contains(&r.dimension) { "yes" } else { "" }.to_string(),
                    ]);
                }
                format!(
                    "Run {run_id}, round {round}\n{}",
                    render_list("score", &table, scores.len())
                )
            }
            Self::Aggregate {
                run_id,
                round,
                aggregate,
                gate_threshold,
            } => format!(
                "Run {run_id}, round {round}: aggregate {aggregate:.2} (gate threshold {gate_threshold:.2})"
            ),
            Self::Trend { run_id, trend } => {
                let mut table = list_table(&["round", "mean"]);
                for r in trend {
                    table.add_row(vec![r.round.to_string(), format!("{:.2}", r.mean)]);
                }
                format!("Run {run_id}\n{}", render_list("round", &table, trend.len()))
            }
        }
    }
}

pub async fn execute(args: ScoreArgs, gov: &Governance, json_mode: bool) -> Result<()> {
    let run_id = resolve_run_id(gov, args.run).await?;
    let run = gov.run(&run_id).await?;
    let scoring = &gov.config().scorecard;

    let result = match args.command {
        ScoreCommands::Record {
            round,
            dimension,
            score,
        } => ScoreOutput::Recorded {
            record: run.scorecard.record(round, &dimension, score).await?,
            run_id,
        },
        ScoreCommands::Show { round } => {
            let Some(scores) = run.scorecard.round(round).await else {
                bail!("round {round} has no recorded scores");
            };
            let weak = run
                .scorecard
                .weak_dimensions(round, scoring.weak_threshold)
                .await
                .into_iter()
                .map(|r| r.dimension)
                .collect();
            ScoreOutput::Round {
                run_id,
                round,
                scores: scores.into_values().collect(),
                weak,
            }
        }
        ScoreCommands::Aggregate { round } => ScoreOutput::Aggregate {
            aggregate: run.scorecard.aggregate(round, &scoring.weights).await?,
            run_id,
            round,
            gate_threshold: scoring.gate_threshold,
        },
        ScoreCommands::Trend => ScoreOutput::Trend {
            trend: run.scorecard.trend().await,
            run_id,
        },
    };
    output(&result, json_mode);
    Ok(())
}

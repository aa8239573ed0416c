//! Implementation of the `quire constraint` commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{list_table, output, render_list, severity_style, CommandOutput};
use crate::domain::models::constraint::{Constraint, ContentSummary, Origin, Severity, Violation};
use crate::services::Governance;

#[derive(Args, Debug)]
pub struct ConstraintArgs {
    #[command(subcommand)]
    pub command: ConstraintCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConstraintCommands {
    /// List constraints
    List {
        /// Only constraints of this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Validate a content summary (JSON file) against every constraint
    Validate {
        /// Path to a content summary JSON document
        summary: PathBuf,
    },
}

#[derive(Debug, Serialize)]
pub struct ListOutput {
    pub constraints: Vec<Constraint>,
}

impl CommandOutput for ListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "category", "severity", "origin", "description"]);
        for c in &self.constraints {
            table.add_row(vec![
                c.id.clone(),
                c.category.clone(),
                severity_style(c.severity).to_string(),
                match c.origin {
                    Origin::Base => "base".to_string(),
                    Origin::Learned => "learned".to_string(),
                },
                c.description.clone(),
            ]);
        }
        render_list("constraint", &table, self.constraints.len())
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub violations: Vec<Violation>,
    pub critical: usize,
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        if self.violations.is_empty() {
            return "No violations.".to_string();
        }
        let mut table = list_table(&["constraint", "severity", "category", "detail"]);
        for v in &self.violations {
            table.add_row(vec![
                v.constraint_id.clone(),
                severity_style(v.severity).to_string(),
                v.category.clone(),
                v.detail.clone(),
            ]);
        }
        format!(
            "{}\n{} critical",
            render_list("violation", &table, self.violations.len()),
            self.critical
        )
    }
}

/// Read a content summary document.
pub async fn read_summary(path: &Path) -> Result<ContentSummary> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid content summary in {}", path.display()))
}

pub async fn execute(args: ConstraintArgs, gov: &Governance, json_mode: bool) -> Result<()> {
    match args.command {
        ConstraintCommands::List { category } => {
            let constraints = match category {
                Some(category) => gov.constraints().by_category(&category).await,
                None => gov.constraints().list().await,
            };
            output(&ListOutput { constraints }, json_mode);
        }
        ConstraintCommands::Validate { summary } => {
            let summary = read_summary(&summary).await?;
            let violations = gov.constraints().validate(&summary).await;
            let critical = violations
                .iter()
                .filter(|v| v.severity == Severity::Critical)
                .count();
            output(&ValidateOutput { violations, critical }, json_mode);
        }
    }
    Ok(())
}

//! Command-line host for the governance engine.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use anyhow::{anyhow, Result};
use console::style;

use crate::services::Governance;

/// Print an error in the selected output mode and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", style("Error:").red().bold());
    }
    std::process::exit(1);
}

/// Use `explicit` when given, otherwise the run recorded in the checkpoint.
pub async fn resolve_run_id(gov: &Governance, explicit: Option<String>) -> Result<String> {
    if let Some(run_id) = explicit {
        return Ok(run_id);
    }
    gov.checkpoint()
        .load()
        .await?
        .into_option()
        .map(|state| state.run_id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("no run id given and no checkpoint to take one from; pass --run"))
}

//! Quire CLI entry point.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use quire::cli::commands::{checkpoint, constraint, evolution, gate, hook, init, score};
use quire::cli::{Cli, Commands};
use quire::infrastructure::logging::{LogConfig, LoggerImpl};
use quire::{Config, ConfigLoader, Governance};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        quire::cli::handle_error(err, json);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration")
}

async fn run(cli: Cli) -> Result<()> {
    // init writes the config it would otherwise read
    let command = match cli.command {
        Commands::Init(args) => return init::execute(args, cli.json).await,
        other => other,
    };

    let config = load_config(cli.config.as_deref())?;
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))
        .context("Failed to initialize logging")?;
    let gov = Governance::open(&config)
        .await
        .context("Failed to open governance data")?;

    match command {
        Commands::Init(_) => Ok(()),
        Commands::Checkpoint(args) => checkpoint::execute(args, &gov, cli.json).await,
        Commands::Hook(args) => hook::execute(args, &gov, cli.json).await,
        Commands::Score(args) => score::execute(args, &gov, cli.json).await,
        Commands::Constraint(args) => constraint::execute(args, &gov, cli.json).await,
        Commands::Gate(args) => gate::execute(args, &gov, cli.json).await,
        Commands::Analyze(args) => evolution::analyze(args, &gov, cli.json).await,
        Commands::Confirm(args) => evolution::confirm(args, &gov, cli.json).await,
        Commands::Verify(args) => evolution::verify(args, &gov, cli.json).await,
    }
}

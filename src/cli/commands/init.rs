//! Implementation of the `quire init` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::setup::{create_config_dir, create_config_file, SetupPaths};
use crate::services::Governance;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long, short)]
    pub force: bool,

    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_written: bool,
    pub data_dir: PathBuf,
    pub constraints: usize,
    pub thresholds: usize,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.success {
            if self.config_written {
                lines.push(format!(
                    "\nWrote default configuration to {}",
                    self.initialized_path.join(".quire/config.yaml").display()
                ));
            }
            lines.push(format!("Data directory: {}", self.data_dir.display()));
            lines.push(format!(
                "Seeded {} constraint(s) and {} threshold(s)",
                self.constraints, self.thresholds
            ));
        }
        lines.join("\n")
    }
}

/// Resolve a configured path against the project root.
fn under(root: &Path, configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };
    let paths = SetupPaths::new(&target_path);

    if paths.is_initialized() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to rewrite the configuration.".to_string(),
            data_dir: paths.config_dir.clone(),
            initialized_path: target_path,
            config_written: false,
            constraints: 0,
            thresholds: 0,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    create_config_dir(&paths)?;
    let config_written = create_config_file(&paths, args.force)?;

    let mut config = ConfigLoader::load_from_dir(&target_path)?;
    let data_dir = under(&target_path, &config.data_dir);
    config.data_dir = data_dir.to_string_lossy().into_owned();
    config.artifact_root = under(&target_path, &config.artifact_root)
        .to_string_lossy()
        .into_owned();

    let gov = Governance::open(&config)
        .await
        .context("Failed to initialize governance stores")?;

    let output_data = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path,
        config_written,
        data_dir,
        constraints: gov.constraints().len().await,
        thresholds: gov.thresholds().all().await.len(),
    };
    output(&output_data, json_mode);
    Ok(())
}

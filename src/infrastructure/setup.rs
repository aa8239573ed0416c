//! Quire setup and initialization infrastructure
//!
//! Handles project initialization:
//! - Configuration directory creation
//! - Default config file creation

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::config::CONFIG_DIR;
use crate::domain::models::config::Config;

const CONFIG_HEADER: &str = "# Quire configuration
# Override settings by editing this file, adding .quire/local.yaml, or setting
# environment variables with the QUIRE_ prefix (nested keys split on __):
#   export QUIRE_LOGGING__LEVEL=debug
#   export QUIRE_SCORECARD__GATE_THRESHOLD=7.5
";

/// Setup paths and directories
pub struct SetupPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
}

impl SetupPaths {
    /// Setup paths for the project rooted at `root`
    pub fn new(root: impl AsRef<Path>) -> Self {
        let config_dir = root.as_ref().join(CONFIG_DIR);
        Self {
            config_file: config_dir.join("config.yaml"),
            config_dir,
        }
    }

    /// Setup paths for the current directory
    pub fn current() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Ok(Self::new(current_dir))
    }

    /// Check if Quire is already initialized
    pub fn is_initialized(&self) -> bool {
        self.config_file.exists()
    }
}

/// Create the configuration directory
pub fn create_config_dir(paths: &SetupPaths) -> Result<()> {
    fs::create_dir_all(&paths.config_dir).context("Failed to create config directory")
}

/// Write the default configuration file. Returns false if one already exists
/// and `force` is not set.
pub fn create_config_file(paths: &SetupPaths, force: bool) -> Result<bool> {
    if paths.config_file.exists() && !force {
        return Ok(false);
    }

    let body = serde_yaml::to_string(&Config::default())
        .context("Failed to render default configuration")?;
    fs::write(&paths.config_file, format!("{CONFIG_HEADER}\n{body}"))
        .context("Failed to write config file")?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigLoader;
    use tempfile::TempDir;

    #[test]
    fn test_written_config_round_trips() {
        let dir = TempDir::new().unwrap();
        let paths = SetupPaths::new(dir.path());
        assert!(!paths.is_initialized());

        create_config_dir(&paths).unwrap();
        assert!(create_config_file(&paths, false).unwrap());
        assert!(paths.is_initialized());
        assert!(!create_config_file(&paths, false).unwrap());
        assert!(create_config_file(&paths, true).unwrap());

        let content = fs::read_to_string(&paths.config_file).unwrap();
        let parsed: Config = serde_yaml::from_str(&content).unwrap();
        assert_eq!(parsed, Config::default());
        ConfigLoader::validate(&parsed).unwrap();
    }
}

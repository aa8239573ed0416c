use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::error::PlanError;
use crate::domain::models::config::Config;
use crate::domain::models::phase::PhasePlan;
use crate::domain::models::scorecard::{validate_weights, MAX_SCORE, MIN_SCORE};
use crate::domain::models::threshold::DRIFT_CAP;

/// Project-local configuration directory
pub const CONFIG_DIR: &str = ".quire";

/// Prefix for environment overrides; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "QUIRE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Data directory cannot be empty")]
    EmptyDataDir,

    #[error("Invalid {name}: {value}. Must be between 0 and 10")]
    InvalidScoreThreshold { name: &'static str, value: f64 },

    #[error("Invalid critical_floor: {floor}. Must not exceed weak_threshold ({weak})")]
    InvalidCriticalFloor { floor: f64, weak: f64 },

    #[error("Invalid drift_cap: {0}. Must be greater than 0 and at most 0.2")]
    InvalidDriftCap(f64),

    #[error("Invalid loosen step range: min {min}, max {max}. Need 0 < min <= max <= drift_cap")]
    InvalidLoosenStep { min: f64, max: f64 },

    #[error("Invalid {name}: {value}. Must be between 0 and 1")]
    InvalidRate { name: &'static str, value: f64 },

    #[error("Invalid trigger rate band: low ({low}) must be below high ({high})")]
    InvalidTriggerBand { low: f64, high: f64 },

    #[error("Invalid min_samples: {0}. Must be at least 1")]
    InvalidMinSamples(u64),

    #[error("Invalid decline_tolerance: {0}. Must be a non-negative number")]
    InvalidDeclineTolerance(f64),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(#[from] PlanError),

    #[error("Invalid scorecard weights: {0}")]
    InvalidWeights(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .quire/config.yaml (project config, created by init)
    /// 3. .quire/local.yaml (project local overrides, optional)
    /// 4. Environment variables (QUIRE_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Load configuration for the project rooted at `root`
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let config_dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.data_dir.trim().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }

        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        // Scorecard
        let sc = &config.scorecard;
        for (name, value) in [
            ("weak_threshold", sc.weak_threshold),
            ("gate_threshold", sc.gate_threshold),
            ("critical_floor", sc.critical_floor),
        ] {
            if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
                return Err(ConfigError::InvalidScoreThreshold { name, value });
            }
        }
        if sc.critical_floor > sc.weak_threshold {
            return Err(ConfigError::InvalidCriticalFloor {
                floor: sc.critical_floor,
                weak: sc.weak_threshold,
            });
        }
        validate_weights(&sc.weights).map_err(|e| ConfigError::InvalidWeights(e.to_string()))?;

        // Adjustment engine
        let adj = &config.adjustment;
        if !(adj.drift_cap > 0.0 && adj.drift_cap <= DRIFT_CAP) {
            return Err(ConfigError::InvalidDriftCap(adj.drift_cap));
        }
        if !(adj.min_loosen_step > 0.0
            && adj.min_loosen_step <= adj.max_loosen_step
            && adj.max_loosen_step <= adj.drift_cap)
        {
            return Err(ConfigError::InvalidLoosenStep {
                min: adj.min_loosen_step,
                max: adj.max_loosen_step,
            });
        }
        for (name, value) in [
            ("high_trigger_rate", adj.high_trigger_rate),
            ("low_trigger_rate", adj.low_trigger_rate),
            ("false_positive_rate", adj.false_positive_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidRate { name, value });
            }
        }
        if adj.low_trigger_rate >= adj.high_trigger_rate {
            return Err(ConfigError::InvalidTriggerBand {
                low: adj.low_trigger_rate,
                high: adj.high_trigger_rate,
            });
        }
        if adj.min_samples == 0 {
            return Err(ConfigError::InvalidMinSamples(adj.min_samples));
        }

        // Pipeline
        PhasePlan::new(config.pipeline.clone())?;

        // Verifier
        let tolerance = config.verifier.decline_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::InvalidDeclineTolerance(tolerance));
        }

        Ok(())
    }
}

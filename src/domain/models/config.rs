use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::phase::{default_document_phases, PipelinePhase};
use super::scorecard::{default_weights, Weights, DEFAULT_WEAK_THRESHOLD};
use super::threshold::DRIFT_CAP;

/// Main configuration structure for Quire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Directory holding the checkpoint, ledgers and rule sets
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Root that artifact paths in the checkpoint are relative to
    #[serde(default = "default_artifact_root")]
    pub artifact_root: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Persistence behaviour
    #[serde(default)]
    pub storage: StorageConfig,

    /// Score thresholds and weights
    #[serde(default)]
    pub scorecard: ScorecardConfig,

    /// Adjustment engine rules
    #[serde(default)]
    pub adjustment: AdjustmentConfig,

    /// Ordered pipeline phases
    #[serde(default = "default_document_phases")]
    pub pipeline: Vec<PipelinePhase>,

    /// Cross-run verification
    #[serde(default)]
    pub verifier: VerifierConfig,
}

fn default_data_dir() -> String {
    ".quire".to_string()
}

fn default_artifact_root() -> String {
    ".".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            artifact_root: default_artifact_root(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            scorecard: ScorecardConfig::default(),
            adjustment: AdjustmentConfig::default(),
            pipeline: default_document_phases(),
            verifier: VerifierConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageConfig {
    /// Delay before the single retry of a failed write
    #[serde(default = "default_write_retry_delay_ms")]
    pub write_retry_delay_ms: u64,
}

const fn default_write_retry_delay_ms() -> u64 {
    100
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            write_retry_delay_ms: default_write_retry_delay_ms(),
        }
    }
}

/// Scorecard configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScorecardConfig {
    /// Dimensions scoring below this are weak
    #[serde(default = "default_weak_threshold")]
    pub weak_threshold: f64,

    /// Minimum weighted aggregate for quality-sensitive phases
    #[serde(default = "default_gate_threshold")]
    pub gate_threshold: f64,

    /// A learned floor whose dimension stays below this escalates to critical
    #[serde(default = "default_critical_floor")]
    pub critical_floor: f64,

    /// Dimension weights; must sum to 1.0
    #[serde(default = "default_weights")]
    pub weights: Weights,
}

const fn default_weak_threshold() -> f64 {
    DEFAULT_WEAK_THRESHOLD
}

const fn default_gate_threshold() -> f64 {
    7.0
}

const fn default_critical_floor() -> f64 {
    4.0
}

impl Default for ScorecardConfig {
    fn default() -> Self {
        Self {
            weak_threshold: default_weak_threshold(),
            gate_threshold: default_gate_threshold(),
            critical_floor: default_critical_floor(),
            weights: default_weights(),
        }
    }
}

/// Adjustment engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdjustmentConfig {
    /// Executions a hook needs before it is classified
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    /// Trigger rate above which a hook is loosened
    #[serde(default = "default_high_trigger_rate")]
    pub high_trigger_rate: f64,

    /// Trigger rate below which a hook becomes a removal candidate
    #[serde(default = "default_low_trigger_rate")]
    pub low_trigger_rate: f64,

    /// Distinct runs required before proposing removal
    #[serde(default = "default_removal_min_runs")]
    pub removal_min_runs: u64,

    /// False-positive rate above which a logic review is proposed
    #[serde(default = "default_false_positive_rate")]
    pub false_positive_rate: f64,

    /// Largest loosening step, as a fraction of the current value
    #[serde(default = "default_max_loosen_step")]
    pub max_loosen_step: f64,

    /// Smallest loosening step
    #[serde(default = "default_min_loosen_step")]
    pub min_loosen_step: f64,

    /// Largest change applied without confirmation
    #[serde(default = "default_drift_cap")]
    pub drift_cap: f64,

    /// Hooks that contribute to each score dimension
    #[serde(default = "default_dimension_hooks")]
    pub dimension_hooks: BTreeMap<String, Vec<String>>,
}

const fn default_min_samples() -> u64 {
    5
}

const fn default_high_trigger_rate() -> f64 {
    0.80
}

const fn default_low_trigger_rate() -> f64 {
    0.05
}

const fn default_removal_min_runs() -> u64 {
    5
}

const fn default_false_positive_rate() -> f64 {
    0.30
}

const fn default_max_loosen_step() -> f64 {
    0.15
}

const fn default_min_loosen_step() -> f64 {
    0.05
}

const fn default_drift_cap() -> f64 {
    DRIFT_CAP
}

fn default_dimension_hooks() -> BTreeMap<String, Vec<String>> {
    [
        ("clarity", vec!["sentence-length", "passive-voice", "hedging"]),
        ("structure", vec!["paragraph-length"]),
        ("citations", vec!["citation-density"]),
    ]
    .into_iter()
    .map(|(dim, hooks)| (dim.to_string(), hooks.into_iter().map(String::from).collect()))
    .collect()
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            high_trigger_rate: default_high_trigger_rate(),
            low_trigger_rate: default_low_trigger_rate(),
            removal_min_runs: default_removal_min_runs(),
            false_positive_rate: default_false_positive_rate(),
            max_loosen_step: default_max_loosen_step(),
            min_loosen_step: default_min_loosen_step(),
            drift_cap: default_drift_cap(),
            dimension_hooks: default_dimension_hooks(),
        }
    }
}

/// Cross-run verifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VerifierConfig {
    /// Largest first-to-last mean score drop still counted as adapting
    #[serde(default = "default_decline_tolerance")]
    pub decline_tolerance: f64,
}

const fn default_decline_tolerance() -> f64 {
    0.5
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            decline_tolerance: default_decline_tolerance(),
        }
    }
}

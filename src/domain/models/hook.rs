//! Hook event domain models
//!
//! A hook is a named quality check. Every check outcome is one immutable
//! [`HookEvent`]; [`HookStats`] are derived from the events and never stored.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome reported by a reviewer for one hook check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEventType {
    /// The check fired on the artifact
    Trigger,
    /// The check ran and did not fire
    Pass,
    /// A triggered finding was fixed
    Fix,
    /// A triggered finding was judged wrong
    FalsePositive,
}

impl fmt::Display for HookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Trigger => "trigger",
            Self::Pass => "pass",
            Self::Fix => "fix",
            Self::FalsePositive => "false_positive",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for HookEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "trigger" => Ok(Self::Trigger),
            "pass" => Ok(Self::Pass),
            "fix" => Ok(Self::Fix),
            "false_positive" | "fp" => Ok(Self::FalsePositive),
            other => Err(format!("unknown hook event type: {other}")),
        }
    }
}

/// One recorded check outcome. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookEvent {
    pub hook_id: String,
    pub event_type: HookEventType,
    pub timestamp: DateTime<Utc>,
    /// Pointer to the artifact or finding the event is about
    #[serde(default)]
    pub context_ref: String,
    /// Pipeline run that produced the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl HookEvent {
    pub fn new(
        hook_id: impl Into<String>,
        event_type: HookEventType,
        context_ref: impl Into<String>,
    ) -> Self {
        Self {
            hook_id: hook_id.into(),
            event_type,
            timestamp: Utc::now(),
            context_ref: context_ref.into(),
            run_id: None,
        }
    }

    #[must_use]
    pub fn in_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Identity used for duplicate detection.
    pub fn dedup_key(&self) -> HookEventKey {
        HookEventKey {
            hook_id: self.hook_id.clone(),
            event_type: self.event_type,
            timestamp: self.timestamp,
            context_ref: self.context_ref.clone(),
        }
    }
}

/// Fields that make two hook events "the same event".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookEventKey {
    hook_id: String,
    event_type: HookEventType,
    timestamp: DateTime<Utc>,
    context_ref: String,
}

/// A ratio that may not be computable yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rate {
    Value(f64),
    InsufficientData,
}

impl Rate {
    /// `numerator / denominator`, or `InsufficientData` when the denominator is zero.
    pub fn of(numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            Self::InsufficientData
        } else {
            Self::Value(numerator as f64 / denominator as f64)
        }
    }

    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::InsufficientData => None,
        }
    }

    pub fn above(self, threshold: f64) -> bool {
        self.value().is_some_and(|v| v > threshold)
    }

    pub fn below(self, threshold: f64) -> bool {
        self.value().is_some_and(|v| v < threshold)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{:.1}%", v * 100.0),
            Self::InsufficientData => f.write_str("n/a"),
        }
    }
}

/// Per-hook effectiveness statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookStats {
    pub hook_id: String,
    /// `triggers + passes`
    pub executions: u64,
    pub triggers: u64,
    pub passes: u64,
    pub fixes: u64,
    pub false_positives: u64,
    /// Distinct runs that reported on this hook
    pub runs_observed: u64,
    pub trigger_rate: Rate,
    pub fix_rate: Rate,
    pub false_positive_rate: Rate,
}

impl HookStats {
    /// Aggregate the events belonging to `hook_id`.
    pub fn from_events<'a>(
        hook_id: &str,
        events: impl IntoIterator<Item = &'a HookEvent>,
    ) -> Self {
        let mut triggers = 0;
        let mut passes = 0;
        let mut fixes = 0;
        let mut false_positives = 0;
        let mut runs: HashSet<Option<&str>> = HashSet::new();

        for event in events.into_iter().filter(|e| e.hook_id == hook_id) {
            match event.event_type {
                HookEventType::Trigger => triggers += 1,
                HookEventType::Pass => passes += 1,
                HookEventType::Fix => fixes += 1,
                HookEventType::FalsePositive => false_positives += 1,
            }
            runs.insert(event.run_id.as_deref());
        }

        let executions = triggers + passes;
        Self {
            hook_id: hook_id.to_string(),
            executions,
            triggers,
            passes,
            fixes,
            false_positives,
            runs_observed: runs.len() as u64,
            trigger_rate: Rate::of(triggers, executions),
            fix_rate: Rate::of(fixes, triggers),
            false_positive_rate: Rate::of(false_positives, triggers),
        }
    }
}

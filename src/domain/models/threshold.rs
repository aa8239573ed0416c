//! Adjustable enforcement thresholds and the drift cap.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Hard upper bound on any single automatic adjustment, as a fraction of the old value.
pub const DRIFT_CAP: f64 = 0.20;

/// Which way a threshold limits content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// Content must stay at or below the value; loosening raises it
    #[default]
    Upper,
    /// Content must stay at or above the value; loosening lowers it
    Lower,
}

/// One adjustable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdParameter {
    pub id: String,
    pub value: f64,
    #[serde(default)]
    pub bound: Bound,
    /// Hook whose firing this threshold controls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_id: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Count of the hook's ledger events already acted on by an adjustment.
    /// Later loosening only weighs events past this mark.
    #[serde(default)]
    pub evidence_mark: u64,
}

impl ThresholdParameter {
    pub fn new(id: impl Into<String>, value: f64, bound: Bound) -> Self {
        Self {
            id: id.into(),
            value,
            bound,
            hook_id: None,
            description: String::new(),
            evidence_mark: 0,
        }
    }

    #[must_use]
    pub fn for_hook(mut self, hook_id: impl Into<String>) -> Self {
        self.hook_id = Some(hook_id.into());
        self
    }

    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Value after loosening by `fraction` of the current value.
    pub fn loosened(&self, fraction: f64) -> f64 {
        match self.bound {
            Bound::Upper => self.value * (1.0 + fraction),
            Bound::Lower => self.value * (1.0 - fraction),
        }
    }
}

/// All adjustable thresholds, keyed by parameter id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    #[serde(default)]
    pub parameters: BTreeMap<String, ThresholdParameter>,
}

impl ThresholdSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, parameter: ThresholdParameter) -> Self {
        self.insert(parameter);
        self
    }

    pub fn insert(&mut self, parameter: ThresholdParameter) {
        self.parameters.insert(parameter.id.clone(), parameter);
    }

    pub fn get(&self, id: &str) -> Option<&ThresholdParameter> {
        self.parameters.get(id)
    }

    /// Parameter bound to `hook_id`, if any.
    pub fn for_hook(&self, hook_id: &str) -> Option<&ThresholdParameter> {
        self.parameters
            .values()
            .find(|p| p.hook_id.as_deref() == Some(hook_id))
    }

    /// Overwrite a value. Returns the previous value.
    pub fn set(&mut self, id: &str, value: f64) -> Option<f64> {
        self.parameters
            .get_mut(id)
            .map(|p| std::mem::replace(&mut p.value, value))
    }

    /// Overwrite a value and record the evidence it was based on.
    pub fn adjust(&mut self, id: &str, value: f64, evidence_mark: u64) -> Option<f64> {
        self.parameters.get_mut(id).map(|p| {
            p.evidence_mark = evidence_mark;
            std::mem::replace(&mut p.value, value)
        })
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Outcome of checking a proposed change against the drift cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DriftCheck {
    WithinCap { ratio: f64 },
    Exceeded { ratio: Option<f64>, cap: f64 },
}

impl DriftCheck {
    /// `|new - old| / |old|` against `cap`. A zero or non-finite baseline
    /// has no defined ratio and never passes.
    pub fn evaluate(old: f64, new: f64, cap: f64) -> Self {
        if !old.is_finite() || !new.is_finite() || old == 0.0 {
            return Self::Exceeded { ratio: None, cap };
        }
        let ratio = (new - old).abs() / old.abs();
        if ratio <= cap {
            Self::WithinCap { ratio }
        } else {
            Self::Exceeded {
                ratio: Some(ratio),
                cap,
            }
        }
    }

    pub const fn is_within_cap(&self) -> bool {
        matches!(self, Self::WithinCap { .. })
    }
}

/// Thresholds for the default manuscript hooks.
pub fn default_thresholds() -> ThresholdSet {
    ThresholdSet::new()
        .with(
            ThresholdParameter::new("hook.sentence_length.max_words", 30.0, Bound::Upper)
                .for_hook("sentence-length")
                .described("Longest sentence accepted before the hook fires"),
        )
        .with(
            ThresholdParameter::new("hook.paragraph_length.max_sentences", 8.0, Bound::Upper)
                .for_hook("paragraph-length"),
        )
        .with(
            ThresholdParameter::new("hook.passive_voice.max_ratio", 0.25, Bound::Upper)
                .for_hook("passive-voice"),
        )
        .with(
            ThresholdParameter::new("hook.hedging.max_per_page", 3.0, Bound::Upper)
                .for_hook("hedging"),
        )
        .with(
            ThresholdParameter::new("hook.citation_density.min_per_section", 2.0, Bound::Lower)
                .for_hook("citation-density")
                .described("Fewest citations a body section may carry"),
        )
}

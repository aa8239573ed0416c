//! Structured rule set: constraints, predicates and content summaries.
//!
//! A constraint couples a human-readable description with a machine-checkable
//! [`Predicate`] evaluated against a [`ContentSummary`] the external agent
//! hands in. The description documents the rule; the predicate enforces it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordinal rank of a constraint. `Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Where a constraint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Seeded at deployment; permanent
    Base,
    /// Added later by the adjustment engine
    Learned,
}

/// Machine-checkable condition over a content summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    MetricAtMost { metric: String, max: f64 },
    MetricAtLeast { metric: String, min: f64 },
    MetricInRange { metric: String, min: f64, max: f64 },
    FlagAbsent { flag: String },
    FlagPresent { flag: String },
}

impl Predicate {
    /// Evaluate against a summary. `None` means satisfied; `Some(detail)`
    /// describes the violation. Missing metrics fail closed.
    pub fn evaluate(&self, summary: &ContentSummary) -> Option<String> {
        match self {
            Self::MetricAtMost { metric, max } => match summary.metric(metric) {
                None => Some(format!("metric '{metric}' missing from summary")),
                Some(v) if v > *max => Some(format!("{metric} = {v} exceeds maximum {max}")),
                Some(_) => None,
            },
            Self::MetricAtLeast { metric, min } => match summary.metric(metric) {
                None => Some(format!("metric '{metric}' missing from summary")),
                Some(v) if v < *min => Some(format!("{metric} = {v} below minimum {min}")),
                Some(_) => None,
            },
            Self::MetricInRange { metric, min, max } => match summary.metric(metric) {
                None => Some(format!("metric '{metric}' missing from summary")),
                Some(v) if v < *min || v > *max => {
                    Some(format!("{metric} = {v} outside [{min}, {max}]"))
                }
                Some(_) => None,
            },
            Self::FlagAbsent { flag } => summary
                .has_flag(flag)
                .then(|| format!("flag '{flag}' is present")),
            Self::FlagPresent { flag } => (!summary.has_flag(flag))
                .then(|| format!("flag '{flag}' is absent")),
        }
    }

    /// The metric this predicate reads, if any.
    pub fn metric(&self) -> Option<&str> {
        match self {
            Self::MetricAtMost { metric, .. }
            | Self::MetricAtLeast { metric, .. }
            | Self::MetricInRange { metric, .. } => Some(metric),
            Self::FlagAbsent { .. } | Self::FlagPresent { .. } => None,
        }
    }
}

/// A rule with a severity level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    /// Human-readable statement of the rule
    #[serde(default)]
    pub description: String,
    pub predicate: Predicate,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
    /// Set when a learned rule raised this constraint's severity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalated_at: Option<DateTime<Utc>>,
}

impl Constraint {
    pub fn base(
        id: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        predicate: Predicate,
    ) -> Self {
        Self::with_origin(id, category, severity, description, predicate, Origin::Base)
    }

    pub fn learned(
        id: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        predicate: Predicate,
    ) -> Self {
        Self::with_origin(id, category, severity, description, predicate, Origin::Learned)
    }

    fn with_origin(
        id: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        predicate: Predicate,
        origin: Origin,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            severity,
            description: description.into(),
            predicate,
            origin,
            created_at: Utc::now(),
            escalated_at: None,
        }
    }

    pub fn is_base(&self) -> bool {
        self.origin == Origin::Base
    }
}

/// Structured signals about an artifact, produced outside the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSummary {
    /// Section or artifact the summary describes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub metrics: BTreeMap<String, f64>,
    pub flags: BTreeSet<String>,
}

impl ContentSummary {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    #[must_use]
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Set `score.<dimension>` for every score in `scores`, replacing earlier values.
    #[must_use]
    pub fn with_scores<'a>(mut self, scores: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        for (dimension, score) in scores {
            self.metrics.insert(score_metric(dimension), score);
        }
        self
    }
}

/// Summary metric carrying a dimension's latest round score.
pub fn score_metric(dimension: &str) -> String {
    format!("score.{dimension}")
}

/// A failed constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub constraint_id: String,
    pub severity: Severity,
    pub category: String,
    pub detail: String,
}

/// A requested mutation of the constraint set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ConstraintChange {
    Add(Constraint),
    RaiseSeverity { id: String, severity: Severity },
    LowerSeverity { id: String, severity: Severity },
    Remove { id: String },
}

impl ConstraintChange {
    pub fn target(&self) -> &str {
        match self {
            Self::Add(c) => &c.id,
            Self::RaiseSeverity { id, .. }
            | Self::LowerSeverity { id, .. }
            | Self::Remove { id } => id,
        }
    }
}

/// Base rule set for manuscript production.
pub fn default_base_constraints() -> Vec<Constraint> {
    vec![
        Constraint::base(
            "CIT-01",
            "citations",
            Severity::Critical,
            "Every cited source must resolve to verified bibliographic metadata",
            Predicate::MetricAtMost {
                metric: "citations.unverified".to_string(),
                max: 0.0,
            },
        ),
        Constraint::base(
            "CIT-02",
            "citations",
            Severity::Critical,
            "No fabricated references",
            Predicate::FlagAbsent {
                flag: "fabricated_reference".to_string(),
            },
        ),
        Constraint::base(
            "EVD-01",
            "evidence",
            Severity::Warning,
            "Claims should carry supporting evidence",
            Predicate::MetricAtMost {
                metric: "evidence.unsupported_claims".to_string(),
                max: 2.0,
            },
        ),
        Constraint::base(
            "CLR-01",
            "clarity",
            Severity::Warning,
            "Average sentence length stays readable",
            Predicate::MetricInRange {
                metric: "clarity.avg_sentence_words".to_string(),
                min: 10.0,
                max: 30.0,
            },
        ),
        Constraint::base(
            "STR-01",
            "structure",
            Severity::Warning,
            "Sections stay within a reasonable size imbalance",
            Predicate::MetricAtMost {
                metric: "structure.section_imbalance".to_string(),
                max: 0.5,
            },
        ),
        Constraint::base(
            "ORG-01",
            "originality",
            Severity::Critical,
            "No passages flagged as suspected plagiarism",
            Predicate::FlagAbsent {
                flag: "plagiarism_suspected".to_string(),
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Warning < Severity::Critical);
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"CRITICAL\""
        );
        assert_eq!("warning".parse::<Severity>(), Ok(Severity::Warning));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_metric_predicates() {
        let summary = ContentSummary::new().with_metric("words", 120.0);

        let at_most = Predicate::MetricAtMost {
            metric: "words".to_string(),
            max: 100.0,
        };
        assert!(at_most.evaluate(&summary).unwrap().contains("exceeds"));

        let at_least = Predicate::MetricAtLeast {
            metric: "words".to_string(),
            min: 100.0,
        };
        assert!(at_least.evaluate(&summary).is_none());

        let range = Predicate::MetricInRange {
            metric: "words".to_string(),
            min: 0.0,
            max: 120.0,
        };
        assert!(range.evaluate(&summary).is_none());
    }

    #[test]
    fn test_missing_metric_fails_closed() {
        let predicate = Predicate::MetricAtMost {
            metric: "citations.unverified".to_string(),
            max: 0.0,
        };
        let detail = predicate.evaluate(&ContentSummary::new()).unwrap();
        assert!(detail.contains("missing"));
    }

    #[test]
    fn test_flag_predicates() {
        let summary = ContentSummary::new().with_flag("fabricated_reference");
        let absent = Predicate::FlagAbsent {
            flag: "fabricated_reference".to_string(),
        };
        let present = Predicate::FlagPresent {
            flag: "abstract_written".to_string(),
        };
        assert!(absent.evaluate(&summary).is_some());
        assert!(present.evaluate(&summary).is_some());
        assert!(present
            .evaluate(&summary.clone().with_flag("abstract_written"))
            .is_none());
    }

    #[test]
    fn test_predicate_serde_shape() {
        let predicate = Predicate::FlagAbsent {
            flag: "x".to_string(),
        };
        let json = serde_json::to_value(&predicate).unwrap();
        assert_eq!(json["kind"], "flag_absent");
        let back: Predicate = serde_json::from_value(json).unwrap();
        assert_eq!(back, predicate);
    }

    #[test]
    fn test_default_base_constraints_are_base() {
        let base = default_base_constraints();
        assert!(base.iter().all(Constraint::is_base));
        let ids: BTreeSet<_> = base.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), base.len(), "ids must be unique");
    }
}

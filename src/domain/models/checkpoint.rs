//! Pipeline checkpoint state.
//!
//! Stored as a single JSON document and overwritten (never appended) on each
//! successful phase completion.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::constraint::Severity;
use super::phase::PhaseIndex;

/// Where the pipeline currently is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Run this checkpoint belongs to
    #[serde(default)]
    pub run_id: String,

    /// Highest phase completed so far; `None` before the first phase completes
    pub last_completed_phase: Option<PhaseIndex>,

    /// Section the agent is currently working on
    #[serde(default)]
    pub current_section: Option<String>,

    /// Outputs recorded per phase
    #[serde(default)]
    pub phase_outputs: BTreeMap<PhaseIndex, PhaseOutput>,

    /// Issues raised by reviewers
    #[serde(default)]
    pub flagged_issues: Vec<Issue>,

    pub timestamp: DateTime<Utc>,
}

impl CheckpointState {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            last_completed_phase: None,
            current_section: None,
            phase_outputs: BTreeMap::new(),
            flagged_issues: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Phase the pipeline is working on (the one after the last completed).
    pub fn current_phase(&self) -> PhaseIndex {
        self.last_completed_phase.map_or(0, |p| p + 1)
    }

    /// Record an artifact produced during `phase`.
    pub fn record_artifact(&mut self, phase: PhaseIndex, artifact: impl Into<String>) {
        let artifact = artifact.into();
        let output = self.phase_outputs.entry(phase).or_default();
        if !output.artifacts.contains(&artifact) {
            output.artifacts.push(artifact);
        }
        self.touch();
    }

    /// Replace the opaque summary for `phase`.
    pub fn record_summary(&mut self, phase: PhaseIndex, summary: serde_json::Value) {
        self.phase_outputs.entry(phase).or_default().summary = summary;
        self.touch();
    }

    pub fn has_artifact(&self, phase: PhaseIndex, artifact: &str) -> bool {
        self.phase_outputs
            .get(&phase)
            .is_some_and(|o| o.artifacts.iter().any(|a| a == artifact))
    }

    pub fn flag_issue(&mut self, issue: Issue) {
        self.flagged_issues.push(issue);
        self.touch();
    }

    /// Mark an issue resolved. Returns false if no such issue exists.
    pub fn resolve_issue(&mut self, issue_id: &str) -> bool {
        let Some(issue) = self.flagged_issues.iter_mut().find(|i| i.id == issue_id) else {
            return false;
        };
        issue.resolved = true;
        self.touch();
        true
    }

    /// Unresolved critical issues flagged against `phase`.
    pub fn unresolved_critical(&self, phase: PhaseIndex) -> impl Iterator<Item = &Issue> {
        self.flagged_issues
            .iter()
            .filter(move |i| i.phase == phase && !i.resolved && i.severity == Severity::Critical)
    }

    fn touch(&mut self) {
        self.timestamp = Utc::now();
    }
}

/// Output of one phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseOutput {
    /// Opaque summary supplied by the agent
    pub summary: serde_json::Value,
    /// Artifacts produced, as paths relative to the artifact root
    pub artifacts: Vec<String>,
}

/// Reviewer-raised issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub phase: PhaseIndex,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_id: Option<String>,
    #[serde(default)]
    pub resolved: bool,
}

impl Issue {
    pub fn new(
        id: impl Into<String>,
        phase: PhaseIndex,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            phase,
            severity,
            description: description.into(),
            constraint_id: None,
            resolved: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_phase() {
        let mut state = CheckpointState::new("run-1");
        assert_eq!(state.current_phase(), 0);
        state.last_completed_phase = Some(4);
        assert_eq!(state.current_phase(), 5);
    }

    #[test]
    fn test_record_artifact_is_idempotent() {
        let mut state = CheckpointState::new("run-1");
        state.record_artifact(2, "outline.md");
        state.record_artifact(2, "outline.md");
        assert_eq!(state.phase_outputs[&2].artifacts, vec!["outline.md".to_string()]);
        assert!(state.has_artifact(2, "outline.md"));
        assert!(!state.has_artifact(3, "outline.md"));
    }

    #[test]
    fn test_unresolved_critical_issues() {
        let mut state = CheckpointState::new("run-1");
        state.flag_issue(Issue::new("i1", 5, Severity::Critical, "fabricated source"));
        state.flag_issue(Issue::new("i2", 5, Severity::Warning, "long sentence"));
        state.flag_issue(Issue::new("i3", 4, Severity::Critical, "other phase"));

        assert_eq!(state.unresolved_critical(5).count(), 1);
        assert!(state.resolve_issue("i1"));
        assert_eq!(state.unresolved_critical(5).count(), 0);
        assert!(!state.resolve_issue("missing"));
    }

    #[test]
    fn test_serde_roundtrip_with_integer_keys() {
        let mut state = CheckpointState::new("run-1");
        state.last_completed_phase = Some(1);
        state.current_section = Some("methods".to_string());
        state.record_artifact(1, "research/notes.md");
        state.record_summary(1, serde_json::json!({"sources": 14}));

        let json = serde_json::to_string(&state).unwrap();
        let back: CheckpointState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_older_documents_without_added_fields_load() {
        let json = r#"{"last_completed_phase":null,"timestamp":"2026-01-01T00:00:00Z"}"#;
        let state: CheckpointState = serde_json::from_str(json).unwrap();
        assert!(state.run_id.is_empty());
        assert!(state.phase_outputs.is_empty());
    }
}

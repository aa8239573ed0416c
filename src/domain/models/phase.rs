//! Pipeline phase definitions.
//!
//! Phases are immutable definition data. A [`PhasePlan`] is the validated,
//! totally ordered list the gate walks: indices are contiguous from 0 and the
//! last phase is the only terminal one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::error::PlanError;

/// Ordinal position of a phase in the pipeline.
pub type PhaseIndex = u32;

/// One step of the document-production pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinePhase {
    /// Ordinal position (0-based)
    pub index: PhaseIndex,

    /// Phase name
    pub name: String,

    /// Artifacts that must exist before the pipeline may leave this phase
    #[serde(default)]
    pub required_artifacts: Vec<String>,

    /// Whether this is the final phase
    #[serde(default)]
    pub terminal: bool,

    /// Whether leaving this phase also requires quality and constraint checks
    #[serde(default)]
    pub quality_sensitive: bool,
}

impl PipelinePhase {
    pub fn new(index: PhaseIndex, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            required_artifacts: Vec::new(),
            terminal: false,
            quality_sensitive: false,
        }
    }

    #[must_use]
    pub fn requires(mut self, artifact: impl Into<String>) -> Self {
        self.required_artifacts.push(artifact.into());
        self
    }

    #[must_use]
    pub fn quality_sensitive(mut self) -> Self {
        self.quality_sensitive = true;
        self
    }

    #[must_use]
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// Validated, ordered set of phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    phases: Vec<PipelinePhase>,
}

impl PhasePlan {
    pub fn new(phases: Vec<PipelinePhase>) -> Result<Self, PlanError> {
        if phases.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut names = HashSet::new();
        for (position, phase) in phases.iter().enumerate() {
            if phase.index as usize != position {
                return Err(PlanError::NonContiguous {
                    position,
                    index: phase.index,
                });
            }
            if !names.insert(phase.name.as_str()) {
                return Err(PlanError::DuplicateName(phase.name.clone()));
            }
        }

        let terminal_count = phases.iter().filter(|p| p.terminal).count();
        let last_is_terminal = phases.last().is_some_and(|p| p.terminal);
        if terminal_count != 1 || !last_is_terminal {
            return Err(PlanError::TerminalPlacement);
        }

        Ok(Self { phases })
    }

    /// The built-in document-production pipeline.
    pub fn document_pipeline() -> Self {
        Self {
            phases: default_document_phases(),
        }
    }

    pub fn phase(&self, index: PhaseIndex) -> Option<&PipelinePhase> {
        self.phases.get(index as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&PipelinePhase> {
        self.phases.iter().find(|p| p.name == name)
    }

    pub fn next(&self, index: PhaseIndex) -> Option<&PipelinePhase> {
        self.phase(index.checked_add(1)?)
    }

    pub fn terminal_phase(&self) -> &PipelinePhase {
        // Non-empty and terminal-last are guaranteed by construction.
        &self.phases[self.phases.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PipelinePhase> {
        self.phases.iter()
    }

    pub fn phases(&self) -> &[PipelinePhase] {
        &self.phases
    }
}

impl Default for PhasePlan {
    fn default() -> Self {
        Self::document_pipeline()
    }
}

/// Phases of the default manuscript workflow.
pub fn default_document_phases() -> Vec<PipelinePhase> {
    vec![
        PipelinePhase::new(0, "scoping").requires("brief.md"),
        PipelinePhase::new(1, "literature_review")
            .requires("research/sources.json")
            .requires("research/notes.md"),
        PipelinePhase::new(2, "outline").requires("outline.md"),
        PipelinePhase::new(3, "drafting").requires("draft/manuscript.md"),
        PipelinePhase::new(4, "peer_review").requires("review/report.md"),
        PipelinePhase::new(5, "revision")
            .requires("review/response.md")
            .quality_sensitive(),
        PipelinePhase::new(6, "final_audit")
            .requires("final/manuscript.md")
            .requires("final/references.bib")
            .quality_sensitive(),
        PipelinePhase::new(7, "retrospective").terminal(),
    ]
}

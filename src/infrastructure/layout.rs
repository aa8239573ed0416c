//! On-disk layout of a Quire data directory.
//!
//! ```text
//! <data_dir>/
//!   checkpoint.json
//!   hooks.jsonl          hook events from every run
//!   constraints.json
//!   thresholds.json
//!   runs/<run_id>/
//!     scores.jsonl
//!     evolution.jsonl
//! ```

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checkpoint(&self) -> PathBuf {
        self.root.join("checkpoint.json")
    }

    pub fn hook_ledger(&self) -> PathBuf {
        self.root.join("hooks.jsonl")
    }

    pub fn constraints(&self) -> PathBuf {
        self.root.join("constraints.json")
    }

    pub fn thresholds(&self) -> PathBuf {
        self.root.join("thresholds.json")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(run_id)
    }

    pub fn score_log(&self, run_id: &str) -> PathBuf {
        run_files(&self.run_dir(run_id)).0
    }

    pub fn evolution_log(&self, run_id: &str) -> PathBuf {
        run_files(&self.run_dir(run_id)).1
    }
}

/// Score log and evolution log inside a run directory.
pub fn run_files(run_dir: &Path) -> (PathBuf, PathBuf) {
    (run_dir.join("scores.jsonl"), run_dir.join("evolution.jsonl"))
}

//! Structured rule set with non-regression guarantees.
//!
//! Constraints are only ever added or made stricter. Severity never goes
//! down, ids never disappear, and base constraints cannot be weakened by
//! learned ones.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::domain::error::{ConstraintError, StorageError};
use crate::domain::models::constraint::{
    Constraint, ConstraintChange, ContentSummary, Origin, Severity, Violation,
};
use crate::infrastructure::persistence::{JsonDocument, LoadOutcome, WriteRetry};

/// Persisted form of the rule set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConstraintDocument {
    #[serde(default)]
    constraints: Vec<Constraint>,
}

/// Effect of an accepted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// A new constraint was added
    Added,
    /// An existing constraint's severity was raised
    Escalated { from: Severity, to: Severity },
    /// The change matched the current state exactly
    Unchanged,
}

struct StoreState {
    document: JsonDocument<ConstraintDocument>,
    constraints: BTreeMap<String, Constraint>,
}

/// Cloneable handle to the constraint set.
#[derive(Clone)]
pub struct ConstraintStore {
    inner: Arc<RwLock<StoreState>>,
}

impl ConstraintStore {
    /// Open the rule set at `path`, seeding `base` on first use and
    /// restoring any base constraint missing from an existing set.
    pub async fn open(
        path: impl Into<PathBuf>,
        retry: WriteRetry,
        base: Vec<Constraint>,
    ) -> Result<Self, ConstraintError> {
        let document: JsonDocument<ConstraintDocument> = JsonDocument::new(path, retry);
        let mut constraints: BTreeMap<String, Constraint> = match document.load().await? {
            LoadOutcome::Loaded(doc) => doc
                .constraints
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            LoadOutcome::NotFound => BTreeMap::new(),
            LoadOutcome::Corrupt { reason } => {
                return Err(StorageError::Corrupt {
                    path: document.path().to_path_buf(),
                    reason,
                }
                .into())
            }
        };

        let mut seeded = 0;
        for constraint in base {
            if !constraints.contains_key(&constraint.id) {
                constraints.insert(constraint.id.clone(), constraint);
                seeded += 1;
            }
        }
        if seeded > 0 {
            document.save(&to_document(&constraints)).await?;
            info!(seeded, total = constraints.len(), "base constraints seeded");
        }

        Ok(Self {
            inner: Arc::new(RwLock::new(StoreState {
                document,
                constraints,
            })),
        })
    }

    /// Check `summary` against every constraint. Violations are ordered by
    /// constraint id; the result depends only on the summary and the set.
    pub async fn validate(&self, summary: &ContentSummary) -> Vec<Violation> {
        let state = self.inner.read().await;
        let violations: Vec<Violation> = state
            .constraints
            .values()
            .filter_map(|c| {
                c.predicate.evaluate(summary).map(|detail| Violation {
                    constraint_id: c.id.clone(),
                    severity: c.severity,
                    category: c.category.clone(),
                    detail,
                })
            })
            .collect();
        debug!(
            section = ?summary.section,
            violations = violations.len(),
            "summary validated"
        );
        violations
    }

    /// Add a learned constraint, or escalate an existing one.
    #[instrument(skip(self, constraint), fields(id = %constraint.id, severity = %constraint.severity))]
    pub async fn add_learned(&self, constraint: Constraint) -> Result<ChangeOutcome, ConstraintError> {
        if constraint.id.trim().is_empty() {
            return Err(ConstraintError::Invalid("constraint id cannot be empty".to_string()));
        }
        if constraint.origin != Origin::Learned {
            return Err(ConstraintError::Invalid(format!(
                "'{}' is not a learned constraint",
                constraint.id
            )));
        }

        let mut state = self.inner.write().await;
        let outcome = match state.constraints.get(&constraint.id) {
            None => ChangeOutcome::Added,
            Some(existing) => {
                if existing.origin == Origin::Learned && existing.predicate != constraint.predicate {
                    return Err(reject(&constraint.id, "predicate of a learned constraint cannot change"));
                }
                if existing.is_base() && constraint.severity <= existing.severity {
                    return Err(reject(
                        &constraint.id,
                        &format!(
                            "learned {} cannot shadow base constraint at {}",
                            constraint.severity, existing.severity
                        ),
                    ));
                }
                escalation(existing, constraint.severity)?
            }
        };

        let mut next = state.constraints.clone();
        match outcome {
            ChangeOutcome::Added => {
                next.insert(constraint.id.clone(), constraint);
            }
            ChangeOutcome::Escalated { to, .. } => raise(&mut next, &constraint.id, to),
            ChangeOutcome::Unchanged => return Ok(outcome),
        }
        commit(&mut state, next).await?;
        info!(outcome = ?outcome, "constraint set updated");
        Ok(outcome)
    }

    /// Apply a requested change. Lowering severity and removal are always rejected.
    pub async fn apply(&self, change: ConstraintChange) -> Result<ChangeOutcome, ConstraintError> {
        match change {
            ConstraintChange::Add(constraint) => self.add_learned(constraint).await,
            ConstraintChange::RaiseSeverity { id, severity } => self.raise_severity(&id, severity).await,
            ConstraintChange::LowerSeverity { id, .. } => {
                Err(reject(&id, "severity may never decrease"))
            }
            ConstraintChange::Remove { id } => Err(reject(&id, "constraints are never removed")),
        }
    }

    async fn raise_severity(&self, id: &str, severity: Severity) -> Result<ChangeOutcome, ConstraintError> {
        let mut state = self.inner.write().await;
        let existing = state
            .constraints
            .get(id)
            .ok_or_else(|| ConstraintError::Invalid(format!("unknown constraint '{id}'")))?;
        let outcome = escalation(existing, severity)?;
        if let ChangeOutcome::Escalated { to, .. } = outcome {
            let mut next = state.constraints.clone();
            raise(&mut next, id, to);
            commit(&mut state, next).await?;
            info!(id, severity = %to, "constraint escalated");
        }
        Ok(outcome)
    }

    pub async fn get(&self, id: &str) -> Option<Constraint> {
        self.inner.read().await.constraints.get(id).cloned()
    }

    /// All constraints ordered by id.
    pub async fn list(&self) -> Vec<Constraint> {
        self.inner.read().await.constraints.values().cloned().collect()
    }

    /// Constraints whose category is `category`.
    pub async fn by_category(&self, category: &str) -> Vec<Constraint> {
        self.inner
            .read()
            .await
            .constraints
            .values()
            .filter(|c| c.category == category)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.constraints.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn reject(id: &str, reason: &str) -> ConstraintError {
    warn!(id, reason, "constraint change rejected");
    ConstraintError::Regression {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

/// How `existing` would change if set to `requested`.
fn escalation(existing: &Constraint, requested: Severity) -> Result<ChangeOutcome, ConstraintError> {
    match requested.cmp(&existing.severity) {
        std::cmp::Ordering::Less => {
            let what = if existing.is_base() { "base" } else { "learned" };
            Err(reject(
                &existing.id,
                &format!(
                    "{requested} would override {what} constraint at lower severity than {}",
                    existing.severity
                ),
            ))
        }
        std::cmp::Ordering::Equal => Ok(ChangeOutcome::Unchanged),
        std::cmp::Ordering::Greater => Ok(ChangeOutcome::Escalated {
            from: existing.severity,
            to: requested,
        }),
    }
}

fn raise(constraints: &mut BTreeMap<String, Constraint>, id: &str, to: Severity) {
    if let Some(c) = constraints.get_mut(id) {
        c.severity = to;
        c.escalated_at = Some(Utc::now());
    }
}

/// Persist `next` and make it current. On failure the in-memory set is unchanged.
async fn commit(state: &mut StoreState, next: BTreeMap<String, Constraint>) -> Result<(), StorageError> {
    state.document.save(&to_document(&next)).await?;
    state.constraints = next;
    Ok(())
}

fn to_document(constraints: &BTreeMap<String, Constraint>) -> ConstraintDocument {
    ConstraintDocument {
        constraints: constraints.values().cloned().collect(),
    }
}

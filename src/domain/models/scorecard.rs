//! Quality scorecard domain models
//!
//! Scores are per (round, dimension) on a 0–10 scale. Aggregation is a
//! weighted sum and requires a complete, normalised weight map.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::ScorecardError;

/// Lowest valid score
pub const MIN_SCORE: f64 = 0.0;
/// Highest valid score
pub const MAX_SCORE: f64 = 10.0;
/// Default cut-off below which a dimension is reported as weak
pub const DEFAULT_WEAK_THRESHOLD: f64 = 6.0;
/// Tolerance on the weight sum
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Dimension name → weight
pub type Weights = BTreeMap<String, f64>;

/// One score for one dimension in one evaluation round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub round: u32,
    pub dimension: String,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

impl ScoreRecord {
    /// Build a record, rejecting empty dimensions and scores outside [0, 10].
    pub fn new(round: u32, dimension: impl Into<String>, score: f64) -> Result<Self, ScorecardError> {
        let dimension = dimension.into();
        if dimension.trim().is_empty() {
            return Err(ScorecardError::EmptyDimension);
        }
        if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(ScorecardError::OutOfRange { dimension, score });
        }
        Ok(Self {
            round,
            dimension,
            score,
            timestamp: Utc::now(),
        })
    }
}

/// Check a weight map: finite, non-negative, summing to 1.0 ± [`WEIGHT_EPSILON`].
pub fn validate_weights(weights: &Weights) -> Result<(), ScorecardError> {
    if weights.is_empty() {
        return Err(ScorecardError::IncompleteWeights("weight map is empty".to_string()));
    }
    if let Some((dim, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
        return Err(ScorecardError::IncompleteWeights(format!(
            "weight for '{dim}' must be a non-negative number, got {w}"
        )));
    }
    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > WEIGHT_EPSILON {
        return Err(ScorecardError::IncompleteWeights(format!(
            "weights sum to {sum}, expected 1.0"
        )));
    }
    Ok(())
}

/// Weighted total of one round's scores.
pub fn weighted_total(
    round: u32,
    scores: &BTreeMap<String, ScoreRecord>,
    weights: &Weights,
) -> Result<f64, ScorecardError> {
    let unweighted: Vec<&str> = scores
        .keys()
        .filter(|d| !weights.contains_key(*d))
        .map(String::as_str)
        .collect();
    if !unweighted.is_empty() {
        return Err(ScorecardError::IncompleteWeights(format!(
            "no weight for scored dimension(s): {}",
            unweighted.join(", ")
        )));
    }
    validate_weights(weights)?;

    let missing: Vec<String> = weights
        .iter()
        .filter(|(d, w)| **w > 0.0 && !scores.contains_key(*d))
        .map(|(d, _)| d.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ScorecardError::RoundIncomplete { round, missing });
    }

    let total: f64 = scores
        .iter()
        .map(|(dim, record)| record.score * weights[dim])
        .sum();
    // Rounding in the weight sum can push a perfect score a hair past the scale.
    Ok(total.clamp(MIN_SCORE, MAX_SCORE))
}

/// Equal-weight mean of a round, used for trend reporting.
pub fn mean_score(scores: &BTreeMap<String, ScoreRecord>) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.values().map(|r| r.score).sum::<f64>() / scores.len() as f64)
}

/// Scores of one round keyed by dimension
pub type RoundScores = BTreeMap<String, ScoreRecord>;

/// Unweighted mean of one round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundMean {
    pub round: u32,
    pub mean: f64,
}

/// Score history folded last-write-wins per (round, dimension).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreHistory {
    rounds: BTreeMap<u32, RoundScores>,
}

impl ScoreHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = ScoreRecord>) -> Self {
        let mut history = Self::new();
        for record in records {
            history.insert(record);
        }
        history
    }

    /// Insert a record, replacing any earlier score for the same round and dimension.
    pub fn insert(&mut self, record: ScoreRecord) {
        self.rounds
            .entry(record.round)
            .or_default()
            .insert(record.dimension.clone(), record);
    }

    pub fn round(&self, round: u32) -> Option<&RoundScores> {
        self.rounds.get(&round)
    }

    /// Rounds with at least one score, ascending.
    pub fn rounds(&self) -> Vec<u32> {
        self.rounds.keys().copied().collect()
    }

    pub fn latest_round(&self) -> Option<u32> {
        self.rounds.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Weighted aggregate of `round`, in [0, 10].
    pub fn aggregate(&self, round: u32, weights: &Weights) -> Result<f64, ScorecardError> {
        let scores = self
            .rounds
            .get(&round)
            .ok_or(ScorecardError::RoundNotFound(round))?;
        weighted_total(round, scores, weights)
    }

    /// Dimensions of `round` scoring below `threshold`, weakest first.
    /// Unknown rounds have no weak dimensions.
    pub fn weak_dimensions(&self, round: u32, threshold: f64) -> Vec<ScoreRecord> {
        let Some(scores) = self.rounds.get(&round) else {
            return Vec::new();
        };
        let mut weak: Vec<ScoreRecord> = scores
            .values()
            .filter(|r| r.score < threshold)
            .cloned()
            .collect();
        weak.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| a.dimension.cmp(&b.dimension))
        });
        weak
    }

    /// Per-round unweighted means, ascending by round.
    pub fn trend(&self) -> Vec<RoundMean> {
        self.rounds
            .iter()
            .filter_map(|(round, scores)| {
                mean_score(scores).map(|mean| RoundMean {
                    round: *round,
                    mean,
                })
            })
            .collect()
    }
}

/// Default manuscript quality dimensions and their weights.
pub fn default_weights() -> Weights {
    [
        ("argument", 0.25),
        ("evidence", 0.20),
        ("structure", 0.15),
        ("clarity", 0.15),
        ("citations", 0.15),
        ("originality", 0.10),
    ]
    .into_iter()
    .map(|(d, w)| (d.to_string(), w))
    .collect()
}

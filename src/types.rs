//! Type definitions for the matching pipeline.
//!
//! This module contains the structured result returned by a matching run and
//! the explicit diagnostics channel that replaces warning side-channels:
//! advisory conditions are data on the result, inspected by the caller.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One row of the match matrix: a focal unit and its matched non-focal units
///
/// The `matches` vector always has exactly `ratio` slots, ordered nearest
/// first; unfilled slots are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRow {
    /// Label of the focal unit
    pub focal: String,
    /// Labels of the matched non-focal units, padded with `None`
    pub matches: Vec<Option<String>>,
}

impl MatchRow {
    /// Number of realized matches in this row
    #[must_use]
    pub fn realized(&self) -> usize {
        self.matches.iter().filter(|m| m.is_some()).count()
    }

    /// Whether this focal unit found no match at all
    #[must_use]
    pub fn is_unmatched(&self) -> bool {
        self.realized() == 0
    }
}

/// Result of the matching process
#[derive(Debug, Clone)]
pub struct MatchingResult {
    /// Labels of every input row, in input order (discarded units included)
    pub labels: Vec<String>,

    /// One row per non-discarded focal unit, in input order
    pub match_matrix: Vec<MatchRow>,

    /// Subclass label per input row, `None` for unmatched or discarded units.
    /// The whole channel is `None` when matching with replacement, where a
    /// non-focal unit may belong to several overlapping groups.
    pub subclass: Option<Vec<Option<u32>>>,

    /// Matching weight per input row: 1 for matched focal units, the sum of
    /// reciprocal partner counts for matched non-focal units, 0 otherwise
    pub weights: Vec<f64>,

    /// Number of focal units with at least one match
    pub matched_focal_count: usize,

    /// Number of distinct non-focal units used as matches
    pub matched_nonfocal_count: usize,

    /// Advisory warnings raised during the run
    pub diagnostics: Diagnostics,

    /// Diagnostic payload returned by the weight optimizer, if one ran
    pub optimizer: Option<OptimizerDiagnostics>,

    /// Time taken for matching
    pub matching_time: Duration,
}

impl MatchingResult {
    /// Weight for the unit with the given label, if the label exists
    #[must_use]
    pub fn weight_of(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.weights[i])
    }
}

/// Advisory warning raised during matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchWarning {
    /// Fewer eligible non-focal units than no-replacement matching needs;
    /// some focal units will end up with fewer than `ratio` matches
    Capacity { required: usize, available: usize },

    /// Warning re-surfaced verbatim from the external weight optimizer
    Optimizer(String),
}

impl std::fmt::Display for MatchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capacity {
                required,
                available,
            } => write!(
                f,
                "insufficient non-focal units for no-replacement matching: {required} needed, {available} available"
            ),
            Self::Optimizer(msg) => write!(f, "optimizer warning: {msg}"),
        }
    }
}

/// Collected advisory warnings for one matching run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Warnings in the order they were raised
    pub warnings: Vec<MatchWarning>,
}

impl Diagnostics {
    /// Record a warning, keeping at most one capacity advisory per run
    pub fn push(&mut self, warning: MatchWarning) {
        if matches!(warning, MatchWarning::Capacity { .. })
            && self
                .warnings
                .iter()
                .any(|w| matches!(w, MatchWarning::Capacity { .. }))
        {
            return;
        }
        self.warnings.push(warning);
    }

    /// Whether no warnings were raised
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Whether a capacity shortfall was recorded
    #[must_use]
    pub fn has_capacity_warning(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, MatchWarning::Capacity { .. }))
    }
}

/// Diagnostic payload from an external weight optimizer
///
/// The optimizer is a black box; beyond the two universal fields, anything it
/// wants to report travels in `details` as opaque JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerDiagnostics {
    /// Generations the search actually ran
    pub generations: usize,
    /// Fitness value of the returned weight matrix
    pub fitness: f64,
    /// Optimizer-specific payload
    pub details: Option<serde_json::Value>,
}

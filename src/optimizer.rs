//! Pluggable weight optimization
//!
//! The weight matrix can come from three places, resolved behind one seam:
//! an external optimizer implementing [`WeightOptimizer`], a fixed matrix
//! from the configuration, or the correlation-based fallback. The external
//! strategy is a black box invoked once, synchronously, before the search;
//! its failures are wrapped so the external origin stays visible, and its
//! capacity warnings are consolidated into a single advisory.

use crate::caliper::RawCaliper;
use crate::criteria::{Estimand, OptimizerConfig};
use crate::error::{MatchError, Result};
use crate::types::{MatchWarning, OptimizerDiagnostics};
use crate::unit_data::UnitData;
use crate::variables::MatchingVariables;
use crate::weights::{fallback_weight_matrix, matrix_from_rows, validate_weight_matrix};
use log::{debug, warn};
use nalgebra::DMatrix;

/// Everything an external optimizer may condition on
///
/// Rows of `balance` and entries of the per-unit slices are aligned with
/// the rows of the matching-variable matrix, in included-unit order.
#[derive(Debug)]
pub struct OptimizerRequest<'a> {
    /// Matching-variable matrix the weight matrix must align with
    pub variables: &'a MatchingVariables,
    /// Covariates (and score) whose balance the optimizer improves
    pub balance: &'a DMatrix<f64>,
    /// Focal-group membership per included unit
    pub focal: &'a [bool],
    /// Sampling weights per included unit
    pub sample_weights: Option<&'a [f64]>,
    /// Matches requested per focal unit
    pub ratio: usize,
    /// Whether non-focal units may be reused
    pub replace: bool,
    /// Exact-group label per included unit, when an exact constraint is set
    pub exact_groups: Option<&'a [u32]>,
    /// Calipers in raw units, aligned with matrix columns
    pub calipers: &'a [RawCaliper],
    /// Always [`Estimand::Att`]: an ATC run swaps the focal group upstream
    /// and the optimizer never sees the difference
    pub estimand: Estimand,
    /// Tuning record from the configuration
    pub config: &'a OptimizerConfig,
}

/// Advisory raised by an external optimizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizerWarning {
    /// Too few non-focal units to satisfy the requested ratio without
    /// replacement
    Capacity { required: usize, available: usize },
    /// Any other advisory, re-surfaced verbatim
    Other(String),
}

/// Successful result of an external optimization
#[derive(Debug, Clone)]
pub struct OptimizerOutcome {
    /// Weight matrix over the distance columns or over all columns of X
    pub weight_matrix: DMatrix<f64>,
    /// Advisories to surface to the caller
    pub warnings: Vec<OptimizerWarning>,
    /// Optional run report
    pub diagnostics: Option<OptimizerDiagnostics>,
}

/// External procedure producing a variable-weight matrix
///
/// Implementations may be stochastic and internally parallel; the core
/// only requires the returned matrix to be symmetric and usable as a
/// generalized distance metric.
pub trait WeightOptimizer {
    /// Produce a weight matrix for the given matching problem
    ///
    /// # Errors
    ///
    /// Any error aborts the matching run; it is wrapped in
    /// [`MatchError::Optimizer`] with the full cause chain preserved.
    fn optimize(&self, request: &OptimizerRequest<'_>) -> anyhow::Result<OptimizerOutcome>;
}

/// Weight matrix with the advisories and diagnostics of its resolution
#[derive(Debug, Clone)]
pub struct ResolvedWeights {
    /// Validated weight matrix covering every column of X
    pub matrix: DMatrix<f64>,
    /// Warnings to merge into the run diagnostics
    pub warnings: Vec<MatchWarning>,
    /// Optimizer run report, when an optimizer ran
    pub diagnostics: Option<OptimizerDiagnostics>,
}

/// Balance matrix handed to the optimizer: all covariates plus the score,
/// over included units in input order
#[must_use]
pub fn build_balance_matrix(data: &UnitData) -> DMatrix<f64> {
    let n = data.included.len();
    let k = data.columns.len() + usize::from(data.score.is_some());
    let mut values = Vec::with_capacity(n * k);
    for column in &data.columns {
        values.extend(data.included.iter().map(|&row| column.numeric_value(row)));
    }
    if let Some(score) = &data.score {
        values.extend(data.included.iter().map(|&row| score[row]));
    }
    DMatrix::from_vec(n, k, values)
}

/// Resolve the weight matrix for one run
///
/// Strategy order: external optimizer when attached, fixed configuration
/// matrix when supplied, correlation fallback otherwise. Whatever the
/// source, the matrix is validated and aligned with the columns of X.
///
/// # Errors
///
/// Returns [`MatchError::Optimizer`] when the external procedure fails and
/// [`MatchError::InvalidWeightMatrix`] when any source yields an unusable
/// matrix.
pub fn resolve_weight_matrix(
    optimizer: Option<&dyn WeightOptimizer>,
    request: &OptimizerRequest<'_>,
    fixed: Option<&[Vec<f64>]>,
) -> Result<ResolvedWeights> {
    if let Some(optimizer) = optimizer {
        debug!(
            "invoking external weight optimizer over {} variables, population {} x {} generations",
            request.variables.distance_cols.len(),
            request.config.population_size,
            request.config.max_generations,
        );
        let outcome = optimizer
            .optimize(request)
            .map_err(|e| MatchError::Optimizer(format!("{e:#}")))?;
        let matrix = validate_weight_matrix(outcome.weight_matrix, request.variables)?;
        let warnings = consolidate_warnings(outcome.warnings);
        return Ok(ResolvedWeights {
            matrix,
            warnings,
            diagnostics: outcome.diagnostics,
        });
    }

    let matrix = match fixed {
        Some(rows) => validate_weight_matrix(matrix_from_rows(rows)?, request.variables)?,
        None => fallback_weight_matrix(request.variables, request.sample_weights),
    };
    Ok(ResolvedWeights {
        matrix,
        warnings: Vec::new(),
        diagnostics: None,
    })
}

/// Collapse repeated capacity warnings into one advisory
fn consolidate_warnings(warnings: Vec<OptimizerWarning>) -> Vec<MatchWarning> {
    let mut out = Vec::new();
    let mut capacity_seen = 0_usize;
    for warning in warnings {
        match warning {
            OptimizerWarning::Capacity {
                required,
                available,
            } => {
                capacity_seen += 1;
                if capacity_seen == 1 {
                    out.push(MatchWarning::Capacity {
                        required,
                        available,
                    });
                }
            }
            OptimizerWarning::Other(message) => out.push(MatchWarning::Optimizer(message)),
        }
    }
    if capacity_seen > 1 {
        warn!("optimizer raised {capacity_seen} capacity warnings, surfacing one");
    }
    out
}

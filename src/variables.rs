//! Assembly of the matching-variable matrix
//!
//! The matrix X has one row per included unit (in input order) and one
//! column per matching variable. The base column set depends on the
//! configuration: all covariates plus the score, a caller-chosen covariate
//! subset without the score, or all covariates when no score exists. Exact
//! variables and caliper dimensions missing from the base set are appended
//! so that constraints can be evaluated against X; exact-only columns are
//! excluded from the distance metric.

use crate::criteria::{CaliperTarget, MatchingConfig};
use crate::error::{MatchError, Result};
use crate::unit_data::UnitData;
use nalgebra::DMatrix;

/// Name used for the score column of X
pub const SCORE_COLUMN: &str = "score";

/// Matching-variable matrix with column metadata
#[derive(Debug, Clone)]
pub struct MatchingVariables {
    /// Column names, aligned with matrix columns
    pub names: Vec<String>,
    /// One row per included unit, in input order
    pub matrix: DMatrix<f64>,
    /// Columns that participate in the generalized distance
    pub distance_cols: Vec<usize>,
    /// Column index of the score, when present in X
    pub score_col: Option<usize>,
}

impl MatchingVariables {
    /// Index of a column by name
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Number of rows (included units)
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of columns
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.matrix.ncols()
    }
}

struct PendingColumn {
    name: String,
    values: Vec<f64>,
    in_distance: bool,
}

/// Build the matching-variable matrix for one run
///
/// # Errors
///
/// Returns [`MatchError::UnknownCovariate`] when a requested covariate
/// subset names an undeclared column, and [`MatchError::NoCovariates`] when
/// the base column set comes out empty.
pub fn build_variables(data: &UnitData, config: &MatchingConfig) -> Result<MatchingVariables> {
    let mut pending: Vec<PendingColumn> = Vec::new();
    let mut score_col = None;

    let push_covariate = |pending: &mut Vec<PendingColumn>, index: usize, in_distance: bool| {
        let column = &data.columns[index];
        pending.push(PendingColumn {
            name: column.name.clone(),
            values: data
                .included
                .iter()
                .map(|&row| column.numeric_value(row))
                .collect(),
            in_distance,
        });
    };

    if let Some(mahvars) = &config.mahvars {
        // Custom subset: the named covariates only, score excluded.
        for name in mahvars {
            let index = data
                .column_index(name)
                .ok_or_else(|| MatchError::UnknownCovariate {
                    name: name.clone(),
                    context: "distance subset",
                })?;
            push_covariate(&mut pending, index, true);
        }
    } else {
        for index in 0..data.columns.len() {
            push_covariate(&mut pending, index, true);
        }
        if let Some(score) = &data.score {
            score_col = Some(pending.len());
            pending.push(PendingColumn {
                name: SCORE_COLUMN.to_string(),
                values: data.included.iter().map(|&row| score[row]).collect(),
                in_distance: true,
            });
        }
    }

    if pending.is_empty() {
        return Err(MatchError::NoCovariates);
    }

    // Exact variables must be visible in X for group construction, but they
    // carry no weight in the distance.
    for name in &config.exact {
        if pending.iter().any(|c| &c.name == name) {
            continue;
        }
        let index = data
            .column_index(name)
            .ok_or_else(|| MatchError::UnknownCovariate {
                name: name.clone(),
                context: "exact constraint",
            })?;
        push_covariate(&mut pending, index, false);
    }

    // Caliper dimensions are appended when absent; a dimension that cannot
    // be resolved here is reported by caliper normalization instead.
    let mut score_caliper = false;
    for caliper in &config.calipers {
        match &caliper.target {
            CaliperTarget::Covariate(name) => {
                if pending.iter().any(|c| &c.name == name) {
                    continue;
                }
                if let Some(index) = data.column_index(name) {
                    push_covariate(&mut pending, index, true);
                }
            }
            CaliperTarget::Score => score_caliper = true,
        }
    }
    if score_caliper && score_col.is_none() {
        if let Some(score) = &data.score {
            score_col = Some(pending.len());
            pending.push(PendingColumn {
                name: SCORE_COLUMN.to_string(),
                values: data.included.iter().map(|&row| score[row]).collect(),
                in_distance: true,
            });
        }
    }

    let n_rows = data.included.len();
    let n_cols = pending.len();
    let mut names = Vec::with_capacity(n_cols);
    let mut distance_cols = Vec::new();
    let mut values = Vec::with_capacity(n_rows * n_cols);
    for (index, column) in pending.into_iter().enumerate() {
        if column.in_distance {
            distance_cols.push(index);
        }
        names.push(column.name);
        values.extend(column.values);
    }

    Ok(MatchingVariables {
        names,
        matrix: DMatrix::from_vec(n_rows, n_cols, values),
        distance_cols,
        score_col,
    })
}

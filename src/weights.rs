//! Weight matrices for the generalized distance
//!
//! The distance between two units is d(i,j)^2 = (Xi - Xj)^T W (Xi - Xj).
//! W comes from an external optimizer, from a fixed matrix in the
//! configuration, or from the fallback built here: the Moore-Penrose
//! pseudo-inverse of the correlation matrix of the distance columns of X,
//! sample-weighted when sampling weights are supplied. All three sources
//! pass through the same validation and are embedded into a full-width
//! matrix aligned with every column of X, with zero weight on columns that
//! do not participate in the distance.

use crate::error::{MatchError, Result};
use crate::variables::MatchingVariables;
use nalgebra::{DMatrix, SymmetricEigen};

const SYMMETRY_TOLERANCE: f64 = 1e-8;

/// Correlation matrix of the selected columns of `x`
///
/// Uses the maximum-likelihood convention: weights are normalized to sum to
/// one and no small-sample correction is applied. Columns with zero
/// variance get a unit diagonal and zero correlation with every other
/// column. `sample_weights`, when given, is aligned with the rows of `x`
/// and must not sum to zero.
#[must_use]
pub fn weighted_correlation(
    x: &DMatrix<f64>,
    cols: &[usize],
    sample_weights: Option<&[f64]>,
) -> DMatrix<f64> {
    let n = x.nrows();
    let k = cols.len();

    let weights: Vec<f64> = match sample_weights {
        Some(raw) => {
            let total: f64 = raw.iter().sum();
            raw.iter().map(|w| w / total).collect()
        }
        None => vec![1.0 / n as f64; n],
    };

    let mut means = vec![0.0; k];
    for (j, &col) in cols.iter().enumerate() {
        means[j] = (0..n).map(|i| weights[i] * x[(i, col)]).sum();
    }

    let mut covariance = DMatrix::zeros(k, k);
    for a in 0..k {
        for b in a..k {
            let value: f64 = (0..n)
                .map(|i| {
                    weights[i] * (x[(i, cols[a])] - means[a]) * (x[(i, cols[b])] - means[b])
                })
                .sum();
            covariance[(a, b)] = value;
            covariance[(b, a)] = value;
        }
    }

    let sds: Vec<f64> = (0..k).map(|a| covariance[(a, a)].sqrt()).collect();
    let mut correlation = DMatrix::zeros(k, k);
    for a in 0..k {
        for b in 0..k {
            correlation[(a, b)] = if a == b {
                1.0
            } else if sds[a] > 0.0 && sds[b] > 0.0 {
                covariance[(a, b)] / (sds[a] * sds[b])
            } else {
                0.0
            };
        }
    }
    correlation
}

/// Moore-Penrose pseudo-inverse of a symmetric matrix
///
/// Eigenvalues below `n * eps * max|eigenvalue|` are treated as zero, which
/// makes the inverse well defined for rank-deficient correlation matrices.
#[must_use]
pub fn pseudo_inverse(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let n = matrix.nrows();
    let eigen = SymmetricEigen::new(matrix.clone());
    let max_abs = eigen
        .eigenvalues
        .iter()
        .fold(0.0_f64, |acc, &v| acc.max(v.abs()));
    let cutoff = n as f64 * f64::EPSILON * max_abs;

    let mut inverted = eigen.eigenvalues.clone();
    for value in inverted.iter_mut() {
        *value = if value.abs() > cutoff { 1.0 / *value } else { 0.0 };
    }

    let vectors = &eigen.eigenvectors;
    let result = vectors * DMatrix::from_diagonal(&inverted) * vectors.transpose();
    // Exact symmetry survives the round trip only up to rounding.
    0.5 * (&result + result.transpose())
}

/// Fallback weight matrix when no optimizer and no fixed matrix are set
#[must_use]
pub fn fallback_weight_matrix(
    variables: &MatchingVariables,
    sample_weights: Option<&[f64]>,
) -> DMatrix<f64> {
    let correlation =
        weighted_correlation(&variables.matrix, &variables.distance_cols, sample_weights);
    embed(&pseudo_inverse(&correlation), variables)
}

/// Convert a user-supplied matrix in row form
///
/// # Errors
///
/// Returns [`MatchError::InvalidWeightMatrix`] when the rows have uneven
/// lengths.
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n_cols {
            return Err(MatchError::InvalidWeightMatrix(format!(
                "row {i} has {} entries, expected {n_cols}",
                row.len()
            )));
        }
    }
    Ok(DMatrix::from_fn(n_rows, n_cols, |i, j| rows[i][j]))
}

/// Check a weight matrix and align it with the columns of X
///
/// Accepts either a matrix over the distance columns only, which is
/// embedded into a full-width matrix, or a matrix already covering every
/// column of X.
///
/// # Errors
///
/// Returns [`MatchError::InvalidWeightMatrix`] for a shape that fits
/// neither layout, a non-finite entry, or an asymmetric matrix.
pub fn validate_weight_matrix(
    matrix: DMatrix<f64>,
    variables: &MatchingVariables,
) -> Result<DMatrix<f64>> {
    let full = variables.n_cols();
    let distance = variables.distance_cols.len();

    let aligned = if matrix.nrows() == full && matrix.ncols() == full {
        matrix
    } else if matrix.nrows() == distance && matrix.ncols() == distance {
        embed(&matrix, variables)
    } else {
        return Err(MatchError::InvalidWeightMatrix(format!(
            "expected {distance}x{distance} or {full}x{full}, got {}x{}",
            matrix.nrows(),
            matrix.ncols()
        )));
    };

    for i in 0..full {
        for j in 0..full {
            let value = aligned[(i, j)];
            if !value.is_finite() {
                return Err(MatchError::InvalidWeightMatrix(format!(
                    "non-finite entry {value} at ({i}, {j})"
                )));
            }
            let mirrored = aligned[(j, i)];
            let scale = value.abs().max(mirrored.abs()).max(1.0);
            if (value - mirrored).abs() > SYMMETRY_TOLERANCE * scale {
                return Err(MatchError::InvalidWeightMatrix(format!(
                    "not symmetric at ({i}, {j}): {value} vs {mirrored}"
                )));
            }
        }
    }
    Ok(aligned)
}

/// Spread a distance-column matrix over the full column set of X
fn embed(matrix: &DMatrix<f64>, variables: &MatchingVariables) -> DMatrix<f64> {
    let full = variables.n_cols();
    let mut out = DMatrix::zeros(full, full);
    for (a, &col_a) in variables.distance_cols.iter().enumerate() {
        for (b, &col_b) in variables.distance_cols.iter().enumerate() {
            out[(col_a, col_b)] = matrix[(a, b)];
        }
    }
    out
}

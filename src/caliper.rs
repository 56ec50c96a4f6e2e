//! Conversion of calipers to raw units
//!
//! Standardized calipers are expressed in population standard deviations of
//! their dimension; the search applies them in raw units, so each one is
//! rescaled here against the columns of the matching-variable matrix. The
//! standard deviation is computed over included units only, with the
//! population convention (divide by n).

use crate::criteria::{Caliper, CaliperTarget};
use crate::error::{MatchError, Result};
use crate::variables::MatchingVariables;

/// Caliper resolved to a matrix column and a raw-unit width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCaliper {
    /// Column index into the matching-variable matrix
    pub column: usize,
    /// Maximum allowed absolute per-dimension difference, in raw units
    pub width: f64,
}

/// Resolve every caliper against X and convert widths to raw units
///
/// # Errors
///
/// Returns [`MatchError::UnknownCaliperDimension`] when a caliper names a
/// dimension that has no column in X, including a score caliper without a
/// score column.
pub fn normalize_calipers(
    calipers: &[Caliper],
    variables: &MatchingVariables,
) -> Result<Vec<RawCaliper>> {
    let mut raw = Vec::with_capacity(calipers.len());
    for caliper in calipers {
        let column = match &caliper.target {
            CaliperTarget::Score => variables.score_col,
            CaliperTarget::Covariate(name) => variables.column_index(name),
        }
        .ok_or_else(|| MatchError::UnknownCaliperDimension(caliper.target.name().to_string()))?;

        let width = if caliper.standardized {
            caliper.width * variables.matrix.column(column).variance().sqrt()
        } else {
            caliper.width
        };
        raw.push(RawCaliper { column, width });
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn variables_with(matrix: DMatrix<f64>, score_col: Option<usize>) -> MatchingVariables {
        let names = (0..matrix.ncols())
            .map(|c| {
                if Some(c) == score_col {
                    "score".to_string()
                } else {
                    format!("x{c}")
                }
            })
            .collect();
        let distance_cols = (0..matrix.ncols()).collect();
        MatchingVariables {
            names,
            matrix,
            distance_cols,
            score_col,
        }
    }

    #[test]
    fn test_standardized_width_scaled_by_population_sd() {
        // Column values 2, 4, 6, 8 have population sd sqrt(5).
        let vars = variables_with(DMatrix::from_vec(4, 1, vec![2.0, 4.0, 6.0, 8.0]), None);
        let raw = normalize_calipers(&[Caliper::covariate("x0", 2.0)], &vars).unwrap();

        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].column, 0);
        assert!((raw[0].width - 2.0 * 5.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_raw_width_passed_through() {
        let vars = variables_with(DMatrix::from_vec(3, 1, vec![1.0, 2.0, 3.0]), None);
        let raw = normalize_calipers(&[Caliper::covariate("x0", 0.5).raw()], &vars).unwrap();
        assert_eq!(raw[0].width, 0.5);
    }

    #[test]
    fn test_score_caliper_resolves_to_score_column() {
        let matrix = DMatrix::from_vec(2, 2, vec![1.0, 2.0, 0.3, 0.7]);
        let vars = variables_with(matrix, Some(1));
        let raw = normalize_calipers(&[Caliper::score(0.1).raw()], &vars).unwrap();
        assert_eq!(raw[0].column, 1);
    }

    #[test]
    fn test_score_caliper_without_score_column_rejected() {
        let vars = variables_with(DMatrix::from_vec(2, 1, vec![1.0, 2.0]), None);
        let err = normalize_calipers(&[Caliper::score(0.1)], &vars).unwrap_err();
        assert!(matches!(err, MatchError::UnknownCaliperDimension(dim) if dim == "score"));
    }

    #[test]
    fn test_unknown_dimension_rejected() {
        let vars = variables_with(DMatrix::from_vec(2, 1, vec![1.0, 2.0]), None);
        let err = normalize_calipers(&[Caliper::covariate("height", 1.0)], &vars).unwrap_err();
        assert!(matches!(err, MatchError::UnknownCaliperDimension(dim) if dim == "height"));
    }

    #[test]
    fn test_zero_variance_column_yields_zero_width() {
        let vars = variables_with(DMatrix::from_vec(3, 1, vec![5.0, 5.0, 5.0]), None);
        let raw = normalize_calipers(&[Caliper::covariate("x0", 2.0)], &vars).unwrap();
        assert_eq!(raw[0].width, 0.0);
    }
}

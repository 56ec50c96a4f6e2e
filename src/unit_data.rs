//! Extracted unit data in struct-of-arrays layout
//!
//! One entry per input row, aligned across all vectors. Rows flagged by the
//! discard column stay present so that result vectors keep input alignment,
//! but they are excluded from `included` and never enter the search.

use crate::criteria::Estimand;

/// Values of one covariate column across all units
#[derive(Debug, Clone)]
pub enum CovariateValues {
    /// Numeric column read as `f64`
    Numeric(Vec<f64>),
    /// Categorical column compressed to integer codes
    ///
    /// Codes index into `levels`; they are assigned in first-encounter order
    /// over the input rows.
    Categorical { codes: Vec<u32>, levels: Vec<String> },
}

/// One extracted covariate column
#[derive(Debug, Clone)]
pub struct CovariateColumn {
    /// Column name from the record batch
    pub name: String,
    /// Column values across all units
    pub values: CovariateValues,
}

impl CovariateColumn {
    /// Value of this column for `row` as `f64`
    ///
    /// Categorical columns yield their integer code, which makes an exact
    /// zero difference for equal levels and a nonzero one otherwise.
    #[must_use]
    pub fn numeric_value(&self, row: usize) -> f64 {
        match &self.values {
            CovariateValues::Numeric(values) => values[row],
            CovariateValues::Categorical { codes, .. } => f64::from(codes[row]),
        }
    }

    /// Hashable code of this column's value for `row`, for grouping
    ///
    /// Equal values always produce equal codes.
    pub(crate) fn value_code(&self, row: usize) -> u64 {
        match &self.values {
            CovariateValues::Numeric(values) => {
                // -0.0 and 0.0 compare equal, so they must code equal too.
                let value = values[row];
                let value = if value == 0.0 { 0.0 } else { value };
                value.to_bits()
            }
            CovariateValues::Categorical { codes, .. } => u64::from(codes[row]),
        }
    }
}

/// Extracted matching input, one slot per input row
#[derive(Debug, Clone)]
pub struct UnitData {
    /// Unit labels in input order
    pub labels: Vec<String>,
    /// Focal-group membership, estimand already applied
    pub focal: Vec<bool>,
    /// Units excluded from matching by the discard column
    pub discarded: Vec<bool>,
    /// Precomputed score, when a score column was declared
    pub score: Option<Vec<f64>>,
    /// Sampling weights, when a sample-weight column was declared
    pub sample_weights: Option<Vec<f64>>,
    /// Covariate columns in declaration order
    pub columns: Vec<CovariateColumn>,
    /// Row indices of non-discarded units, in input order
    pub included: Vec<usize>,
}

impl UnitData {
    /// Total number of input rows, including discarded ones
    #[must_use]
    pub fn n_units(&self) -> usize {
        self.labels.len()
    }

    /// Index of a covariate column by name
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Number of included focal units
    #[must_use]
    pub fn focal_included_count(&self) -> usize {
        self.included.iter().filter(|&&row| self.focal[row]).count()
    }

    /// Number of included non-focal units
    #[must_use]
    pub fn nonfocal_included_count(&self) -> usize {
        self.included
            .iter()
            .filter(|&&row| !self.focal[row])
            .count()
    }
}

/// Map a treatment value to focal-group membership under an estimand
///
/// Under ATT treated units are focal; under ATC the indicator is inverted
/// here, once, and no later stage needs to know which estimand was chosen.
#[must_use]
pub const fn focal_indicator(treated: bool, estimand: Estimand) -> bool {
    match estimand {
        Estimand::Att => treated,
        Estimand::Atc => !treated,
    }
}

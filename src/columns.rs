//! Column roles for the input record batch
//!
//! Matching input arrives as a single Arrow record batch; this module
//! declares which column plays which role. Every column used by the run is
//! named here once, and a name may carry only one role.

use crate::error::{MatchError, Result};
use rustc_hash::FxHashSet;

/// How a covariate column enters the matching matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovariateKind {
    /// Read as `f64` and used as-is
    Numeric,
    /// Distinct values are mapped to integer codes in first-encounter order
    Categorical,
}

/// Declared covariate column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CovariateSpec {
    /// Column name in the record batch
    pub name: String,
    /// Interpretation of the column values
    pub kind: CovariateKind,
}

/// Role assignment for the columns of the input record batch
///
/// Built with [`ColumnSpec::builder`], which rejects a name assigned to more
/// than one role at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column holding the unique unit label
    pub label: String,
    /// Column holding the binary treatment indicator
    pub treatment: String,
    /// Covariate columns in declaration order
    pub covariates: Vec<CovariateSpec>,
    /// Optional column holding a precomputed score
    pub score: Option<String>,
    /// Optional column flagging units excluded from matching
    pub discard: Option<String>,
    /// Optional column holding non-negative sampling weights
    pub sample_weight: Option<String>,
}

impl ColumnSpec {
    /// Create a new builder with the two mandatory roles assigned
    #[must_use]
    pub fn builder(label: impl Into<String>, treatment: impl Into<String>) -> ColumnSpecBuilder {
        ColumnSpecBuilder {
            label: label.into(),
            treatment: treatment.into(),
            covariates: Vec::new(),
            score: None,
            discard: None,
            sample_weight: None,
        }
    }

    /// Names of the declared covariate columns, in declaration order
    pub fn covariate_names(&self) -> impl Iterator<Item = &str> {
        self.covariates.iter().map(|c| c.name.as_str())
    }
}

/// Builder for [`ColumnSpec`]
#[derive(Debug, Clone)]
pub struct ColumnSpecBuilder {
    label: String,
    treatment: String,
    covariates: Vec<CovariateSpec>,
    score: Option<String>,
    discard: Option<String>,
    sample_weight: Option<String>,
}

impl ColumnSpecBuilder {
    /// Declare a numeric covariate column
    #[must_use]
    pub fn numeric(mut self, name: impl Into<String>) -> Self {
        self.covariates.push(CovariateSpec {
            name: name.into(),
            kind: CovariateKind::Numeric,
        });
        self
    }

    /// Declare a categorical covariate column
    #[must_use]
    pub fn categorical(mut self, name: impl Into<String>) -> Self {
        self.covariates.push(CovariateSpec {
            name: name.into(),
            kind: CovariateKind::Categorical,
        });
        self
    }

    /// Declare the score column
    #[must_use]
    pub fn score(mut self, name: impl Into<String>) -> Self {
        self.score = Some(name.into());
        self
    }

    /// Declare the discard-flag column
    #[must_use]
    pub fn discard(mut self, name: impl Into<String>) -> Self {
        self.discard = Some(name.into());
        self
    }

    /// Declare the sample-weight column
    #[must_use]
    pub fn sample_weight(mut self, name: impl Into<String>) -> Self {
        self.sample_weight = Some(name.into());
        self
    }

    /// Build the column specification
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::DuplicateColumn`] if any column name is assigned
    /// to more than one role, and [`MatchError::NoCovariates`] if no
    /// covariate column was declared.
    pub fn build(self) -> Result<ColumnSpec> {
        if self.covariates.is_empty() {
            return Err(MatchError::NoCovariates);
        }

        let mut seen = FxHashSet::default();
        let extras = [
            Some(&self.label),
            Some(&self.treatment),
            self.score.as_ref(),
            self.discard.as_ref(),
            self.sample_weight.as_ref(),
        ];
        let all_names = self
            .covariates
            .iter()
            .map(|c| &c.name)
            .chain(extras.into_iter().flatten());
        for name in all_names {
            if !seen.insert(name.as_str()) {
                return Err(MatchError::DuplicateColumn(name.clone()));
            }
        }

        Ok(ColumnSpec {
            label: self.label,
            treatment: self.treatment,
            covariates: self.covariates,
            score: self.score,
            discard: self.discard,
            sample_weight: self.sample_weight,
        })
    }
}

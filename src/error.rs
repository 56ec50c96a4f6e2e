//! Error handling for the matching pipeline.
//!
//! Fatal conditions are reported through [`MatchError`]; advisory conditions
//! (capacity shortfalls, optimizer warnings) travel on
//! [`crate::types::Diagnostics`] instead and never abort a run.

use thiserror::Error;

/// Specialized error type for the matching pipeline
#[derive(Debug, Error)]
pub enum MatchError {
    /// Matching ratio of zero
    #[error("matching ratio must be at least 1, got {0}")]
    InvalidRatio(usize),

    /// Optimizer tuning parameters outside their valid ranges
    #[error("invalid optimizer configuration: {0}")]
    InvalidOptimizerConfig(String),

    /// Caliper width that is negative or not finite
    #[error("caliper width for `{dimension}` must be finite and non-negative, got {width}")]
    InvalidCaliper { dimension: String, width: f64 },

    /// Caliper naming a dimension that is neither a matching column nor the score
    #[error("caliper references unknown dimension `{0}`")]
    UnknownCaliperDimension(String),

    /// Declared column missing from the input batch
    #[error("column `{0}` not found in the input batch")]
    UnknownColumn(String),

    /// Column present but with an Arrow type this role cannot read
    #[error("column `{column}` has unsupported type {data_type} for {role}")]
    ColumnType {
        column: String,
        role: &'static str,
        data_type: String,
    },

    /// Null in a column the matching pipeline requires to be complete
    #[error("column `{column}` contains a null value at row {row}")]
    NullValue { column: String, row: usize },

    /// NaN or infinity in a numeric column
    #[error("column `{column}` contains a non-finite value at row {row}")]
    NonFiniteValue { column: String, row: usize },

    /// Treatment or discard value other than 0 or 1
    #[error("{role} column `{column}` must be binary, found {value} at row {row}")]
    NonBinaryFlag {
        column: String,
        role: &'static str,
        row: usize,
        value: i64,
    },

    /// Negative sample weight
    #[error("sample weight at row {row} must be non-negative, got {value}")]
    NegativeSampleWeight { row: usize, value: f64 },

    /// Sample weights that sum to zero over the units being matched
    #[error("sample weights of included units sum to zero")]
    AllZeroSampleWeights,

    /// Same column declared for more than one purpose
    #[error("column `{0}` declared more than once in the column specification")]
    DuplicateColumn(String),

    /// Two units sharing a label
    #[error("duplicate unit label `{0}` in the input batch")]
    DuplicateLabel(String),

    /// Forbidden-pair list naming a label absent from the batch
    #[error("unknown unit label `{0}` in the forbidden-pair list")]
    UnknownUnitLabel(String),

    /// Exact, anti-exact or mahalanobis variable that is not a declared covariate
    #[error("`{name}` (referenced by {context}) is not a declared covariate")]
    UnknownCovariate {
        name: String,
        context: &'static str,
    },

    /// Ordering policy that needs a score applied to score-free data
    #[error("ordering policy `{0}` requires a score column")]
    OrderRequiresScore(&'static str),

    /// Empty balance-covariate set; matching has nothing to balance
    #[error("no covariates available for matching")]
    NoCovariates,

    /// Exact groups of focal and non-focal units do not intersect
    #[error("no exact-group overlap between focal and non-focal units; no match is structurally possible")]
    NoExactOverlap,

    /// Every focal unit exhausted its candidates without a single match
    #[error("no units could be matched under the active constraints")]
    NoMatchesFound,

    /// Weight matrix with the wrong shape, asymmetry, or non-finite entries
    #[error("invalid weight matrix: {0}")]
    InvalidWeightMatrix(String),

    /// Failure raised inside an externally supplied weight optimizer
    #[error("external weight optimizer failed: {0}")]
    Optimizer(String),

    /// Error from the Arrow layer
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Result type for matching operations
pub type Result<T> = std::result::Result<T, MatchError>;

//! A Rust library for constrained nearest-neighbour matching of treated and
//! control units in observational studies, with calipers, exact and
//! anti-exact constraints, and a pluggable variable-weight optimizer.

pub mod antiexact;
pub mod assembly;
pub mod caliper;
pub mod columns;
pub mod criteria;
pub mod error;
pub mod exact;
pub mod extraction;
pub mod matcher;
pub mod optimizer;
pub mod progress;
pub mod search;
pub mod types;
pub mod unit_data;
pub mod validation;
pub mod variables;
pub mod weights;

// Re-export the most common types for easier use
// Core entry points
pub use columns::{ColumnSpec, ColumnSpecBuilder, CovariateKind};
pub use error::{MatchError, Result};
pub use matcher::Matcher;

// Configuration
pub use criteria::{
    Caliper, CaliperTarget, Estimand, FitnessFunction, MatchOrder, MatchingConfig,
    MatchingConfigBuilder, OptimizerConfig,
};

// Results and diagnostics
pub use types::{Diagnostics, MatchRow, MatchWarning, MatchingResult, OptimizerDiagnostics};

// Optimizer plug-in surface
pub use optimizer::{OptimizerOutcome, OptimizerRequest, OptimizerWarning, WeightOptimizer};

// Arrow types
pub use arrow::datatypes::Schema as ArrowSchema;
pub use arrow::record_batch::RecordBatch;

// Matrix type used at the optimizer seam
pub use nalgebra::DMatrix;

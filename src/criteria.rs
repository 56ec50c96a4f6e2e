//! Matching criteria definitions for treated-control matching
//!
//! This module provides the configuration types that determine how focal
//! units are matched to non-focal units: the estimand, the matching ratio,
//! replacement, the processing-order policy, calipers, exact and anti-exact
//! constraints, and the tuning record forwarded to a weight optimizer.

use serde::{Deserialize, Serialize};

/// Estimand the matched sample targets
///
/// The estimand decides which group is focal: under ATT the treated units are
/// matched to controls, under ATC the labels are swapped once at the entry
/// boundary and everything downstream works in focal/non-focal terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Estimand {
    /// Average treatment effect on the treated: treated units are focal
    #[default]
    Att,
    /// Average treatment effect on the controls: control units are focal
    Atc,
}

impl std::fmt::Display for Estimand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Att => write!(f, "ATT"),
            Self::Atc => write!(f, "ATC"),
        }
    }
}

/// Order in which focal units are processed by the greedy search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOrder {
    /// Score descending
    Largest,
    /// Score ascending
    Smallest,
    /// Uniform random permutation from the seeded generator
    Random,
    /// Original input order
    Data,
}

impl MatchOrder {
    /// Policy used when the caller does not pick one: score descending for
    /// ATT, score ascending for ATC, input order when there is no score
    #[must_use]
    pub const fn default_for(score_present: bool, estimand: Estimand) -> Self {
        if !score_present {
            return Self::Data;
        }
        match estimand {
            Estimand::Att => Self::Largest,
            Estimand::Atc => Self::Smallest,
        }
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Largest => "largest",
            Self::Smallest => "smallest",
            Self::Random => "random",
            Self::Data => "data",
        }
    }
}

/// Dimension a caliper applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaliperTarget {
    /// The score column
    Score,
    /// A named covariate column
    Covariate(String),
}

impl CaliperTarget {
    /// Name used in error messages and for alignment with matrix columns
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Score => "score",
            Self::Covariate(name) => name,
        }
    }
}

/// Maximum permitted per-dimension difference between a matched pair
///
/// A standardized caliper is expressed in population standard deviations of
/// its dimension and is converted to raw units before the search; a raw
/// caliper is applied as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caliper {
    /// Dimension the caliper restricts
    pub target: CaliperTarget,
    /// Maximum allowed absolute difference
    pub width: f64,
    /// Whether `width` is expressed in standard-deviation units
    pub standardized: bool,
}

impl Caliper {
    /// Standardized caliper on the score
    #[must_use]
    pub const fn score(width: f64) -> Self {
        Self {
            target: CaliperTarget::Score,
            width,
            standardized: true,
        }
    }

    /// Standardized caliper on a named covariate
    #[must_use]
    pub fn covariate(name: impl Into<String>, width: f64) -> Self {
        Self {
            target: CaliperTarget::Covariate(name.into()),
            width,
            standardized: true,
        }
    }

    /// Interpret the width in raw units instead of standard deviations
    #[must_use]
    pub const fn raw(mut self) -> Self {
        self.standardized = false;
        self
    }
}

/// Fitness function identifier forwarded to the weight optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessFunction {
    /// Maximize the smallest balance-test p-value
    #[default]
    PValues,
    /// Minimize the mean QQ-plot discrepancy
    QqMean,
    /// Minimize the median QQ-plot discrepancy
    QqMedian,
    /// Minimize the maximum QQ-plot discrepancy
    QqMax,
}

/// Tuning record forwarded to an external weight optimizer
///
/// A finite, explicitly enumerated record: there is no passthrough channel,
/// so unknown tuning keys are unrepresentable by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Number of candidate weight vectors per generation
    pub population_size: usize,

    /// Maximum number of generations to run
    pub max_generations: usize,

    /// Balance criterion the optimizer maximizes
    pub fitness: FitnessFunction,

    /// Distance below which the optimizer treats two candidates as tied
    pub distance_tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            max_generations: 100,
            fitness: FitnessFunction::default(),
            distance_tolerance: 0.0,
        }
    }
}

/// Configuration for the matching process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Estimand; decides which group is focal
    pub estimand: Estimand,

    /// Number of non-focal units to match to each focal unit (e.g. 1:4 is 4)
    pub ratio: usize,

    /// Whether a non-focal unit may be matched to several focal units
    pub replace: bool,

    /// Processing-order policy; `None` selects the estimand-aware default
    pub order: Option<MatchOrder>,

    /// Per-dimension calipers
    pub calipers: Vec<Caliper>,

    /// Covariates whose values must be identical within a matched pair
    pub exact: Vec<String>,

    /// Covariates whose values must differ within a matched pair
    pub antiexact: Vec<String>,

    /// Explicitly forbidden unit-label pairs, merged with the anti-exact set
    pub forbidden: Vec<(String, String)>,

    /// Restrict the distance to this covariate subset (score excluded)
    pub mahvars: Option<Vec<String>>,

    /// Fixed weight matrix (row form) used instead of the correlation
    /// fallback when no optimizer is attached
    pub weight_matrix: Option<Vec<Vec<f64>>>,

    /// Tuning forwarded to the optimizer, when one is attached
    pub optimizer: OptimizerConfig,

    /// Seed for the random ordering policy; `None` draws from the OS
    pub random_seed: Option<u64>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            estimand: Estimand::Att,
            ratio: 1,
            replace: false,
            order: None,
            calipers: Vec::new(),
            exact: Vec::new(),
            antiexact: Vec::new(),
            forbidden: Vec::new(),
            mahvars: None,
            weight_matrix: None,
            optimizer: OptimizerConfig::default(),
            random_seed: None,
        }
    }
}

impl MatchingConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder for constructing matching configuration
    #[must_use]
    pub fn builder() -> MatchingConfigBuilder {
        MatchingConfigBuilder::new()
    }
}

/// Builder for constructing matching configuration
#[derive(Debug, Clone, Default)]
pub struct MatchingConfigBuilder {
    config: MatchingConfig,
}

impl MatchingConfigBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: MatchingConfig::default(),
        }
    }

    /// Set the estimand
    #[must_use]
    pub const fn estimand(mut self, estimand: Estimand) -> Self {
        self.config.estimand = estimand;
        self
    }

    /// Set the matching ratio
    #[must_use]
    pub const fn ratio(mut self, ratio: usize) -> Self {
        self.config.ratio = ratio;
        self
    }

    /// Set whether to match with replacement
    #[must_use]
    pub const fn replace(mut self, replace: bool) -> Self {
        self.config.replace = replace;
        self
    }

    /// Set the processing-order policy
    #[must_use]
    pub const fn order(mut self, order: MatchOrder) -> Self {
        self.config.order = Some(order);
        self
    }

    /// Add a caliper
    #[must_use]
    pub fn caliper(mut self, caliper: Caliper) -> Self {
        self.config.calipers.push(caliper);
        self
    }

    /// Add an exact-matching covariate
    #[must_use]
    pub fn exact(mut self, name: impl Into<String>) -> Self {
        self.config.exact.push(name.into());
        self
    }

    /// Add an anti-exact covariate
    #[must_use]
    pub fn antiexact(mut self, name: impl Into<String>) -> Self {
        self.config.antiexact.push(name.into());
        self
    }

    /// Forbid a specific unit pair from being matched
    #[must_use]
    pub fn forbid(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.config.forbidden.push((a.into(), b.into()));
        self
    }

    /// Restrict the distance to a covariate subset
    #[must_use]
    pub fn mahvars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.mahvars = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Supply a fixed weight matrix in row form
    #[must_use]
    pub fn weight_matrix(mut self, rows: Vec<Vec<f64>>) -> Self {
        self.config.weight_matrix = Some(rows);
        self
    }

    /// Set the optimizer tuning record
    #[must_use]
    pub fn optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.config.optimizer = optimizer;
        self
    }

    /// Set the random seed
    #[must_use]
    pub const fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = Some(seed);
        self
    }

    /// Build the matching configuration
    #[must_use]
    pub fn build(self) -> MatchingConfig {
        self.config
    }
}

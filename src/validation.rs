//! Up-front validation of the matching configuration
//!
//! Configuration mistakes are rejected before any data is touched, so a
//! bad ratio or caliper surfaces immediately instead of partway through a
//! long run.

use crate::criteria::MatchingConfig;
use crate::error::{MatchError, Result};

/// Check the configuration for values that can never work
///
/// # Errors
///
/// Returns a configuration error for a zero ratio, a degenerate optimizer
/// record, a negative or non-finite caliper width, an empty distance
/// subset, or a non-square fixed weight matrix.
pub fn validate_config(config: &MatchingConfig) -> Result<()> {
    if config.ratio < 1 {
        return Err(MatchError::InvalidRatio(config.ratio));
    }

    if config.optimizer.population_size < 2 {
        return Err(MatchError::InvalidOptimizerConfig(format!(
            "population size must be at least 2, got {}",
            config.optimizer.population_size
        )));
    }
    if config.optimizer.max_generations < 1 {
        return Err(MatchError::InvalidOptimizerConfig(
            "generation count must be at least 1".to_string(),
        ));
    }
    let tolerance = config.optimizer.distance_tolerance;
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(MatchError::InvalidOptimizerConfig(format!(
            "distance tolerance must be finite and non-negative, got {tolerance}"
        )));
    }

    for caliper in &config.calipers {
        if !caliper.width.is_finite() || caliper.width < 0.0 {
            return Err(MatchError::InvalidCaliper {
                dimension: caliper.target.name().to_string(),
                width: caliper.width,
            });
        }
    }

    if let Some(mahvars) = &config.mahvars {
        if mahvars.is_empty() {
            return Err(MatchError::NoCovariates);
        }
    }

    if let Some(rows) = &config.weight_matrix {
        let n = rows.len();
        if n == 0 || rows.iter().any(|row| row.len() != n) {
            let widest = rows.iter().map(Vec::len).max().unwrap_or(0);
            return Err(MatchError::InvalidWeightMatrix(format!(
                "fixed weight matrix must be square, got {n}x{widest}"
            )));
        }
    }

    Ok(())
}

//! End-to-end matching runs
//!
//! [`Matcher`] owns a configuration and an optional external weight
//! optimizer and turns one Arrow record batch into one [`MatchingResult`].
//! Every run builds its own unit set, constraint sets, and weight matrix;
//! nothing persists between calls.

use crate::antiexact::build_forbidden_pairs;
use crate::assembly::assemble;
use crate::caliper::normalize_calipers;
use crate::columns::ColumnSpec;
use crate::criteria::{Estimand, MatchingConfig};
use crate::error::{MatchError, Result};
use crate::exact::build_exact_groups;
use crate::extraction::extract_units;
use crate::optimizer::{
    build_balance_matrix, resolve_weight_matrix, OptimizerRequest, WeightOptimizer,
};
use crate::progress::{create_spinner, finish_progress_bar};
use crate::search::find_matches;
use crate::types::{Diagnostics, MatchingResult};
use crate::validation::validate_config;
use crate::variables::build_variables;
use log::{debug, info};
use std::time::Instant;

/// Constrained nearest-neighbour matcher
pub struct Matcher {
    config: MatchingConfig,
    optimizer: Option<Box<dyn WeightOptimizer>>,
}

impl Matcher {
    /// Create a matcher with the given configuration
    #[must_use]
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            config,
            optimizer: None,
        }
    }

    /// Attach an external weight optimizer
    ///
    /// The optimizer is invoked once per run, before the search, and its
    /// weight matrix replaces both the fixed configuration matrix and the
    /// correlation fallback.
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: Box<dyn WeightOptimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    /// The configuration this matcher runs with
    #[must_use]
    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Match focal to non-focal units in one record batch
    ///
    /// # Errors
    ///
    /// Returns configuration errors before any data is read, extraction
    /// errors for malformed input, structural-infeasibility errors when no
    /// match is possible, and optimizer failures wrapped with their origin.
    pub fn perform_matching(
        &self,
        batch: &arrow::record_batch::RecordBatch,
        columns: &ColumnSpec,
    ) -> Result<MatchingResult> {
        let start = Instant::now();
        validate_config(&self.config)?;
        debug!(
            "starting matching run: estimand {}, ratio {}, replace {}, {} rows",
            self.config.estimand,
            self.config.ratio,
            self.config.replace,
            batch.num_rows()
        );

        let data = extract_units(batch, columns, self.config.estimand)?;
        if let Some(weights) = &data.sample_weights {
            let total: f64 = data.included.iter().map(|&row| weights[row]).sum();
            if total == 0.0 {
                return Err(MatchError::AllZeroSampleWeights);
            }
        }

        let variables = build_variables(&data, &self.config)?;
        let calipers = normalize_calipers(&self.config.calipers, &variables)?;
        let exact = if self.config.exact.is_empty() {
            None
        } else {
            Some(build_exact_groups(&data, &self.config.exact)?)
        };
        let forbidden =
            build_forbidden_pairs(&data, &self.config.antiexact, &self.config.forbidden)?;

        let balance = build_balance_matrix(&data);
        let focal_included: Vec<bool> = data.included.iter().map(|&row| data.focal[row]).collect();
        let included_weights: Option<Vec<f64>> = data
            .sample_weights
            .as_ref()
            .map(|weights| data.included.iter().map(|&row| weights[row]).collect());

        let request = OptimizerRequest {
            variables: &variables,
            balance: &balance,
            focal: &focal_included,
            sample_weights: included_weights.as_deref(),
            ratio: self.config.ratio,
            replace: self.config.replace,
            exact_groups: exact.as_ref().map(|groups| groups.labels()),
            calipers: &calipers,
            // ATC was already realized by swapping the focal group, so the
            // optimizer always sees an ATT problem.
            estimand: Estimand::Att,
            config: &self.config.optimizer,
        };

        let resolved = if let Some(optimizer) = &self.optimizer {
            let spinner = create_spinner(Some("optimizing variable weights"));
            let resolved = resolve_weight_matrix(
                Some(optimizer.as_ref()),
                &request,
                self.config.weight_matrix.as_deref(),
            );
            match &resolved {
                Ok(_) => finish_progress_bar(&spinner, Some("variable weights ready")),
                Err(_) => spinner.finish_and_clear(),
            }
            resolved?
        } else {
            resolve_weight_matrix(None, &request, self.config.weight_matrix.as_deref())?
        };

        let mut diagnostics = Diagnostics::default();
        for warning in resolved.warnings {
            diagnostics.push(warning);
        }

        let (raw, capacity) = find_matches(
            &data,
            &variables,
            &resolved.matrix,
            exact.as_ref(),
            &forbidden,
            &calipers,
            &self.config,
        )?;
        if let Some(warning) = capacity {
            diagnostics.push(warning);
        }

        let assembled = assemble(&data, &raw, self.config.ratio, self.config.replace);
        let matching_time = start.elapsed();
        info!(
            "matched {}/{} focal units to {} distinct non-focal units in {:.2?}",
            assembled.matched_focal_count,
            data.focal_included_count(),
            assembled.matched_nonfocal_count,
            matching_time
        );

        Ok(MatchingResult {
            labels: data.labels,
            match_matrix: assembled.match_matrix,
            subclass: assembled.subclass,
            weights: assembled.weights,
            matched_focal_count: assembled.matched_focal_count,
            matched_nonfocal_count: assembled.matched_nonfocal_count,
            diagnostics,
            optimizer: resolved.diagnostics,
            matching_time,
        })
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("config", &self.config)
            .field("optimizer", &self.optimizer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn two_by_two_batch() -> RecordBatch {
        let fields = vec![
            Field::new("id", arrow::datatypes::DataType::Utf8, false),
            Field::new("treated", arrow::datatypes::DataType::Int32, false),
            Field::new("age", arrow::datatypes::DataType::Float64, false),
        ];
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec!["t1", "t2", "c1", "c2"])),
            Arc::new(Int32Array::from(vec![1, 1, 0, 0])),
            Arc::new(Float64Array::from(vec![30.0, 60.0, 32.0, 58.0])),
        ];
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    #[test]
    fn test_end_to_end_smoke() {
        let columns = ColumnSpec::builder("id", "treated")
            .numeric("age")
            .build()
            .unwrap();
        let matcher = Matcher::new(MatchingConfig::default());

        let result = matcher.perform_matching(&two_by_two_batch(), &columns).unwrap();
        assert_eq!(result.match_matrix.len(), 2);
        assert_eq!(result.match_matrix[0].matches, vec![Some("c1".to_string())]);
        assert_eq!(result.match_matrix[1].matches, vec![Some("c2".to_string())]);
        assert_eq!(result.matched_focal_count, 2);
        assert!(result.diagnostics.is_empty());
        assert!(result.optimizer.is_none());
    }

    #[test]
    fn test_config_error_reported_before_data() {
        let columns = ColumnSpec::builder("id", "treated")
            .numeric("age")
            .build()
            .unwrap();
        let matcher = Matcher::new(MatchingConfig::builder().ratio(0).build());

        let err = matcher
            .perform_matching(&two_by_two_batch(), &columns)
            .unwrap_err();
        assert!(matches!(err, MatchError::InvalidRatio(0)));
    }
}

//! Shared fixtures for matching integration tests
//!
//! Builds matching input batches column by column and derives the matching
//! column specification alongside, so scenario tests stay short.

#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int32Builder, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use covmatch::{ColumnSpec, MatchingResult};

/// Initialize logging for a test binary, once
///
/// Safe to call from several tests; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Column-wise builder for a matching input batch
pub struct UnitBatch {
    labels: Vec<String>,
    treated: Vec<i32>,
    numeric: Vec<(String, Vec<f64>)>,
    categorical: Vec<(String, Vec<String>)>,
    score: Option<Vec<f64>>,
    discard: Option<Vec<bool>>,
    sample_weight: Option<Vec<f64>>,
}

impl UnitBatch {
    /// Start a batch from unit labels and 0/1 treatment values
    #[must_use]
    pub fn new(labels: &[&str], treated: &[i32]) -> Self {
        assert_eq!(labels.len(), treated.len());
        Self {
            labels: labels.iter().map(ToString::to_string).collect(),
            treated: treated.to_vec(),
            numeric: Vec::new(),
            categorical: Vec::new(),
            score: None,
            discard: None,
            sample_weight: None,
        }
    }

    /// Add a numeric covariate column
    #[must_use]
    pub fn numeric(mut self, name: &str, values: &[f64]) -> Self {
        assert_eq!(values.len(), self.labels.len());
        self.numeric.push((name.to_string(), values.to_vec()));
        self
    }

    /// Add a categorical covariate column
    #[must_use]
    pub fn categorical(mut self, name: &str, values: &[&str]) -> Self {
        assert_eq!(values.len(), self.labels.len());
        self.categorical.push((
            name.to_string(),
            values.iter().map(ToString::to_string).collect(),
        ));
        self
    }

    /// Add a score column named `ps`
    #[must_use]
    pub fn score(mut self, values: &[f64]) -> Self {
        assert_eq!(values.len(), self.labels.len());
        self.score = Some(values.to_vec());
        self
    }

    /// Add a discard-flag column named `discard`
    #[must_use]
    pub fn discard(mut self, values: &[bool]) -> Self {
        assert_eq!(values.len(), self.labels.len());
        self.discard = Some(values.to_vec());
        self
    }

    /// Add a sample-weight column named `weight`
    #[must_use]
    pub fn sample_weight(mut self, values: &[f64]) -> Self {
        assert_eq!(values.len(), self.labels.len());
        self.sample_weight = Some(values.to_vec());
        self
    }

    /// Build the record batch and the matching column specification
    #[must_use]
    pub fn build(self) -> (RecordBatch, ColumnSpec) {
        let mut fields = vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("treated", DataType::Int32, false),
        ];
        let mut arrays: Vec<ArrayRef> = Vec::new();

        let mut id_builder = StringBuilder::new();
        for label in &self.labels {
            id_builder.append_value(label);
        }
        arrays.push(Arc::new(id_builder.finish()));

        let mut treated_builder = Int32Builder::new();
        for &value in &self.treated {
            treated_builder.append_value(value);
        }
        arrays.push(Arc::new(treated_builder.finish()));

        let mut spec = ColumnSpec::builder("id", "treated");
        for (name, values) in &self.numeric {
            fields.push(Field::new(name, DataType::Float64, false));
            let mut builder = Float64Builder::new();
            for &value in values {
                builder.append_value(value);
            }
            arrays.push(Arc::new(builder.finish()));
            spec = spec.numeric(name);
        }
        for (name, values) in &self.categorical {
            fields.push(Field::new(name, DataType::Utf8, false));
            let mut builder = StringBuilder::new();
            for value in values {
                builder.append_value(value);
            }
            arrays.push(Arc::new(builder.finish()));
            spec = spec.categorical(name);
        }
        if let Some(values) = &self.score {
            fields.push(Field::new("ps", DataType::Float64, false));
            let mut builder = Float64Builder::new();
            for &value in values {
                builder.append_value(value);
            }
            arrays.push(Arc::new(builder.finish()));
            spec = spec.score("ps");
        }
        if let Some(values) = &self.discard {
            fields.push(Field::new("discard", DataType::Boolean, false));
            let mut builder = BooleanBuilder::new();
            for &value in values {
                builder.append_value(value);
            }
            arrays.push(Arc::new(builder.finish()));
            spec = spec.discard("discard");
        }
        if let Some(values) = &self.sample_weight {
            fields.push(Field::new("weight", DataType::Float64, false));
            let mut builder = Float64Builder::new();
            for &value in values {
                builder.append_value(value);
            }
            arrays.push(Arc::new(builder.finish()));
            spec = spec.sample_weight("weight");
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .expect("fixture batch construction failed");
        let spec = spec.build().expect("fixture column spec invalid");
        (batch, spec)
    }
}

/// Matched partner labels of one focal unit, skipping empty slots
#[must_use]
pub fn partners_of(result: &MatchingResult, focal: &str) -> Vec<String> {
    result
        .match_matrix
        .iter()
        .find(|row| row.focal == focal)
        .map(|row| row.matches.iter().flatten().cloned().collect())
        .unwrap_or_default()
}

/// All realized partner labels across the whole match matrix
#[must_use]
pub fn all_partners(result: &MatchingResult) -> Vec<String> {
    result
        .match_matrix
        .iter()
        .flat_map(|row| row.matches.iter().flatten().cloned())
        .collect()
}

/// Weight of a unit by label, panicking on unknown labels
#[must_use]
pub fn weight_of(result: &MatchingResult, label: &str) -> f64 {
    result
        .weight_of(label)
        .expect("label not present in result")
}

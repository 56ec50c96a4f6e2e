//! Extraction of matching input from Arrow record batches
//!
//! All role columns are pulled out of the batch in one pass and validated
//! strictly: a null anywhere in a role column, a non-finite numeric value,
//! or a treatment value other than 0/1 aborts the run. Numeric covariates
//! accept any Arrow numeric type and are widened to `f64` through the cast
//! kernel; categorical covariates are palette-compressed to integer codes in
//! first-encounter order.

use crate::columns::{ColumnSpec, CovariateKind};
use crate::criteria::Estimand;
use crate::error::{MatchError, Result};
use crate::unit_data::{focal_indicator, CovariateColumn, CovariateValues, UnitData};
use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use rustc_hash::{FxHashMap, FxHashSet};

/// Extract and validate all role columns from a record batch
///
/// The estimand is applied here, once: the returned [`UnitData`] speaks only
/// of focal and non-focal units.
///
/// # Errors
///
/// Returns an error if a role column is missing or has an unsupported type,
/// if labels are not unique, or if any value fails strict validation.
pub fn extract_units(
    batch: &RecordBatch,
    columns: &ColumnSpec,
    estimand: Estimand,
) -> Result<UnitData> {
    let n = batch.num_rows();

    let labels = label_column(batch_column(batch, &columns.label)?, &columns.label)?;
    let treated = binary_column(
        batch_column(batch, &columns.treatment)?,
        &columns.treatment,
        "treatment",
    )?;
    let focal: Vec<bool> = treated
        .iter()
        .map(|&t| focal_indicator(t, estimand))
        .collect();

    let discarded = match &columns.discard {
        Some(name) => binary_column(batch_column(batch, name)?, name, "discard")?,
        None => vec![false; n],
    };

    let score = columns
        .score
        .as_ref()
        .map(|name| numeric_column(batch_column(batch, name)?, name, "score"))
        .transpose()?;

    let sample_weights = columns
        .sample_weight
        .as_ref()
        .map(|name| {
            let values = numeric_column(batch_column(batch, name)?, name, "sample weight")?;
            for (row, &value) in values.iter().enumerate() {
                if value < 0.0 {
                    return Err(MatchError::NegativeSampleWeight { row, value });
                }
            }
            Ok(values)
        })
        .transpose()?;

    let mut covariates = Vec::with_capacity(columns.covariates.len());
    for spec in &columns.covariates {
        let array = batch_column(batch, &spec.name)?;
        let values = match spec.kind {
            CovariateKind::Numeric => {
                CovariateValues::Numeric(numeric_column(array, &spec.name, "covariate")?)
            }
            CovariateKind::Categorical => categorical_column(array, &spec.name)?,
        };
        covariates.push(CovariateColumn {
            name: spec.name.clone(),
            values,
        });
    }

    let included = (0..n).filter(|&row| !discarded[row]).collect();

    Ok(UnitData {
        labels,
        focal,
        discarded,
        score,
        sample_weights,
        columns: covariates,
        included,
    })
}

fn batch_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| MatchError::UnknownColumn(name.to_string()))
}

fn type_error(array: &ArrayRef, column: &str, role: &'static str) -> MatchError {
    MatchError::ColumnType {
        column: column.to_string(),
        role,
        data_type: array.data_type().to_string(),
    }
}

fn label_column(array: &ArrayRef, column: &str) -> Result<Vec<String>> {
    let strings = array
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| type_error(array, column, "label"))?;

    let mut labels = Vec::with_capacity(strings.len());
    let mut seen = FxHashSet::default();
    for row in 0..strings.len() {
        if strings.is_null(row) {
            return Err(MatchError::NullValue {
                column: column.to_string(),
                row,
            });
        }
        let label = strings.value(row);
        if !seen.insert(label.to_string()) {
            return Err(MatchError::DuplicateLabel(label.to_string()));
        }
        labels.push(label.to_string());
    }
    Ok(labels)
}

fn binary_column(array: &ArrayRef, column: &str, role: &'static str) -> Result<Vec<bool>> {
    if let Some(flags) = array.as_any().downcast_ref::<BooleanArray>() {
        let mut out = Vec::with_capacity(flags.len());
        for row in 0..flags.len() {
            if flags.is_null(row) {
                return Err(MatchError::NullValue {
                    column: column.to_string(),
                    row,
                });
            }
            out.push(flags.value(row));
        }
        return Ok(out);
    }

    if !array.data_type().is_integer() {
        return Err(type_error(array, column, role));
    }
    let widened = cast(array, &DataType::Int64)?;
    let values = widened
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| type_error(array, column, role))?;

    let mut out = Vec::with_capacity(values.len());
    for row in 0..values.len() {
        if values.is_null(row) {
            return Err(MatchError::NullValue {
                column: column.to_string(),
                row,
            });
        }
        match values.value(row) {
            0 => out.push(false),
            1 => out.push(true),
            value => {
                return Err(MatchError::NonBinaryFlag {
                    column: column.to_string(),
                    role,
                    row,
                    value,
                });
            }
        }
    }
    Ok(out)
}

fn numeric_column(array: &ArrayRef, column: &str, role: &'static str) -> Result<Vec<f64>> {
    let supported = array.data_type().is_numeric() || array.data_type() == &DataType::Boolean;
    if !supported {
        return Err(type_error(array, column, role));
    }
    let widened = cast(array, &DataType::Float64)?;
    let values = widened
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| type_error(array, column, role))?;

    let mut out = Vec::with_capacity(values.len());
    for row in 0..values.len() {
        if values.is_null(row) {
            return Err(MatchError::NullValue {
                column: column.to_string(),
                row,
            });
        }
        let value = values.value(row);
        if !value.is_finite() {
            return Err(MatchError::NonFiniteValue {
                column: column.to_string(),
                row,
            });
        }
        out.push(value);
    }
    Ok(out)
}

fn categorical_column(array: &ArrayRef, column: &str) -> Result<CovariateValues> {
    let level_strings: Vec<String> = if let Some(strings) =
        array.as_any().downcast_ref::<StringArray>()
    {
        let mut out = Vec::with_capacity(strings.len());
        for row in 0..strings.len() {
            if strings.is_null(row) {
                return Err(MatchError::NullValue {
                    column: column.to_string(),
                    row,
                });
            }
            out.push(strings.value(row).to_string());
        }
        out
    } else if let Some(flags) = array.as_any().downcast_ref::<BooleanArray>() {
        let mut out = Vec::with_capacity(flags.len());
        for row in 0..flags.len() {
            if flags.is_null(row) {
                return Err(MatchError::NullValue {
                    column: column.to_string(),
                    row,
                });
            }
            out.push(flags.value(row).to_string());
        }
        out
    } else if array.data_type().is_integer() {
        let widened = cast(array, &DataType::Int64)?;
        let values = widened
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| type_error(array, column, "categorical covariate"))?;
        let mut out = Vec::with_capacity(values.len());
        for row in 0..values.len() {
            if values.is_null(row) {
                return Err(MatchError::NullValue {
                    column: column.to_string(),
                    row,
                });
            }
            out.push(values.value(row).to_string());
        }
        out
    } else {
        return Err(type_error(array, column, "categorical covariate"));
    };

    // Palette compression: each distinct level gets the next code the first
    // time it is seen, so codes depend only on input order.
    let mut palette: FxHashMap<String, u32> = FxHashMap::default();
    let mut levels = Vec::new();
    let mut codes = Vec::with_capacity(level_strings.len());
    for level in level_strings {
        let next = palette.len() as u32;
        let code = *palette.entry(level.clone()).or_insert_with(|| {
            levels.push(level);
            next
        });
        codes.push(code);
    }

    Ok(CovariateValues::Categorical { codes, levels })
}

//! Exact-match group labels
//!
//! Each included unit gets one integer group label derived from the
//! combined values of all exact-match variables. The combination is hashed
//! as a composite key of value codes rather than a concatenated string, and
//! labels are dense integers in first-encounter order. Two units are
//! matchable only if their labels are equal.

use crate::error::{MatchError, Result};
use crate::unit_data::UnitData;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// Composite group label per included unit
///
/// Labels are indexed by position in `UnitData::included`, matching the row
/// order of the matching-variable matrix.
#[derive(Debug, Clone)]
pub struct ExactGroups {
    labels: Vec<u32>,
}

impl ExactGroups {
    /// Group label of the included unit at `pos`
    #[must_use]
    pub fn label(&self, pos: usize) -> u32 {
        self.labels[pos]
    }

    /// Whether two included units may be matched under the exact constraint
    #[must_use]
    pub fn same_group(&self, a: usize, b: usize) -> bool {
        self.labels[a] == self.labels[b]
    }

    /// All labels, aligned with `UnitData::included`
    #[must_use]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }
}

/// Build composite exact-match groups and verify focal/non-focal overlap
///
/// # Errors
///
/// Returns [`MatchError::UnknownCovariate`] for an undeclared variable and
/// [`MatchError::NoExactOverlap`] when no group label occurs in both the
/// focal and the non-focal set, in which case no match is structurally
/// possible.
pub fn build_exact_groups(data: &UnitData, names: &[String]) -> Result<ExactGroups> {
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let index = data
            .column_index(name)
            .ok_or_else(|| MatchError::UnknownCovariate {
                name: name.clone(),
                context: "exact constraint",
            })?;
        columns.push(&data.columns[index]);
    }

    let mut palette: FxHashMap<SmallVec<[u64; 4]>, u32> = FxHashMap::default();
    let mut labels = Vec::with_capacity(data.included.len());
    for &row in &data.included {
        let key: SmallVec<[u64; 4]> = columns.iter().map(|c| c.value_code(row)).collect();
        let next = palette.len() as u32;
        let label = *palette.entry(key).or_insert(next);
        labels.push(label);
    }

    let mut focal_labels = FxHashSet::default();
    let mut nonfocal_labels = FxHashSet::default();
    for (pos, &row) in data.included.iter().enumerate() {
        if data.focal[row] {
            focal_labels.insert(labels[pos]);
        } else {
            nonfocal_labels.insert(labels[pos]);
        }
    }
    if !focal_labels.iter().any(|l| nonfocal_labels.contains(l)) {
        return Err(MatchError::NoExactOverlap);
    }

    Ok(ExactGroups { labels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit_data::{CovariateColumn, CovariateValues};

    fn data_with(columns: Vec<CovariateColumn>, focal: Vec<bool>) -> UnitData {
        let n = focal.len();
        UnitData {
            labels: (0..n).map(|i| format!("u{i}")).collect(),
            focal,
            discarded: vec![false; n],
            score: None,
            sample_weights: None,
            columns,
            included: (0..n).collect(),
        }
    }

    #[test]
    fn test_composite_labels_over_two_variables() {
        let data = data_with(
            vec![
                CovariateColumn {
                    name: "sex".to_string(),
                    values: CovariateValues::Categorical {
                        codes: vec![0, 0, 1, 0],
                        levels: vec!["f".to_string(), "m".to_string()],
                    },
                },
                CovariateColumn {
                    name: "year".to_string(),
                    values: CovariateValues::Numeric(vec![2001.0, 2002.0, 2001.0, 2001.0]),
                },
            ],
            vec![true, true, false, false],
        );

        let groups =
            build_exact_groups(&data, &["sex".to_string(), "year".to_string()]).unwrap();
        assert_eq!(groups.label(0), groups.label(3));
        assert_ne!(groups.label(0), groups.label(1));
        assert_ne!(groups.label(0), groups.label(2));
        assert!(groups.same_group(0, 3));
    }

    #[test]
    fn test_no_overlap_rejected() {
        let data = data_with(
            vec![CovariateColumn {
                name: "site".to_string(),
                values: CovariateValues::Categorical {
                    codes: vec![0, 0, 1, 1],
                    levels: vec!["a".to_string(), "b".to_string()],
                },
            }],
            vec![true, true, false, false],
        );

        let err = build_exact_groups(&data, &["site".to_string()]).unwrap_err();
        assert!(matches!(err, MatchError::NoExactOverlap));
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let data = data_with(
            vec![CovariateColumn {
                name: "age".to_string(),
                values: CovariateValues::Numeric(vec![1.0, 2.0]),
            }],
            vec![true, false],
        );

        let err = build_exact_groups(&data, &["site".to_string()]).unwrap_err();
        assert!(matches!(err, MatchError::UnknownCovariate { name, .. } if name == "site"));
    }

    #[test]
    fn test_signed_zero_codes_equal() {
        let data = data_with(
            vec![CovariateColumn {
                name: "offset".to_string(),
                values: CovariateValues::Numeric(vec![0.0, -0.0]),
            }],
            vec![true, false],
        );

        let groups = build_exact_groups(&data, &["offset".to_string()]).unwrap();
        assert!(groups.same_group(0, 1));
    }
}

//! Forbidden-pair construction from anti-exact variables
//!
//! For each anti-exact variable, included units are partitioned by value
//! and every unordered pair inside a partition is forbidden. Several
//! variables union their pair sets, and an externally supplied list of
//! forbidden label pairs merges in additively. Pairs are stored over
//! included-unit positions so the search can test them directly.

use crate::error::{MatchError, Result};
use crate::unit_data::UnitData;
use rustc_hash::{FxHashMap, FxHashSet};

/// Set of unordered unit pairs that must never be matched together
#[derive(Debug, Clone, Default)]
pub struct ForbiddenPairs {
    pairs: FxHashSet<(usize, usize)>,
}

impl ForbiddenPairs {
    /// Whether matching the included units at `a` and `b` is forbidden
    #[must_use]
    pub fn contains(&self, a: usize, b: usize) -> bool {
        self.pairs.contains(&ordered(a, b))
    }

    /// Whether no pair is forbidden
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of forbidden pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

const fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Build the forbidden-pair set for one run
///
/// Label pairs naming a discarded unit are dropped; a label naming no unit
/// at all is an error.
///
/// # Errors
///
/// Returns [`MatchError::UnknownCovariate`] for an undeclared anti-exact
/// variable and [`MatchError::UnknownUnitLabel`] for an unresolvable label
/// in the external pair list.
pub fn build_forbidden_pairs(
    data: &UnitData,
    names: &[String],
    extra: &[(String, String)],
) -> Result<ForbiddenPairs> {
    let mut pairs = FxHashSet::default();

    for name in names {
        let index = data
            .column_index(name)
            .ok_or_else(|| MatchError::UnknownCovariate {
                name: name.clone(),
                context: "anti-exact constraint",
            })?;
        let column = &data.columns[index];

        let mut partitions: FxHashMap<u64, Vec<usize>> = FxHashMap::default();
        for (pos, &row) in data.included.iter().enumerate() {
            partitions.entry(column.value_code(row)).or_default().push(pos);
        }
        for members in partitions.values() {
            for (i, &a) in members.iter().enumerate() {
                for &b in &members[i + 1..] {
                    pairs.insert(ordered(a, b));
                }
            }
        }
    }

    if !extra.is_empty() {
        let mut position_of_label: FxHashMap<&str, Option<usize>> = FxHashMap::default();
        for (pos, &row) in data.included.iter().enumerate() {
            position_of_label.insert(data.labels[row].as_str(), Some(pos));
        }
        for (row, label) in data.labels.iter().enumerate() {
            if data.discarded[row] {
                position_of_label.insert(label.as_str(), None);
            }
        }

        for (a, b) in extra {
            let pos_a = *position_of_label
                .get(a.as_str())
                .ok_or_else(|| MatchError::UnknownUnitLabel(a.clone()))?;
            let pos_b = *position_of_label
                .get(b.as_str())
                .ok_or_else(|| MatchError::UnknownUnitLabel(b.clone()))?;
            // Pairs naming a discarded unit impose nothing on the search.
            if let (Some(pos_a), Some(pos_b)) = (pos_a, pos_b) {
                pairs.insert(ordered(pos_a, pos_b));
            }
        }
    }

    Ok(ForbiddenPairs { pairs })
}

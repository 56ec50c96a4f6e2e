//! Translation of raw assignments into the public result
//!
//! Raw matches speak in included-unit positions; the public result speaks
//! in unit labels and input-row alignment. Every included focal unit gets a
//! match-matrix row padded to the ratio with explicit no-match entries.
//! Weights cover every input row: a matched focal unit weighs 1, a matched
//! non-focal unit accumulates 1/k for each focal partner with k realized
//! matches, everything else weighs 0. Subclasses exist only without
//! replacement, where each focal unit and its matched controls form one
//! group, numbered from 1 in focal input order.

use crate::search::RawMatches;
use crate::types::MatchRow;
use crate::unit_data::UnitData;
use rustc_hash::FxHashSet;

/// Assembled public view of one matching run
#[derive(Debug, Clone)]
pub struct AssembledMatches {
    /// One row per included focal unit, in input order
    pub match_matrix: Vec<MatchRow>,
    /// Subclass label per input row, `None` under replacement
    pub subclass: Option<Vec<Option<u32>>>,
    /// Weight per input row
    pub weights: Vec<f64>,
    /// Focal units with at least one match
    pub matched_focal_count: usize,
    /// Distinct non-focal units that were matched
    pub matched_nonfocal_count: usize,
}

/// Convert raw position assignments into labels, weights, and subclasses
#[must_use]
pub fn assemble(data: &UnitData, raw: &RawMatches, ratio: usize, replace: bool) -> AssembledMatches {
    let n_rows = data.n_units();
    let mut match_matrix = Vec::new();
    let mut weights = vec![0.0; n_rows];
    let mut subclass = (!replace).then(|| vec![None; n_rows]);
    let mut matched_focal_count = 0;
    let mut matched_nonfocal = FxHashSet::default();
    let mut next_subclass = 1_u32;

    for (pos, &row) in data.included.iter().enumerate() {
        if !data.focal[row] {
            continue;
        }
        let partners = &raw.matches[pos];

        let mut labels: Vec<Option<String>> = partners
            .iter()
            .map(|&p| Some(data.labels[data.included[p]].clone()))
            .collect();
        labels.resize(ratio, None);
        match_matrix.push(MatchRow {
            focal: data.labels[row].clone(),
            matches: labels,
        });

        if partners.is_empty() {
            continue;
        }
        matched_focal_count += 1;

        weights[row] = 1.0;
        let share = 1.0 / partners.len() as f64;
        for &p in partners {
            weights[data.included[p]] += share;
            matched_nonfocal.insert(p);
        }

        if let Some(subclass) = subclass.as_mut() {
            subclass[row] = Some(next_subclass);
            for &p in partners {
                subclass[data.included[p]] = Some(next_subclass);
            }
            next_subclass += 1;
        }
    }

    AssembledMatches {
        match_matrix,
        subclass,
        weights,
        matched_focal_count,
        matched_nonfocal_count: matched_nonfocal.len(),
    }
}

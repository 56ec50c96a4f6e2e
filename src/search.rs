//! Ordered nearest-neighbour search under constraints
//!
//! Focal units are processed one at a time in the configured order. For
//! each one the eligible non-focal candidates are scanned in input order
//! and the `ratio` nearest under the generalized distance are assigned;
//! distance ties keep the first-encountered candidate. Without replacement
//! a candidate is consumed by its first assignment and never offered again.
//! A focal unit that runs out of candidates keeps its partial list; the run
//! fails only when no focal unit finds any match at all.

use crate::antiexact::ForbiddenPairs;
use crate::caliper::RawCaliper;
use crate::criteria::{MatchOrder, MatchingConfig};
use crate::error::{MatchError, Result};
use crate::exact::ExactGroups;
use crate::progress::{create_main_progress_bar, finish_progress_bar};
use crate::types::MatchWarning;
use crate::unit_data::UnitData;
use crate::variables::MatchingVariables;
use itertools::Itertools;
use log::{debug, warn};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use smallvec::SmallVec;

/// Raw assignments over included-unit positions
///
/// `matches[pos]` holds the assigned candidate positions for the focal unit
/// at `pos`, nearest first; non-focal positions keep an empty list.
#[derive(Debug, Clone)]
pub struct RawMatches {
    /// Assigned candidates per included position, nearest first
    pub matches: Vec<SmallVec<[usize; 4]>>,
    /// Focal units that received at least one match
    pub matched_focal: usize,
    /// Total assignments across all focal units
    pub total_matches: usize,
}

/// Run the constrained nearest-neighbour assignment
///
/// # Errors
///
/// Returns [`MatchError::OrderRequiresScore`] when a score-based order is
/// requested without a score, and [`MatchError::NoMatchesFound`] when not a
/// single focal unit could be matched.
pub fn find_matches(
    data: &UnitData,
    variables: &MatchingVariables,
    weight_matrix: &DMatrix<f64>,
    exact: Option<&ExactGroups>,
    forbidden: &ForbiddenPairs,
    calipers: &[RawCaliper],
    config: &MatchingConfig,
) -> Result<(RawMatches, Option<MatchWarning>)> {
    let n = data.included.len();
    let order = processing_order(data, config)?;
    let focal_count = order.len();
    let nonfocal_count = n - focal_count;

    let mut capacity_warning = None;
    if !config.replace {
        let required = focal_count * config.ratio;
        if nonfocal_count < required {
            warn!(
                "{nonfocal_count} non-focal units available for {required} requested \
                 assignments without replacement"
            );
            capacity_warning = Some(MatchWarning::Capacity {
                required,
                available: nonfocal_count,
            });
        }
    }

    debug!(
        "matching {focal_count} focal against {nonfocal_count} non-focal units, ratio {}, \
         replace {}",
        config.ratio, config.replace
    );

    let x = &variables.matrix;
    let distance_cols = &variables.distance_cols;
    let mut used = vec![false; n];
    let mut matches: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); n];
    let mut matched_focal = 0;
    let mut total_matches = 0;

    let pb = create_main_progress_bar(focal_count as u64, Some("matching focal units"));
    for &focal_pos in &order {
        let mut best: Vec<(f64, usize)> = Vec::with_capacity(config.ratio + 1);

        'candidates: for candidate in 0..n {
            if data.focal[data.included[candidate]] {
                continue;
            }
            if !config.replace && used[candidate] {
                continue;
            }
            if let Some(groups) = exact {
                if !groups.same_group(focal_pos, candidate) {
                    continue;
                }
            }
            if forbidden.contains(focal_pos, candidate) {
                continue;
            }
            for caliper in calipers {
                let gap = (x[(focal_pos, caliper.column)] - x[(candidate, caliper.column)]).abs();
                if gap > caliper.width {
                    continue 'candidates;
                }
            }

            let d2 = generalized_distance(x, weight_matrix, distance_cols, focal_pos, candidate);
            // Ties keep the earlier candidate: the insertion point is after
            // every stored entry at the same distance.
            let insert_at = best.partition_point(|&(d, _)| d <= d2);
            if insert_at < config.ratio {
                best.insert(insert_at, (d2, candidate));
                if best.len() > config.ratio {
                    best.pop();
                }
            }
        }

        if !best.is_empty() {
            matched_focal += 1;
            total_matches += best.len();
            for &(_, candidate) in &best {
                used[candidate] = true;
                matches[focal_pos].push(candidate);
            }
        }
        pb.inc(1);
    }
    finish_progress_bar(
        &pb,
        Some(&format!("matched {matched_focal}/{focal_count} focal units")),
    );

    if total_matches == 0 {
        return Err(MatchError::NoMatchesFound);
    }

    Ok((
        RawMatches {
            matches,
            matched_focal,
            total_matches,
        },
        capacity_warning,
    ))
}

/// Focal positions in the order the search visits them
fn processing_order(data: &UnitData, config: &MatchingConfig) -> Result<Vec<usize>> {
    let focal_positions: Vec<usize> = data
        .included
        .iter()
        .enumerate()
        .filter(|&(_, &row)| data.focal[row])
        .map(|(pos, _)| pos)
        .collect();

    let order = config
        .order
        .unwrap_or_else(|| MatchOrder::default_for(data.score.is_some(), config.estimand));

    match order {
        MatchOrder::Data => Ok(focal_positions),
        MatchOrder::Random => {
            let mut rng = match config.random_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let mut positions = focal_positions;
            positions.shuffle(&mut rng);
            Ok(positions)
        }
        MatchOrder::Largest | MatchOrder::Smallest => {
            let Some(score) = &data.score else {
                return Err(MatchError::OrderRequiresScore(order.as_str()));
            };
            let sorted = focal_positions
                .into_iter()
                .sorted_by(|&a, &b| {
                    let sa = score[data.included[a]];
                    let sb = score[data.included[b]];
                    match order {
                        MatchOrder::Largest => sb.total_cmp(&sa),
                        _ => sa.total_cmp(&sb),
                    }
                })
                .collect();
            Ok(sorted)
        }
    }
}

/// Squared generalized distance between two rows of X
fn generalized_distance(
    x: &DMatrix<f64>,
    w: &DMatrix<f64>,
    distance_cols: &[usize],
    a: usize,
    b: usize,
) -> f64 {
    let mut total = 0.0;
    for &col_a in distance_cols {
        let da = x[(a, col_a)] - x[(b, col_a)];
        if da == 0.0 {
            continue;
        }
        for &col_b in distance_cols {
            let db = x[(a, col_b)] - x[(b, col_b)];
            total += da * w[(col_a, col_b)] * db;
        }
    }
    total
}

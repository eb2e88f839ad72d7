// vortex_filament - Biot-Savart Ewald simulation of quantized vortex filaments
// Copyright (C) 2021 Julian Jeggle, Raphael Wittkowski

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Refinement criteria and the refine/apply pass (SPEC_FULL.md §4.3). A
//! criterion is evaluated once against the *unmodified* filament, producing
//! a plan (segments to split, nodes to remove); the plan is applied in a
//! single pass, never removing two adjacent nodes.

use crate::error::ConfigError;
use crate::filament::Filament;

/// Node refinement/coarsening criterion (SPEC_FULL.md §4.3).
#[derive(Debug, Clone, Copy)]
pub enum RefinementCriterion {
    /// No insertions or removals are ever proposed.
    NoRefinement,
    /// Insert a midpoint on segments longer than `l_max`; mark the node
    /// shared with the next segment for removal when a segment is shorter
    /// than `l_min`, unless the merge would create a segment longer than
    /// `l_max`.
    BasedOnSegmentLength { l_min: f64, l_max: f64 },
    /// Same as `BasedOnSegmentLength`, but gated on the product of segment
    /// length and segment-averaged curvature `rho = (kappa[i]+kappa[i+1])/2`
    /// against `rho_l_max`/`rho_l_min`, with `l_min`/`l_max` as absolute
    /// safety bounds.
    BasedOnCurvature {
        rho_l_max: f64,
        rho_l_min: f64,
        l_min: f64,
        l_max: f64,
    },
}

/// Outcome of evaluating a criterion against a filament: which segments to
/// split (insert a midpoint) and which nodes to remove.
#[derive(Debug, Clone, Default)]
pub struct RefinementPlan {
    pub insertions: Vec<usize>,
    pub removals: Vec<usize>,
}

impl RefinementPlan {
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.removals.is_empty()
    }
}

fn node_after_segment(i: usize, n: usize) -> usize {
    if i == n {
        1
    } else {
        i + 1
    }
}

fn neighbors(node: usize, n: usize) -> (usize, usize) {
    let prev = if node == 1 { n } else { node - 1 };
    let next = if node == n { 1 } else { node + 1 };
    (prev, next)
}

/// Evaluate `criterion` against `filament`, returning a plan. Does not
/// mutate the filament.
pub fn plan(filament: &Filament, criterion: &RefinementCriterion) -> RefinementPlan {
    match criterion {
        RefinementCriterion::NoRefinement => RefinementPlan::default(),
        RefinementCriterion::BasedOnSegmentLength { l_min, l_max } => {
            plan_by_metric(filament, *l_min, *l_max, *l_max, |_i, len| len)
        }
        RefinementCriterion::BasedOnCurvature {
            rho_l_max,
            rho_l_min,
            l_min,
            l_max,
        } => plan_curvature(filament, *rho_l_max, *rho_l_min, *l_min, *l_max),
    }
}

/// Shared machinery for the segment-length criterion and as a building
/// block for the curvature criterion: `metric(i, len)` returns the
/// quantity compared against `metric_min`/`metric_max`; `absolute_l_max` is
/// the hard length ceiling a node-removal merge must never cross,
/// independent of what the metric itself measures.
fn plan_by_metric(
    filament: &Filament,
    metric_min: f64,
    metric_max: f64,
    absolute_l_max: f64,
    metric: impl Fn(usize, f64) -> f64,
) -> RefinementPlan {
    let n = filament.num_segments();
    let lengths: Vec<f64> = (1..=n).map(|i| filament.segment_length(i)).collect();
    let mut insertions = Vec::new();
    for i in 1..=n {
        if metric(i, lengths[i - 1]) > metric_max {
            insertions.push(i);
        }
    }
    let mut removed = vec![false; n + 1];
    let mut removals = Vec::new();
    for i in 1..=n {
        let len_i = lengths[i - 1];
        if metric(i, len_i) >= metric_min {
            continue;
        }
        let node = node_after_segment(i, n);
        let next_seg = node_after_segment(node, n);
        let len_next = lengths[next_seg - 1];
        if len_i + len_next > absolute_l_max {
            continue;
        }
        let (prev, next) = neighbors(node, n);
        if removed[prev] || removed[next] || removed[node] {
            continue;
        }
        removed[node] = true;
        removals.push(node);
    }
    RefinementPlan {
        insertions,
        removals,
    }
}

fn plan_curvature(
    filament: &Filament,
    rho_l_max: f64,
    rho_l_min: f64,
    l_min: f64,
    l_max: f64,
) -> RefinementPlan {
    let n = filament.num_segments();
    let kappa: Vec<f64> = (1..=n).map(|i| filament.curvature_scalar(i, 0.0)).collect();
    let lengths: Vec<f64> = (1..=n).map(|i| filament.segment_length(i)).collect();
    let rho = |i: usize| -> f64 { 0.5 * (kappa[i - 1] + kappa[i % n]) };
    // Curvature-weighted product gates refinement; the absolute l_min/l_max
    // bounds always dominate (an over-long segment always splits, an
    // under-short one never merges past l_max -- that guard lives in
    // plan_by_metric itself).
    plan_by_metric(filament, rho_l_min, rho_l_max, l_max, move |i, len| {
        if len > l_max {
            f64::INFINITY
        } else if len < l_min {
            -f64::INFINITY
        } else {
            rho(i) * len
        }
    })
}

/// Apply a plan in one pass: insert an interpolated midpoint on every
/// flagged segment, drop every flagged node, then recompute knots and
/// coefficients. Returns `(inserted, removed)` counts, or a `ConfigError`
/// if the result is degenerate (the caller must then drop the filament).
pub fn apply(filament: &mut Filament, plan: &RefinementPlan) -> Result<(usize, usize), ConfigError> {
    if plan.is_empty() {
        return Ok((0, 0));
    }
    let n = filament.num_segments();
    let removed_set: std::collections::HashSet<usize> = plan.removals.iter().copied().collect();
    let insert_set: std::collections::HashSet<usize> = plan.insertions.iter().copied().collect();
    let mut new_points = Vec::with_capacity(n + plan.insertions.len());
    for i in 1..=n {
        if !removed_set.contains(&i) {
            new_points.push(*filament.nodes().get(i as isize));
        }
        if insert_set.contains(&i) {
            new_points.push(filament.evaluate(i, 0.5, 0));
        }
    }
    let inserted = plan.insertions.len();
    let removed = plan.removals.len();
    filament.replace_nodes(new_points)?;
    Ok((inserted, removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filament::DiscretisationMethod;
    use crate::vec3::Vec3;
    use std::f64::consts::PI;

    fn ring(n: usize, radius: f64) -> Filament {
        let points: Vec<Vec3> = (0..n)
            .map(|k| {
                let theta = 2.0 * PI * k as f64 / n as f64;
                Vec3::new(radius * theta.cos(), radius * theta.sin(), 0.0)
            })
            .collect();
        Filament::init(points, DiscretisationMethod::CubicSpline, Vec3::zeros()).unwrap()
    }

    #[test]
    fn no_refinement_plan_is_empty() {
        let f = ring(16, 1.0);
        let p = plan(&f, &RefinementCriterion::NoRefinement);
        assert!(p.is_empty());
    }

    #[test]
    fn segment_length_refinement_is_idempotent_when_satisfied() {
        let mut f = ring(16, 1.0);
        let crit = RefinementCriterion::BasedOnSegmentLength {
            l_min: 0.01,
            l_max: 10.0,
        };
        let p1 = plan(&f, &crit);
        let (ins, rem) = apply(&mut f, &p1).unwrap();
        assert_eq!((ins, rem), (0, 0));
        let p2 = plan(&f, &crit);
        assert!(p2.is_empty());
    }

    #[test]
    fn oversized_segments_get_split() {
        let f = ring(8, 1.0);
        let crit = RefinementCriterion::BasedOnSegmentLength {
            l_min: 0.0,
            l_max: 0.1,
        };
        let p = plan(&f, &crit);
        assert_eq!(p.insertions.len(), 8);
        assert!(p.removals.is_empty());
    }

    #[test]
    fn never_removes_two_adjacent_nodes() {
        let f = ring(16, 1.0);
        let crit = RefinementCriterion::BasedOnSegmentLength {
            l_min: 10.0,
            l_max: 100.0,
        };
        let p = plan(&f, &crit);
        let removed: std::collections::HashSet<usize> = p.removals.iter().copied().collect();
        for &node in &p.removals {
            let (prev, next) = neighbors(node, 16);
            assert!(!removed.contains(&prev));
            assert!(!removed.contains(&next));
        }
    }
}

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

//! Filament discretization (SPEC_FULL.md §4.3): a closed curve backed by a
//! [`PaddedSequence`] of nodes, with two interchangeable backends --
//! finite-difference + Hermite (`fd`) and periodic B-splines (`spline`).

pub mod fd;
pub mod refinement;
pub mod spline;

use crate::error::ConfigError;
use crate::padded::PaddedSequence;
use crate::quadrature::GaussLegendre;
use crate::vec3::Vec3;

/// Which interpolation backend a filament uses (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiscretisationMethod {
    /// `2M+1`-point stencil estimate of derivatives at nodes, paired with a
    /// Hermite interpolation of order `interp_order` (0, 1 or 2).
    FiniteDifference { m: usize, interp_order: usize },
    /// Periodic cubic B-spline (order 4, degree 3).
    CubicSpline,
    /// Periodic quintic B-spline (order 6, degree 5).
    QuinticSpline,
}

impl DiscretisationMethod {
    /// Ghost padding required on each side. For the spline backends this is
    /// the B-spline *order* `k` (4 for cubic, 6 for quintic) rather than the
    /// degree: the periodic collocation solve needs one extra knot of
    /// headroom beyond what plain de Boor evaluation would require.
    pub fn pad_width(&self) -> usize {
        match self {
            DiscretisationMethod::FiniteDifference { m, .. } => *m,
            DiscretisationMethod::CubicSpline => 4,
            DiscretisationMethod::QuinticSpline => 6,
        }
    }

    /// Minimum visible node count below which a filament is degenerate
    /// (SPEC_FULL.md §3).
    pub fn min_nodes(&self) -> usize {
        match self {
            DiscretisationMethod::FiniteDifference { m, .. } => 2 * m + 1,
            DiscretisationMethod::CubicSpline => 3,
            DiscretisationMethod::QuinticSpline => 5,
        }
    }

    fn spline_degree(&self) -> Option<usize> {
        match self {
            DiscretisationMethod::CubicSpline => Some(3),
            DiscretisationMethod::QuinticSpline => Some(5),
            DiscretisationMethod::FiniteDifference { .. } => None,
        }
    }
}

/// Derived interpolation coefficients, recomputed by
/// [`Filament::update_coefficients`] after any mutation (SPEC_FULL.md §3).
#[derive(Debug, Clone)]
enum Coefficients {
    FiniteDifference {
        deriv1: PaddedSequence<Vec3>,
        deriv2: PaddedSequence<Vec3>,
    },
    Spline {
        control_points: PaddedSequence<Vec3>,
    },
}

/// A closed vortex filament: a parametric curve sampled at `N` nodes, with
/// `M` ghost slots of padding on each side and a periodic offset `Δ`
/// (SPEC_FULL.md §3). `Δ = 0` for an isolated closed loop; non-zero for an
/// infinite line wrapping through a periodic box.
#[derive(Debug, Clone)]
pub struct Filament {
    nodes: PaddedSequence<Vec3>,
    knots: PaddedSequence<f64>,
    offset: Vec3,
    method: DiscretisationMethod,
    coefficients: Coefficients,
}

/// Parametric derivative order request for [`Filament::evaluate`].
pub type DerivOrder = usize;

impl Filament {
    /// Construct a filament from a sequence of node positions. Computes
    /// knots (arc-length-proportional by default: `t[i+1]-t[i] = |X[i+1]-X[i]|`)
    /// and interpolation coefficients; invariants hold on return
    /// (SPEC_FULL.md §4.3 `init`).
    pub fn init(
        points: Vec<Vec3>,
        method: DiscretisationMethod,
        offset: Vec3,
    ) -> Result<Self, ConfigError> {
        let n = points.len();
        if n < method.min_nodes() {
            return Err(ConfigError::DegenerateFilament {
                n,
                min: method.min_nodes(),
            });
        }
        let m = method.pad_width();
        let nodes = PaddedSequence::from_visible(&points, m);
        let mut knots = PaddedSequence::new(n, m);
        let coefficients = match method {
            DiscretisationMethod::FiniteDifference { .. } => Coefficients::FiniteDifference {
                deriv1: PaddedSequence::new(n, m),
                deriv2: PaddedSequence::new(n, m),
            },
            DiscretisationMethod::CubicSpline | DiscretisationMethod::QuinticSpline => {
                Coefficients::Spline {
                    control_points: PaddedSequence::new(n, m),
                }
            }
        };
        let mut f = Filament {
            nodes,
            knots,
            offset,
            method,
            coefficients,
        };
        f.pad_nodes();
        f.recompute_knots();
        f.update_coefficients();
        Ok(f)
    }

    pub fn method(&self) -> DiscretisationMethod {
        self.method
    }

    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Vec3) {
        self.offset = offset;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    pub fn nodes(&self) -> &PaddedSequence<Vec3> {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut PaddedSequence<Vec3> {
        &mut self.nodes
    }

    pub fn knots(&self) -> &PaddedSequence<f64> {
        &self.knots
    }

    /// Total parametric period `T` such that `t[i+N] - t[i] = T` for every `i`.
    pub fn total_period(&self) -> f64 {
        let n = self.nodes.len() as isize;
        *self.knots.get(1 + n) - *self.knots.get(1)
    }

    fn pad_nodes(&mut self) {
        let offset = self.offset;
        self.nodes
            .apply_padding_from_centre(move |v, periods| v + offset * periods as f64);
    }

    /// Recompute `t` from current node positions (arc-length-proportional
    /// parametrization) and re-pad it periodically.
    fn recompute_knots(&mut self) {
        let n = self.nodes.len();
        let mut t = vec![0.0; n];
        for i in 1..n {
            let seg_len = (*self.nodes.get(i as isize + 1) - *self.nodes.get(i as isize)).norm();
            t[i] = t[i - 1] + seg_len;
        }
        let last_seg = (*self.nodes.get(n as isize + 1) - *self.nodes.get(n as isize)).norm();
        let total_period = t[n - 1] + last_seg;
        self.knots = PaddedSequence::from_visible(&t, self.method.pad_width());
        self.knots
            .apply_padding_from_centre(move |v, periods| v + periods as f64 * total_period);
    }

    /// Recompute derived interpolation coefficients after any mutation of
    /// `nodes`, `knots`, or `N` (SPEC_FULL.md §3 invariant). Must be called
    /// before `evaluate` is used at a non-node parameter.
    pub fn update_coefficients(&mut self) {
        self.pad_nodes();
        match (&self.method, &mut self.coefficients) {
            (
                DiscretisationMethod::FiniteDifference { m, .. },
                Coefficients::FiniteDifference { deriv1, deriv2 },
            ) => {
                fd::compute_derivatives(*m, &self.nodes, &self.knots, deriv1, deriv2);
            }
            (_, Coefficients::Spline { control_points }) => {
                let degree = self.method.spline_degree().unwrap();
                *control_points =
                    spline::solve_control_points(degree, &self.knots, &self.nodes, self.offset);
            }
            _ => unreachable!("discretisation method and coefficient variant must match"),
        }
    }

    /// Value or `d`-th parametric derivative (wrt the arc-length parameter
    /// `t`, SPEC_FULL.md §4.3) at normalized parameter `zeta in [0,1]`
    /// inside segment `i` (`1 <= i <= N`).
    pub fn evaluate(&self, i: usize, zeta: f64, d: DerivOrder) -> Vec3 {
        debug_assert!((1..=self.len()).contains(&i));
        debug_assert!((0.0..=1.0).contains(&zeta));
        match (&self.method, &self.coefficients) {
            (
                DiscretisationMethod::FiniteDifference { interp_order, .. },
                Coefficients::FiniteDifference { deriv1, deriv2 },
            ) => fd::hermite_evaluate(
                *interp_order,
                &self.nodes,
                &self.knots,
                deriv1,
                deriv2,
                i,
                zeta,
                d,
            ),
            (_, Coefficients::Spline { control_points }) => {
                let degree = self.method.spline_degree().unwrap();
                spline::evaluate(degree, &self.knots, control_points, i, zeta, d)
            }
            _ => unreachable!(),
        }
    }

    /// Locate the segment bracketing a global parameter value `u` (possibly
    /// outside `[t[1], t[N+1])`, wrapped modulo the total period) and return
    /// `(segment_index, zeta)`.
    pub fn locate(&self, u: f64) -> (usize, f64) {
        let n = self.len() as isize;
        let t0 = *self.knots.get(1);
        let period = self.total_period();
        let mut u = t0 + (u - t0).rem_euclid(period);
        // Guard against floating point landing exactly on the upper bound.
        if u >= *self.knots.get(n + 1) {
            u = *self.knots.get(n + 1) - 1e-13 * period;
        }
        let mut i = 1usize;
        while i < n as usize && *self.knots.get(i as isize + 1) <= u {
            i += 1;
        }
        let t_i = *self.knots.get(i as isize);
        let t_ip1 = *self.knots.get(i as isize + 1);
        let zeta = ((u - t_i) / (t_ip1 - t_i)).clamp(0.0, 1.0);
        (i, zeta)
    }

    /// Unit tangent vector at `(i, zeta)`: `normalize(X')`.
    pub fn unit_tangent(&self, i: usize, zeta: f64) -> Vec3 {
        self.evaluate(i, zeta, 1).normalize()
    }

    /// Curvature vector `(X'' - (X''.t^) t^) / |X'|^2` at `(i, zeta)`.
    pub fn curvature_vector(&self, i: usize, zeta: f64) -> Vec3 {
        let d1 = self.evaluate(i, zeta, 1);
        let d2 = self.evaluate(i, zeta, 2);
        let speed2 = d1.norm_squared();
        if speed2 <= 0.0 {
            return Vec3::zeros();
        }
        let t_hat = d1 / speed2.sqrt();
        (d2 - t_hat * d2.dot(&t_hat)) / speed2
    }

    /// Scalar curvature `|curvature_vector|`.
    pub fn curvature_scalar(&self, i: usize, zeta: f64) -> f64 {
        self.curvature_vector(i, zeta).norm()
    }

    /// Minimum Euclidean distance between consecutive visible nodes.
    pub fn minimum_node_distance(&self) -> f64 {
        let n = self.len();
        (1..=n)
            .map(|i| (*self.nodes.get(i as isize + 1) - *self.nodes.get(i as isize)).norm())
            .fold(f64::INFINITY, f64::min)
    }

    /// Minimum parametric (knot) increment between consecutive nodes.
    pub fn minimum_knot_increment(&self) -> f64 {
        let n = self.len();
        (1..=n)
            .map(|i| *self.knots.get(i as isize + 1) - *self.knots.get(i as isize))
            .fold(f64::INFINITY, f64::min)
    }

    /// Total length of the filament, integrated with Gauss-Legendre
    /// quadrature segment by segment.
    pub fn filament_length(&self, quad: &GaussLegendre) -> f64 {
        let n = self.len();
        (1..=n)
            .map(|i| {
                let dt = *self.knots.get(i as isize + 1) - *self.knots.get(i as isize);
                quad.integrate(|zeta| self.evaluate(i, zeta, 1).norm()) * dt
            })
            .sum()
    }

    /// Segment length (Euclidean, node-to-node) of segment `i`.
    pub fn segment_length(&self, i: usize) -> f64 {
        (*self.nodes.get(i as isize + 1) - *self.nodes.get(i as isize)).norm()
    }

    /// Number of visible segments (equal to node count for a closed curve).
    pub fn num_segments(&self) -> usize {
        self.len()
    }

    /// Predicate for non-degeneracy (SPEC_FULL.md §4.3 `check_nodes`).
    pub fn check_nodes(&self) -> bool {
        self.len() >= self.method.min_nodes()
    }

    /// Recentre nodes into the fundamental cell `[0, L)` on periodic axes,
    /// preserving the offset vector `Δ`. Returns whether any node moved, so
    /// the caller knows to call `update_coefficients` again.
    pub fn fold_periodic(&mut self, periods: &crate::cell_list::Periods) -> bool {
        let n = self.len();
        let mut moved = false;
        // Fold relative to the first node so the whole filament shifts by a
        // single lattice vector rather than each node independently
        // (independent folding would tear an infinite line apart).
        let reference = *self.nodes.get(1);
        let folded_reference = periods.fold(reference);
        let shift = folded_reference - reference;
        if shift.norm() > 0.0 {
            moved = true;
            for i in 1..=n {
                let v = *self.nodes.get(i as isize) + shift;
                self.nodes.set(i as isize, v);
            }
        }
        moved
    }

    /// Inverse of periodic folding restricted to this filament's own nodes:
    /// unwrap nodes that cross the box boundary back into a continuous
    /// representation, used internally by the finite-difference stencil
    /// near a periodic seam (SPEC_FULL.md §4 supplemented feature).
    pub fn deperiodise(&self, periods: &crate::cell_list::Periods) -> Vec<Vec3> {
        let n = self.len();
        let mut out = Vec::with_capacity(n);
        if n == 0 {
            return out;
        }
        let mut prev = *self.nodes.get(1);
        out.push(prev);
        for i in 2..=n {
            let mut cur = *self.nodes.get(i as isize);
            for axis in 0..3 {
                if let Some(l) = periods.lengths[axis] {
                    let d = cur[axis] - prev[axis];
                    if d > 0.5 * l {
                        cur[axis] -= l;
                    } else if d < -0.5 * l {
                        cur[axis] += l;
                    }
                }
            }
            out.push(cur);
            prev = cur;
        }
        out
    }

    /// Split this filament at nodes `(i, j)` into two filaments (self
    /// reconnection surgery, SPEC_FULL.md §4.5). Applies a periodic
    /// displacement `p` to one side. `i != j` required.
    pub fn split(&self, i: usize, j: usize, p: Vec3) -> (Vec<Vec3>, Vec<Vec3>, Vec3, Vec3) {
        let n = self.len();
        assert!(i != j && (1..=n).contains(&i) && (1..=n).contains(&j));
        // Piece A: nodes i+1 .. j (inclusive), wrapping.
        let mut a = Vec::new();
        let mut k = i;
        loop {
            k = if k == n { 1 } else { k + 1 };
            a.push(*self.nodes.get(k as isize));
            if k == j {
                break;
            }
        }
        // Piece B: nodes j+1 .. i (inclusive), wrapping.
        let mut b = Vec::new();
        let mut k = j;
        loop {
            k = if k == n { 1 } else { k + 1 };
            b.push(*self.nodes.get(k as isize));
            if k == i {
                break;
            }
        }
        // Children offsets sum to the parent's offset plus p (SPEC_FULL.md §4.5).
        let offset_a = p;
        let offset_b = self.offset;
        (a, b, offset_a, offset_b)
    }

    /// Merge this filament with `other` at nodes `(i, j)` into a single
    /// filament (other-reconnection surgery, SPEC_FULL.md §4.5): traverses
    /// `self` up to node `i`, jumps by `p` to `other` at node `j+1`,
    /// continues along `other` back to node `j`, jumps by `-p` back to
    /// `self` at node `i+1`.
    pub fn merge(&self, other: &Filament, i: usize, j: usize, p: Vec3) -> (Vec<Vec3>, Vec3) {
        let n_self = self.len();
        let n_other = other.len();
        let mut merged = Vec::with_capacity(n_self + n_other);
        let mut k = 0usize;
        loop {
            k = k % n_self + 1;
            merged.push(*self.nodes.get(k as isize));
            if k == i {
                break;
            }
        }
        let mut k = j;
        loop {
            k = if k == n_other { 1 } else { k + 1 };
            merged.push(*other.nodes.get(k as isize) + p);
            if k == j {
                break;
            }
        }
        // Jump back to `self` at node `i+1` and continue the rest of the
        // way around it (node `1..=i` was already pushed above), completing
        // the single closed loop (SPEC_FULL.md §4.5): without this tail the
        // merged filament would only contain `i` of `self`'s `n_self` nodes.
        for k in (i + 1)..=n_self {
            merged.push(*self.nodes.get(k as isize));
        }
        let offset = self.offset + other.offset;
        (merged, offset)
    }

    fn set_visible(&mut self, values: &[Vec3]) {
        let n = values.len();
        self.nodes.resize(n);
        self.nodes.as_visible_slice_mut().clone_from_slice(values);
        self.knots.resize(n);
    }

    /// Rebuild this filament's node set from a plain vector of points,
    /// keeping its method and offset. Used by the reconnection engine and
    /// by refinement to apply a computed plan in one pass.
    pub fn replace_nodes(&mut self, points: Vec<Vec3>) -> Result<(), ConfigError> {
        if points.len() < self.method.min_nodes() {
            return Err(ConfigError::DegenerateFilament {
                n: points.len(),
                min: self.method.min_nodes(),
            });
        }
        self.set_visible(&points);
        self.recompute_knots();
        self.update_coefficients();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn ring(n: usize, radius: f64, method: DiscretisationMethod) -> Filament {
        let points: Vec<Vec3> = (0..n)
            .map(|k| {
                let theta = 2.0 * PI * k as f64 / n as f64;
                Vec3::new(radius * theta.cos(), radius * theta.sin(), 0.0)
            })
            .collect();
        Filament::init(points, method, Vec3::zeros()).unwrap()
    }

    #[test]
    fn evaluate_at_nodes_reproduces_stored_values_cubic_spline() {
        let f = ring(16, 1.0, DiscretisationMethod::CubicSpline);
        for i in 1..=f.len() {
            let p0 = f.evaluate(i, 0.0, 0);
            let expected = *f.nodes().get(i as isize);
            assert_abs_diff_eq!(p0.x, expected.x, epsilon = 1e-8);
            assert_abs_diff_eq!(p0.y, expected.y, epsilon = 1e-8);
            let p1 = f.evaluate(i, 1.0, 0);
            let expected1 = *f.nodes().get(i as isize + 1);
            assert_abs_diff_eq!(p1.x, expected1.x, epsilon = 1e-8);
            assert_abs_diff_eq!(p1.y, expected1.y, epsilon = 1e-8);
        }
    }

    #[test]
    fn evaluate_at_nodes_reproduces_stored_values_fd() {
        let f = ring(
            16,
            1.0,
            DiscretisationMethod::FiniteDifference { m: 2, interp_order: 1 },
        );
        for i in 1..=f.len() {
            let p0 = f.evaluate(i, 0.0, 0);
            let expected = *f.nodes().get(i as isize);
            assert_abs_diff_eq!(p0.x, expected.x, epsilon = 1e-10);
            assert_abs_diff_eq!(p0.y, expected.y, epsilon = 1e-10);
        }
    }

    #[test]
    fn closed_ring_tangent_sum_vanishes() {
        let f = ring(32, 1.0, DiscretisationMethod::CubicSpline);
        let mut sum = Vec3::zeros();
        for i in 1..=f.len() {
            let dt = *f.knots().get(i as isize + 1) - *f.knots().get(i as isize);
            sum += f.evaluate(i, 0.5, 1) * dt;
        }
        assert_abs_diff_eq!(sum.norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn knot_period_invariant_holds() {
        let f = ring(10, 1.0, DiscretisationMethod::CubicSpline);
        let n = f.len() as isize;
        let period = f.total_period();
        for i in -3..=3 {
            let lhs = *f.knots().get(i + n) - *f.knots().get(i);
            assert_abs_diff_eq!(lhs, period, epsilon = 1e-9);
        }
    }

    #[test]
    fn degenerate_filament_rejected_at_init() {
        let points = vec![Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0)];
        let err = Filament::init(points, DiscretisationMethod::CubicSpline, Vec3::zeros())
            .unwrap_err();
        assert!(matches!(err, ConfigError::DegenerateFilament { .. }));
    }
}

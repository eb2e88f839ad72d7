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

//! Periodic B-spline backend (SPEC_FULL.md §4.3): cubic (order 4, degree 3)
//! and quintic (order 6, degree 5) interpolating B-splines. Node positions
//! double as the knot sites `t[i]`; control points are solved once per
//! mutation via a periodic collocation system (the "periodic band solve" of
//! SPEC_FULL.md), then evaluated with de Boor's algorithm. Derivatives use
//! the standard B-spline derivative recurrence (control points of the
//! degree-reduced derivative spline), applied recursively for order `d`.

use nalgebra::{DMatrix, DVector};

use crate::padded::PaddedSequence;
use crate::vec3::Vec3;

/// Cox-de Boor basis function `B_{j,p}(x)` evaluated against the knot
/// sequence `t` (which already carries the periodic extension needed for
/// `j` outside `[1,N]`).
fn basis(j: isize, p: usize, x: f64, t: &PaddedSequence<f64>) -> f64 {
    if p == 0 {
        return if *t.get(j) <= x && x < *t.get(j + 1) {
            1.0
        } else {
            0.0
        };
    }
    let mut value = 0.0;
    let denom_l = *t.get(j + p as isize) - *t.get(j);
    if denom_l.abs() > 1e-14 {
        value += (x - *t.get(j)) / denom_l * basis(j, p - 1, x, t);
    }
    let denom_r = *t.get(j + 1 + p as isize) - *t.get(j + 1);
    if denom_r.abs() > 1e-14 {
        value += (*t.get(j + 1 + p as isize) - x) / denom_r * basis(j + 1, p - 1, x, t);
    }
    value
}

/// Map a (possibly out-of-range) 1-based control-point index to its visible
/// index and the number of full periods wrapped (so the caller can add
/// `period * offset` back in).
fn wrap_index(j: isize, n: usize) -> (usize, i64) {
    let n = n as isize;
    let zero_based = j - 1;
    let period = zero_based.div_euclid(n);
    let wrapped = zero_based.rem_euclid(n) + 1;
    (wrapped as usize, period as i64)
}

/// Solve for the `N` periodic B-spline control points reproducing
/// `nodes[i] = spline(t[i])` exactly, then pad them the same way positions
/// are padded (periodic wrap with an additive `offset` per period).
pub fn solve_control_points(
    degree: usize,
    knots: &PaddedSequence<f64>,
    nodes: &PaddedSequence<Vec3>,
    offset: Vec3,
) -> PaddedSequence<Vec3> {
    let n = nodes.len();
    let mut mat = DMatrix::<f64>::zeros(n, n);
    let mut rhs_x = DVector::<f64>::zeros(n);
    let mut rhs_y = DVector::<f64>::zeros(n);
    let mut rhs_z = DVector::<f64>::zeros(n);
    for row in 1..=n {
        let u = *knots.get(row as isize);
        let target = *nodes.get(row as isize);
        rhs_x[row - 1] = target.x;
        rhs_y[row - 1] = target.y;
        rhs_z[row - 1] = target.z;
        for j in (row as isize - degree as isize)..=(row as isize) {
            let b = basis(j, degree, u, knots);
            if b.abs() < 1e-14 {
                continue;
            }
            let (col, period) = wrap_index(j, n);
            mat[(row - 1, col - 1)] += b;
            if period != 0 {
                let corr = period as f64;
                rhs_x[row - 1] -= corr * b * offset.x;
                rhs_y[row - 1] -= corr * b * offset.y;
                rhs_z[row - 1] -= corr * b * offset.z;
            }
        }
    }
    let lu = mat.lu();
    let sol_x = lu
        .solve(&rhs_x)
        .expect("periodic spline collocation system is singular");
    let sol_y = lu
        .solve(&rhs_y)
        .expect("periodic spline collocation system is singular");
    let sol_z = lu
        .solve(&rhs_z)
        .expect("periodic spline collocation system is singular");

    let visible: Vec<Vec3> = (0..n)
        .map(|k| Vec3::new(sol_x[k], sol_y[k], sol_z[k]))
        .collect();
    let mut control_points = PaddedSequence::from_visible(&visible, degree + 1);
    control_points.apply_padding_from_centre(move |v, periods| v + offset * periods as f64);
    control_points
}

/// Derivative control points of a degree-`p` B-spline curve: the standard
/// B-spline derivative recurrence, giving the control points of the
/// degree-`p-1` derivative curve (same knot vector, translation-invariant
/// so padded with zero drift).
fn derivative_control_points(
    p: usize,
    knots: &PaddedSequence<f64>,
    control_points: &PaddedSequence<Vec3>,
) -> PaddedSequence<Vec3> {
    let n = control_points.len();
    let mut out = PaddedSequence::new(n, control_points.pad_width());
    for j in 1..=n as isize {
        let denom = *knots.get(j + p as isize) - *knots.get(j);
        let d = if denom.abs() > 1e-14 {
            (*control_points.get(j + 1) - *control_points.get(j)) * (p as f64 / denom)
        } else {
            Vec3::zeros()
        };
        out.set(j, d);
    }
    out.apply_padding_from_centre(|v, _periods| *v);
    out
}

/// Evaluate the periodic B-spline of degree `degree` at segment `i`,
/// normalized parameter `zeta in [0,1]`, or its `d`-th derivative with
/// respect to the global parameter `t` (SPEC_FULL.md §4.3).
pub fn evaluate(
    degree: usize,
    knots: &PaddedSequence<f64>,
    control_points: &PaddedSequence<Vec3>,
    i: usize,
    zeta: f64,
    d: usize,
) -> Vec3 {
    if d > degree {
        return Vec3::zeros();
    }
    let mut p = degree;
    let mut c = control_points.clone();
    for _ in 0..d {
        c = derivative_control_points(p, knots, &c);
        p -= 1;
    }
    let t_i = *knots.get(i as isize);
    let t_ip1 = *knots.get(i as isize + 1);
    let u = t_i + zeta * (t_ip1 - t_i);
    de_boor(i as isize, u, knots, &c, p)
}

/// Classic de Boor algorithm: evaluate the degree-`p` B-spline at global
/// parameter `u`, with knot span index `k` (segment `k` in our notation,
/// since each filament segment corresponds to exactly one knot span).
fn de_boor(k: isize, u: f64, t: &PaddedSequence<f64>, c: &PaddedSequence<Vec3>, p: usize) -> Vec3 {
    let mut d: Vec<Vec3> = (0..=p).map(|j| *c.get(k - p as isize + j as isize)).collect();
    for r in 1..=p {
        for j in (r..=p).rev() {
            let left = t.get(j as isize + k - p as isize);
            let right = t.get(j as isize + 1 + k - r as isize);
            let alpha = if (*right - *left).abs() > 1e-14 {
                (u - *left) / (*right - *left)
            } else {
                0.0
            };
            d[j] = d[j - 1] * (1.0 - alpha) + d[j] * alpha;
        }
    }
    d[p]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ring_knots_and_nodes(n: usize, pad: usize) -> (PaddedSequence<f64>, PaddedSequence<Vec3>) {
        let points: Vec<Vec3> = (0..n)
            .map(|k| {
                let theta = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
                Vec3::new(theta.cos(), theta.sin(), 0.0)
            })
            .collect();
        let mut t = vec![0.0; n];
        for i in 1..n {
            t[i] = t[i - 1] + (points[i] - points[i - 1]).norm();
        }
        let total = t[n - 1] + (points[0] - points[n - 1]).norm();
        let mut knots = PaddedSequence::from_visible(&t, pad);
        knots.apply_padding_from_centre(move |v, periods| v + periods as f64 * total);
        let mut nodes = PaddedSequence::from_visible(&points, pad);
        nodes.apply_padding_from_centre(|v, _p| *v);
        (knots, nodes)
    }

    #[test]
    fn cubic_spline_interpolates_nodes() {
        let (knots, nodes) = ring_knots_and_nodes(12, 4);
        let cp = solve_control_points(3, &knots, &nodes, Vec3::zeros());
        for i in 1..=12 {
            let v = evaluate(3, &knots, &cp, i, 0.0, 0);
            let expected = *nodes.get(i as isize);
            assert_abs_diff_eq!(v.x, expected.x, epsilon = 1e-7);
            assert_abs_diff_eq!(v.y, expected.y, epsilon = 1e-7);
        }
    }

    #[test]
    fn quintic_spline_interpolates_nodes() {
        let (knots, nodes) = ring_knots_and_nodes(16, 6);
        let cp = solve_control_points(5, &knots, &nodes, Vec3::zeros());
        for i in 1..=16 {
            let v = evaluate(5, &knots, &cp, i, 0.0, 0);
            let expected = *nodes.get(i as isize);
            assert_abs_diff_eq!(v.x, expected.x, epsilon = 1e-6);
            assert_abs_diff_eq!(v.y, expected.y, epsilon = 1e-6);
        }
    }
}

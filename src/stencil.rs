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

//! Finite-difference stencil weights for non-uniformly spaced nodes
//! (SPEC_FULL.md §4.3, `DiscretisationMethod::FiniteDifference`). The
//! filament's parametric knots `t` are arc-length-proportional and thus
//! not generally uniform, so stencil weights are recomputed from the
//! actual node spacing with Fornberg's algorithm rather than assuming a
//! fixed-step formula.

/// Compute finite-difference weights for approximating derivatives of
/// order `0..=max_order` at `z`, given sample abscissas `x` (not
/// necessarily uniformly spaced, not necessarily containing `z`).
///
/// Returns a `(max_order+1) x x.len()` table `c` such that
/// `f^(d)(z) ~= sum_i c[d][i] * f(x[i])`.
///
/// Standard algorithm (Fornberg, 1988, "Generation of Finite Difference
/// Formulas on Arbitrarily Spaced Grids").
pub fn fd_weights(z: f64, x: &[f64], max_order: usize) -> Vec<Vec<f64>> {
    let n = x.len();
    assert!(n >= 1);
    let mut c = vec![vec![0.0; n]; max_order + 1];
    c[0][0] = 1.0;
    let mut c1 = 1.0;
    let mut c4 = x[0] - z;
    for i in 1..n {
        let mn = max_order.min(i);
        let mut c2 = 1.0;
        let c5 = c4;
        c4 = x[i] - z;
        for j in 0..i {
            let c3 = x[i] - x[j];
            c2 *= c3;
            if j == i - 1 {
                for k in (1..=mn).rev() {
                    c[k][i] = c1 * (k as f64 * c[k - 1][i - 1] - c5 * c[k][i - 1]) / c2;
                }
                c[0][i] = -c1 * c5 * c[0][i - 1] / c2;
            }
            for k in (1..=mn).rev() {
                c[k][j] = (c4 * c[k][j] - k as f64 * c[k - 1][j]) / c3;
            }
            c[0][j] = c4 * c[0][j] / c3;
        }
        c1 = c2;
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn central_3point_first_derivative_uniform() {
        // f(x) = x^2 on a uniform 3-point stencil centered at 0 with h=1:
        // weights should reproduce the textbook (-1/2, 0, 1/2).
        let x = [-1.0, 0.0, 1.0];
        let w = fd_weights(0.0, &x, 1);
        assert_abs_diff_eq!(w[1][0], -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(w[1][1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[1][2], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn reproduces_polynomial_derivatives() {
        // f(x) = x^3, f' = 3x^2, f'' = 6x, evaluated at the stencil centre.
        let x = [-2.0, -1.0, 0.0, 1.0, 2.0];
        let f: Vec<f64> = x.iter().map(|&xi| xi * xi * xi).collect();
        let w = fd_weights(0.0, &x, 2);
        let d1: f64 = w[1].iter().zip(&f).map(|(c, fi)| c * fi).sum();
        let d2: f64 = w[2].iter().zip(&f).map(|(c, fi)| c * fi).sum();
        assert_abs_diff_eq!(d1, 0.0, epsilon = 1e-10); // 3*0^2
        assert_abs_diff_eq!(d2, 0.0, epsilon = 1e-10); // 6*0
    }

    #[test]
    fn nonuniform_spacing() {
        let x = [-1.5, -0.3, 0.0, 0.4, 1.7];
        let f: Vec<f64> = x.iter().map(|&xi| xi * xi).collect();
        let w = fd_weights(0.0, &x, 2);
        let d2: f64 = w[2].iter().zip(&f).map(|(c, fi)| c * fi).sum();
        assert_abs_diff_eq!(d2, 2.0, epsilon = 1e-8);
    }
}

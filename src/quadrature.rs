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

//! Gauss-Legendre quadrature rules for integrating over a segment
//! parametrized on `[0,1]` (SPEC_FULL.md §4.2). Used by the short-range
//! Biot-Savart sum and (optionally) by the long-range vorticity deposition.

/// A fixed Gauss-Legendre rule of a given order, with nodes and weights
/// already mapped from the canonical `[-1,1]` interval onto `[0,1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre {
    order: usize,
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Build a rule of the given order (number of quadrature points).
    /// Supports orders 1 through 10 directly (tabulated, as is standard
    /// practice for low-order Gauss rules); beyond that a Newton iteration
    /// on the Legendre polynomial roots is used.
    pub fn new(order: usize) -> Self {
        assert!(order >= 1, "quadrature order must be at least 1");
        let (nodes, weights) = match order {
            1 => (vec![0.0], vec![2.0]),
            2 => (
                vec![-0.5773502691896257, 0.5773502691896257],
                vec![1.0, 1.0],
            ),
            3 => (
                vec![-0.7745966692414834, 0.0, 0.7745966692414834],
                vec![
                    0.5555555555555556,
                    0.8888888888888888,
                    0.5555555555555556,
                ],
            ),
            4 => (
                vec![
                    -0.8611363115940526,
                    -0.3399810435848563,
                    0.3399810435848563,
                    0.8611363115940526,
                ],
                vec![
                    0.3478548451374538,
                    0.6521451548625461,
                    0.6521451548625461,
                    0.3478548451374538,
                ],
            ),
            5 => (
                vec![
                    -0.9061798459386640,
                    -0.5384693101056831,
                    0.0,
                    0.5384693101056831,
                    0.9061798459386640,
                ],
                vec![
                    0.2369268850561891,
                    0.4786286704993665,
                    0.5688888888888889,
                    0.4786286704993665,
                    0.2369268850561891,
                ],
            ),
            _ => newton_legendre_nodes_weights(order),
        };
        let (nodes, weights) = rescale_to_unit_interval(&nodes, &weights);
        GaussLegendre {
            order,
            nodes,
            weights,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Quadrature nodes mapped to `[0,1]`.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Quadrature weights corresponding to `nodes()`, summing to `1`.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Integrate `f` (a function of the parameter in `[0,1]`) over the
    /// segment, returning `\int_0^1 f(zeta) dzeta`.
    pub fn integrate<F: Fn(f64) -> f64>(&self, f: F) -> f64 {
        self.nodes
            .iter()
            .zip(self.weights.iter())
            .map(|(&z, &w)| w * f(z))
            .sum()
    }

    /// Vector-valued variant returning a `Vec3`.
    pub fn integrate_vec3<F: Fn(f64) -> crate::vec3::Vec3>(&self, f: F) -> crate::vec3::Vec3 {
        self.nodes
            .iter()
            .zip(self.weights.iter())
            .fold(crate::vec3::Vec3::zeros(), |acc, (&z, &w)| acc + f(z) * w)
    }
}

fn rescale_to_unit_interval(nodes: &[f64], weights: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let nodes = nodes.iter().map(|&x| 0.5 * (x + 1.0)).collect();
    let weights = weights.iter().map(|&w| 0.5 * w).collect();
    (nodes, weights)
}

/// Newton iteration for Legendre polynomial roots and Gauss weights,
/// used for orders the tabulated rules above don't cover.
fn newton_legendre_nodes_weights(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let nf = n as f64;
    for i in 0..n {
        // Initial guess (Chebyshev-like) for the i-th root.
        let mut x = (std::f64::consts::PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre_p_and_derivative(n, x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre_p_and_derivative(n, x);
        nodes[i] = x;
        weights[i] = 2.0 / ((1.0 - x * x) * dp * dp);
    }
    nodes.reverse();
    weights.reverse();
    (nodes, weights)
}

fn legendre_p_and_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let kf = k as f64;
        let p2 = ((2.0 * kf - 1.0) * x * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn weights_sum_to_one() {
        for order in 1..=8 {
            let rule = GaussLegendre::new(order);
            let sum: f64 = rule.weights().iter().sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn nodes_lie_in_unit_interval() {
        let rule = GaussLegendre::new(6);
        for &z in rule.nodes() {
            assert!((0.0..=1.0).contains(&z));
        }
    }

    #[test]
    fn integrates_polynomials_exactly() {
        // An order-n rule integrates polynomials up to degree 2n-1 exactly.
        let rule = GaussLegendre::new(4);
        let exact = 1.0 / 5.0; // integral of x^4 over [0,1]
        let approx = rule.integrate(|x| x.powi(4));
        assert_abs_diff_eq!(approx, exact, epsilon = 1e-12);
    }
}

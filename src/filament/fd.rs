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

//! `FiniteDifference` backend: `2M+1`-point stencil derivative estimates at
//! nodes (SPEC_FULL.md §4.3) paired with a Hermite interpolation of order
//! `M in {0,1,2}` between them.

use crate::padded::PaddedSequence;
use crate::stencil::fd_weights;
use crate::vec3::Vec3;

/// Estimate first and second parametric derivatives at every visible node
/// using a `2M+1`-point Fornberg stencil over the (possibly non-uniform)
/// knot spacing, then periodically pad the results with zero drift (these
/// are differential quantities, not positions).
pub fn compute_derivatives(
    m: usize,
    nodes: &PaddedSequence<Vec3>,
    knots: &PaddedSequence<f64>,
    deriv1: &mut PaddedSequence<Vec3>,
    deriv2: &mut PaddedSequence<Vec3>,
) {
    let n = nodes.len();
    deriv1.resize(n);
    deriv2.resize(n);
    for i in 1..=n {
        let abscissas: Vec<f64> = (-(m as isize)..=m as isize)
            .map(|k| *knots.get(i as isize + k))
            .collect();
        let weights = fd_weights(*knots.get(i as isize), &abscissas, 2);
        let mut d1 = Vec3::zeros();
        let mut d2 = Vec3::zeros();
        for (idx, k) in (-(m as isize)..=m as isize).enumerate() {
            let x = *nodes.get(i as isize + k);
            d1 += x * weights[1][idx];
            d2 += x * weights[2][idx];
        }
        deriv1.set(i as isize, d1);
        deriv2.set(i as isize, d2);
    }
    deriv1.apply_padding_from_centre(|v, _periods| *v);
    deriv2.apply_padding_from_centre(|v, _periods| *v);
}

/// Evaluate the Hermite interpolant of order `m` (0, 1 or 2) on segment `i`
/// at normalized parameter `zeta in [0,1]`, or its `d`-th derivative with
/// respect to the global arc-length parameter `t` (SPEC_FULL.md §4.3).
/// Returns the zero vector for `d` beyond the polynomial's degree.
pub fn hermite_evaluate(
    m: usize,
    nodes: &PaddedSequence<Vec3>,
    knots: &PaddedSequence<f64>,
    deriv1: &PaddedSequence<Vec3>,
    deriv2: &PaddedSequence<Vec3>,
    i: usize,
    zeta: f64,
    d: usize,
) -> Vec3 {
    let dt = *knots.get(i as isize + 1) - *knots.get(i as isize);
    let x0 = *nodes.get(i as isize);
    let x1 = *nodes.get(i as isize + 1);
    match m {
        0 => hermite_linear(x0, x1, zeta, dt, d),
        1 => {
            let dx0 = *deriv1.get(i as isize);
            let dx1 = *deriv1.get(i as isize + 1);
            hermite_cubic(x0, dx0, x1, dx1, zeta, dt, d)
        }
        2 => {
            let dx0 = *deriv1.get(i as isize);
            let dx1 = *deriv1.get(i as isize + 1);
            let ddx0 = *deriv2.get(i as isize);
            let ddx1 = *deriv2.get(i as isize + 1);
            hermite_quintic(x0, dx0, ddx0, x1, dx1, ddx1, zeta, dt, d)
        }
        _ => unreachable!("Hermite order must be 0, 1 or 2"),
    }
}

/// `M=0`: linear interpolation (value only, derivatives constant within
/// the segment, zero beyond first order).
fn hermite_linear(x0: Vec3, x1: Vec3, zeta: f64, dt: f64, d: usize) -> Vec3 {
    match d {
        0 => x0 * (1.0 - zeta) + x1 * zeta,
        1 => (x1 - x0) / dt,
        _ => Vec3::zeros(),
    }
}

/// `M=1`: classic cubic Hermite basis, reproducing value and first
/// derivative at both endpoints.
fn hermite_cubic(x0: Vec3, dx0: Vec3, x1: Vec3, dx1: Vec3, zeta: f64, dt: f64, d: usize) -> Vec3 {
    let t = zeta;
    let t2 = t * t;
    let t3 = t2 * t;
    match d {
        0 => {
            let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
            let h10 = t3 - 2.0 * t2 + t;
            let h01 = -2.0 * t3 + 3.0 * t2;
            let h11 = t3 - t2;
            x0 * h00 + dx0 * (h10 * dt) + x1 * h01 + dx1 * (h11 * dt)
        }
        1 => {
            let h00 = 6.0 * t2 - 6.0 * t;
            let h10 = 3.0 * t2 - 4.0 * t + 1.0;
            let h01 = -6.0 * t2 + 6.0 * t;
            let h11 = 3.0 * t2 - 2.0 * t;
            (x0 * h00 + dx0 * (h10 * dt) + x1 * h01 + dx1 * (h11 * dt)) / dt
        }
        2 => {
            let h00 = 12.0 * t - 6.0;
            let h10 = 6.0 * t - 4.0;
            let h01 = -12.0 * t + 6.0;
            let h11 = 6.0 * t - 2.0;
            (x0 * h00 + dx0 * (h10 * dt) + x1 * h01 + dx1 * (h11 * dt)) / (dt * dt)
        }
        _ => Vec3::zeros(),
    }
}

/// `M=2`: quintic Hermite basis, reproducing value, first and second
/// derivative at both endpoints.
#[allow(clippy::too_many_arguments)]
fn hermite_quintic(
    x0: Vec3,
    dx0: Vec3,
    ddx0: Vec3,
    x1: Vec3,
    dx1: Vec3,
    ddx1: Vec3,
    zeta: f64,
    dt: f64,
    d: usize,
) -> Vec3 {
    let t = zeta;
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;
    match d {
        0 => {
            let h0 = 1.0 - 10.0 * t3 + 15.0 * t4 - 6.0 * t5;
            let h1 = t - 6.0 * t3 + 8.0 * t4 - 3.0 * t5;
            let h2 = 0.5 * t2 - 1.5 * t3 + 1.5 * t4 - 0.5 * t5;
            let h3 = 10.0 * t3 - 15.0 * t4 + 6.0 * t5;
            let h4 = -4.0 * t3 + 7.0 * t4 - 3.0 * t5;
            let h5 = 0.5 * t3 - t4 + 0.5 * t5;
            x0 * h0 + dx0 * (h1 * dt) + ddx0 * (h2 * dt * dt) + x1 * h3 + dx1 * (h4 * dt)
                + ddx1 * (h5 * dt * dt)
        }
        1 => {
            let h0 = -30.0 * t2 + 60.0 * t3 - 30.0 * t4;
            let h1 = 1.0 - 18.0 * t2 + 32.0 * t3 - 15.0 * t4;
            let h2 = t - 4.5 * t2 + 6.0 * t3 - 2.5 * t4;
            let h3 = 30.0 * t2 - 60.0 * t3 + 30.0 * t4;
            let h4 = -12.0 * t2 + 28.0 * t3 - 15.0 * t4;
            let h5 = 1.5 * t2 - 4.0 * t3 + 2.5 * t4;
            (x0 * h0 + dx0 * (h1 * dt) + ddx0 * (h2 * dt * dt) + x1 * h3 + dx1 * (h4 * dt)
                + ddx1 * (h5 * dt * dt))
                / dt
        }
        2 => {
            let h0 = -60.0 * t + 180.0 * t2 - 120.0 * t3;
            let h1 = -36.0 * t + 96.0 * t2 - 60.0 * t3;
            let h2 = 1.0 - 9.0 * t + 18.0 * t2 - 10.0 * t3;
            let h3 = 60.0 * t - 180.0 * t2 + 120.0 * t3;
            let h4 = -24.0 * t + 84.0 * t2 - 60.0 * t3;
            let h5 = 3.0 * t - 12.0 * t2 + 10.0 * t3;
            (x0 * h0 + dx0 * (h1 * dt) + ddx0 * (h2 * dt * dt) + x1 * h3 + dx1 * (h4 * dt)
                + ddx1 * (h5 * dt * dt))
                / (dt * dt)
        }
        _ => Vec3::zeros(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubic_hermite_reproduces_endpoint_derivatives() {
        let x0 = Vec3::new(0.0, 0.0, 0.0);
        let x1 = Vec3::new(1.0, 0.0, 0.0);
        let dx0 = Vec3::new(2.0, 0.0, 0.0);
        let dx1 = Vec3::new(0.5, 0.0, 0.0);
        let dt = 1.0;
        let v0 = hermite_cubic(x0, dx0, x1, dx1, 0.0, dt, 1);
        assert!((v0 - dx0).norm() < 1e-12);
        let v1 = hermite_cubic(x0, dx0, x1, dx1, 1.0, dt, 1);
        assert!((v1 - dx1).norm() < 1e-12);
    }

    #[test]
    fn quintic_hermite_reproduces_endpoint_second_derivatives() {
        let x0 = Vec3::new(0.0, 0.0, 0.0);
        let x1 = Vec3::new(1.0, 0.0, 0.0);
        let dx0 = Vec3::new(1.0, 0.0, 0.0);
        let dx1 = Vec3::new(1.0, 0.0, 0.0);
        let ddx0 = Vec3::new(0.3, 0.0, 0.0);
        let ddx1 = Vec3::new(-0.2, 0.0, 0.0);
        let dt = 1.0;
        let a0 = hermite_quintic(x0, dx0, ddx0, x1, dx1, ddx1, 0.0, dt, 2);
        assert!((a0 - ddx0).norm() < 1e-10);
        let a1 = hermite_quintic(x0, dx0, ddx0, x1, dx1, ddx1, 1.0, dt, 2);
        assert!((a1 - ddx1).norm() < 1e-10);
    }
}

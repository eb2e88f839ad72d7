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

//! This crate simulates the dynamics of quantized vortex filaments in a
//! superfluid under the local induction approximation plus an Ewald-split
//! Biot-Savart law, including reconnection and adaptive node refinement.
//!
//! Usage
//! -----
//! Build a filament, a Biot-Savart configuration and a time integrator, then
//! step:
//!
//! ```
//! use std::f64::consts::PI;
//! use vortex_filament::biot_savart::{LongRangeBackend, ParamsBiotSavart};
//! use vortex_filament::cell_list::{NeighborBackend, Periods};
//! use vortex_filament::filament::{DiscretisationMethod, Filament};
//! use vortex_filament::integrator::{ExplicitScheme, NoCallback, Problem, Scheme, TimeIntegrator};
//! use vortex_filament::quadrature::GaussLegendre;
//! use vortex_filament::vec3::Vec3;
//!
//! // A circular vortex ring, discretized with a periodic cubic spline.
//! let n = 32;
//! let radius = 1.0;
//! let points: Vec<Vec3> = (0..n)
//!     .map(|k| {
//!         let theta = 2.0 * PI * k as f64 / n as f64;
//!         Vec3::new(radius * theta.cos(), radius * theta.sin(), 0.0)
//!     })
//!     .collect();
//! let ring = Filament::init(points, DiscretisationMethod::CubicSpline, Vec3::zeros()).unwrap();
//!
//! let params = ParamsBiotSavart::new(
//!     1.0, 1e-4, 0.5, Periods::open(), None, 1.5, 0.5,
//!     GaussLegendre::new(4), GaussLegendre::new(4),
//!     NeighborBackend::Naive, LongRangeBackend::ExactSum,
//! ).unwrap();
//!
//! let problem = Problem::new(vec![ring], params, 0.0, 1e-2);
//! let integrator = TimeIntegrator::new(Scheme::Explicit(ExplicitScheme::Rk4), 1e-3);
//! let mut state = integrator.init(problem).unwrap();
//! let mut callback = NoCallback;
//! state.step(&mut callback);
//! ```

pub mod biot_savart;
pub mod cell_list;
pub mod diagnostics;
pub mod error;
pub mod filament;
pub mod forcing;
pub mod integrator;
pub mod padded;
pub mod persist;
pub mod quadrature;
pub mod reconnection;
mod stencil;
pub mod vec3;

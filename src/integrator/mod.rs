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

//! The time integrator (SPEC_FULL.md §4.6): ties the Biot-Savart evaluator,
//! reconnection engine and refinement pass together into a single stepping
//! loop driven by a configurable scheme and adaptivity criterion.

mod adaptivity;
mod problem;
mod scheme;
mod solver;

pub use adaptivity::{kelvin_wave_period, AdaptivityCriterion};
pub use problem::Problem;
pub use scheme::{ExplicitScheme, FastTerm, MriGarkOrder, Scheme, Tableau};
pub use solver::{NoCallback, SolverState, StepCallback, TimeIntegrator};

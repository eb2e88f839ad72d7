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

//! The initial-value problem a [`crate::integrator::TimeIntegrator`] advances
//! (SPEC_FULL.md §4.6): a set of filaments, the Biot-Savart configuration
//! that governs their self-induced velocity, a time span, and the
//! forcing/dissipation hooks that act on top of it.

use crate::biot_savart::ParamsBiotSavart;
use crate::filament::Filament;
use crate::forcing::ForcingHooks;

pub struct Problem {
    pub filaments: Vec<Filament>,
    pub params: ParamsBiotSavart,
    pub t_start: f64,
    pub t_end: f64,
    pub forcing: ForcingHooks,
}

impl Problem {
    pub fn new(filaments: Vec<Filament>, params: ParamsBiotSavart, t_start: f64, t_end: f64) -> Self {
        Problem {
            filaments,
            params,
            t_start,
            t_end,
            forcing: ForcingHooks::new(),
        }
    }

    pub fn with_forcing(mut self, forcing: ForcingHooks) -> Self {
        self.forcing = forcing;
        self
    }
}

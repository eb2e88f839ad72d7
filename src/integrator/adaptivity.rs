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

//! Adaptive step size criteria (SPEC_FULL.md §4.6).

use crate::biot_savart::lia::EULER_MASCHERONI;
use crate::biot_savart::NodeFields;
use crate::biot_savart::ParamsBiotSavart;
use crate::filament::Filament;

/// How the next `dt` is chosen ahead of a step (SPEC_FULL.md §4.6).
#[derive(Debug, Clone)]
pub enum AdaptivityCriterion {
    /// `dt` stays fixed at whatever `TimeIntegrator::with_dt` set.
    None,
    /// `dt = gamma * T_kw(lambda)`, the local Kelvin-wave period at the
    /// smallest resolved wavelength `lambda` (the minimum node spacing).
    BasedOnSegmentLength { gamma: f64 },
    /// `dt = delta / max|v|` over every node's velocity.
    BasedOnVelocity { delta: f64 },
    /// The tightest (smallest) `dt` proposed by any member criterion.
    Combined(Vec<AdaptivityCriterion>),
}

/// Kelvin-wave period at wavelength `lambda` on a filament of circulation
/// `Gamma`, core radius `a` and core parameter `Delta` (SPEC_FULL.md §4.6):
///
/// `T_kw(lambda) = (2*lambda^2/Gamma) * [ln(lambda/(pi*a)) + 1/2 - (Delta + gamma_euler)]^-1`
pub fn kelvin_wave_period(lambda: f64, circulation: f64, core_radius: f64, core_parameter: f64) -> f64 {
    let log_term = (lambda / (std::f64::consts::PI * core_radius)).ln() + 0.5
        - (core_parameter + EULER_MASCHERONI);
    (2.0 * lambda * lambda / circulation) / log_term
}

impl AdaptivityCriterion {
    /// Propose the next `dt` given the current filaments and their
    /// velocities. Returns `None` only for the `None` variant, in which case
    /// the caller keeps its current `dt` unchanged.
    pub fn next_dt(&self, filaments: &[Filament], fields: &[NodeFields], params: &ParamsBiotSavart) -> Option<f64> {
        match self {
            AdaptivityCriterion::None => None,
            AdaptivityCriterion::BasedOnSegmentLength { gamma } => {
                let lambda = filaments
                    .iter()
                    .map(Filament::minimum_node_distance)
                    .fold(f64::INFINITY, f64::min);
                if !lambda.is_finite() {
                    return None;
                }
                Some(
                    gamma
                        * kelvin_wave_period(
                            lambda,
                            params.circulation,
                            params.core_radius,
                            params.core_parameter,
                        ),
                )
            }
            AdaptivityCriterion::BasedOnVelocity { delta } => {
                let max_speed = fields
                    .iter()
                    .flat_map(|nf| nf.velocity.iter())
                    .map(|v| v.norm())
                    .fold(0.0, f64::max);
                if max_speed <= 0.0 {
                    return None;
                }
                Some(delta / max_speed)
            }
            AdaptivityCriterion::Combined(members) => members
                .iter()
                .filter_map(|m| m.next_dt(filaments, fields, params))
                .fold(None, |acc, dt| Some(acc.map_or(dt, |a: f64| a.min(dt)))),
        }
    }

    /// The maximum per-node displacement `|v|*dt` a step may produce before
    /// it must be rejected (SPEC_FULL.md §4.6 step 3). `None` means this
    /// criterion imposes no ceiling (the `None` variant never rejects).
    pub fn max_displacement_ceiling(&self, filaments: &[Filament]) -> Option<f64> {
        match self {
            AdaptivityCriterion::None => None,
            // `dt` was chosen as `gamma * T_kw(lambda)`; a node should not
            // move farther in one step than a `gamma`-fraction of the
            // wavelength that period was computed for.
            AdaptivityCriterion::BasedOnSegmentLength { gamma } => {
                let lambda = filaments
                    .iter()
                    .map(Filament::minimum_node_distance)
                    .fold(f64::INFINITY, f64::min);
                if !lambda.is_finite() {
                    None
                } else {
                    Some(gamma * lambda)
                }
            }
            // `dt = delta / max|v|` is exactly the `dt` for which
            // `max|v|*dt == delta`; `delta` is the ceiling by construction.
            AdaptivityCriterion::BasedOnVelocity { delta } => Some(*delta),
            AdaptivityCriterion::Combined(members) => members
                .iter()
                .filter_map(|m| m.max_displacement_ceiling(filaments))
                .fold(None, |acc, d| Some(acc.map_or(d, |a: f64| a.min(d)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kelvin_wave_period_grows_with_wavelength_squared_in_the_dominant_term() {
        let t1 = kelvin_wave_period(1e-3, 1.0, 1e-4, 0.5);
        let t2 = kelvin_wave_period(2e-3, 1.0, 1e-4, 0.5);
        assert!(t2 > t1);
    }

    #[test]
    fn combined_picks_the_smallest_member_proposal() {
        let combined = AdaptivityCriterion::Combined(vec![
            AdaptivityCriterion::BasedOnVelocity { delta: 1.0 },
            AdaptivityCriterion::BasedOnVelocity { delta: 0.1 },
        ]);
        let fields = vec![NodeFields {
            velocity: vec![crate::vec3::Vec3::new(1.0, 0.0, 0.0)],
            streamfunction: vec![0.0],
        }];
        let params = test_params();
        let dt = combined.next_dt(&[], &fields, &params).unwrap();
        assert!((dt - 0.1).abs() < 1e-12);
    }

    fn test_params() -> ParamsBiotSavart {
        use crate::cell_list::{NeighborBackend, Periods};
        use crate::biot_savart::LongRangeBackend;
        use crate::quadrature::GaussLegendre;
        ParamsBiotSavart::new(
            1.0,
            1e-4,
            0.5,
            Periods::open(),
            None,
            1.5,
            0.5,
            GaussLegendre::new(4),
            GaussLegendre::new(4),
            NeighborBackend::Naive,
            LongRangeBackend::ExactSum,
        )
        .unwrap()
    }
}

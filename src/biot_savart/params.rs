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

//! Immutable Biot-Savart configuration (SPEC_FULL.md §3, §6).

use crate::cell_list::{NeighborBackend, Periods};
use crate::error::ConfigError;
use crate::quadrature::GaussLegendre;

/// Long-range backend selection (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy)]
pub enum LongRangeBackend {
    /// Direct summation over Fourier modes; exact but `O(Nmodes * Nnodes)`,
    /// used as a correctness oracle (SPEC_FULL.md §8 scenario 4).
    ExactSum,
    /// Nonuniform FFT: Gaussian-gridding deposition onto an oversampled
    /// grid, an ordinary FFT, and interpolation back to node positions.
    Nufft {
        tolerance: f64,
        support: usize,
        oversampling: f64,
    },
}

/// Biot-Savart Ewald-split parameters (SPEC_FULL.md §3, §6). Validated once
/// at construction; every field downstream treats a `ParamsBiotSavart` as
/// immutable.
#[derive(Debug, Clone)]
pub struct ParamsBiotSavart {
    pub circulation: f64,
    pub core_radius: f64,
    pub core_parameter: f64,
    pub periods: Periods,
    pub grid_sizes: Option<[usize; 3]>,
    pub ewald_alpha: f64,
    pub short_cutoff: f64,
    pub quadrature_short: GaussLegendre,
    pub quadrature_long: GaussLegendre,
    pub backend_short: NeighborBackend,
    pub backend_long: LongRangeBackend,
}

impl ParamsBiotSavart {
    /// Construct and validate (SPEC_FULL.md §7 category 1: fatal
    /// configuration errors, reported eagerly rather than at first use).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        circulation: f64,
        core_radius: f64,
        core_parameter: f64,
        periods: Periods,
        grid_sizes: Option<[usize; 3]>,
        ewald_alpha: f64,
        short_cutoff: f64,
        quadrature_short: GaussLegendre,
        quadrature_long: GaussLegendre,
        backend_short: NeighborBackend,
        backend_long: LongRangeBackend,
    ) -> Result<Self, ConfigError> {
        if circulation <= 0.0 {
            return Err(ConfigError::NonPositiveCirculation(circulation));
        }
        if core_radius <= 0.0 {
            return Err(ConfigError::NonPositiveCoreRadius(core_radius));
        }
        if !(0.0..=1.0).contains(&core_parameter) {
            return Err(ConfigError::CoreParameterOutOfRange(core_parameter));
        }
        if ewald_alpha <= 0.0 {
            return Err(ConfigError::NonPositiveAlpha(ewald_alpha));
        }
        let is_periodic: Vec<bool> = periods.lengths.iter().map(|l| l.is_some()).collect();
        if is_periodic.iter().any(|&p| p) && !is_periodic.iter().all(|&p| p) {
            return Err(ConfigError::MixedPeriodicity([
                is_periodic[0],
                is_periodic[1],
                is_periodic[2],
            ]));
        }
        if periods.is_periodic() {
            let half_min_period = 0.5
                * periods
                    .lengths
                    .iter()
                    .filter_map(|l| *l)
                    .fold(f64::INFINITY, f64::min);
            if short_cutoff >= half_min_period {
                return Err(ConfigError::CutoffTooLarge {
                    rcut: short_cutoff,
                    half_min_period,
                });
            }
            if let Some(n) = grid_sizes {
                for (axis, &size) in n.iter().enumerate() {
                    if size % 2 != 0 {
                        return Err(ConfigError::GridSizeNotEven { axis, size });
                    }
                }
            }
        }
        Ok(ParamsBiotSavart {
            circulation,
            core_radius,
            core_parameter,
            periods,
            grid_sizes,
            ewald_alpha,
            short_cutoff,
            quadrature_short,
            quadrature_long,
            backend_short,
            backend_long,
        })
    }

    pub fn is_periodic(&self) -> bool {
        self.periods.is_periodic()
    }

    /// `kmax` along each periodic axis: `(Ni/2) * 2*pi/Li`.
    pub fn kmax(&self) -> Option<[f64; 3]> {
        let n = self.grid_sizes?;
        let mut out = [0.0; 3];
        for axis in 0..3 {
            let l = self.periods.lengths[axis]?;
            out[axis] = (n[axis] / 2) as f64 * 2.0 * std::f64::consts::PI / l;
        }
        Some(out)
    }

    /// Convenience constructor sharing every field with `self` except
    /// circulation, for multi-ring scenarios that want a shared grid/cache
    /// keyed by the (unchanged) grid size (SPEC_FULL.md §4 supplemented
    /// feature, used by the leapfrogging-rings test scenario).
    pub fn rescale(&self, new_circulation: f64) -> Result<Self, ConfigError> {
        let mut copy = self.clone();
        if new_circulation <= 0.0 {
            return Err(ConfigError::NonPositiveCirculation(new_circulation));
        }
        copy.circulation = new_circulation;
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_params() -> Result<ParamsBiotSavart, ConfigError> {
        ParamsBiotSavart::new(
            1.0,
            1e-4,
            0.5,
            Periods::periodic(2.0 * std::f64::consts::PI, 2.0 * std::f64::consts::PI, 2.0 * std::f64::consts::PI),
            Some([32, 32, 32]),
            1.5,
            1.0,
            GaussLegendre::new(4),
            GaussLegendre::new(4),
            NeighborBackend::Naive,
            LongRangeBackend::ExactSum,
        )
    }

    #[test]
    fn valid_configuration_is_accepted() {
        assert!(valid_params().is_ok());
    }

    #[test]
    fn cutoff_too_large_is_rejected() {
        let err = ParamsBiotSavart::new(
            1.0,
            1e-4,
            0.5,
            Periods::periodic(1.0, 1.0, 1.0),
            Some([8, 8, 8]),
            1.0,
            0.9,
            GaussLegendre::new(4),
            GaussLegendre::new(4),
            NeighborBackend::Naive,
            LongRangeBackend::ExactSum,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::CutoffTooLarge { .. }));
    }

    #[test]
    fn odd_grid_size_is_rejected() {
        let err = ParamsBiotSavart::new(
            1.0,
            1e-4,
            0.5,
            Periods::periodic(1.0, 1.0, 1.0),
            Some([9, 8, 8]),
            1.0,
            0.1,
            GaussLegendre::new(4),
            GaussLegendre::new(4),
            NeighborBackend::Naive,
            LongRangeBackend::ExactSum,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::GridSizeNotEven { axis: 0, size: 9 }));
    }

    #[test]
    fn rescale_preserves_grid_and_cutoff() {
        let base = valid_params().unwrap();
        let scaled = base.rescale(2.5).unwrap();
        assert_eq!(scaled.circulation, 2.5);
        assert_eq!(scaled.short_cutoff, base.short_cutoff);
    }
}

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

//! Forcing/dissipation hooks (SPEC_FULL.md §4.7): additive external fields,
//! curvature-driven stretching velocity, and normal-fluid mutual friction.
//! Each hook is a plain closure rather than a trait object hierarchy, in
//! keeping with design note §9 ("dynamic dispatch... as a tagged variant
//! rather than a deep class hierarchy" -- here there is nothing to tag, so a
//! handful of `Option<Box<dyn Fn>>` fields suffice).

use crate::biot_savart::NodeFields;
use crate::filament::Filament;
use crate::vec3::Vec3;

/// An external velocity field, additive to the self-induced velocity
/// (SPEC_FULL.md §4.7). Takes a node position and the current simulation
/// time.
pub type VelocityField = Box<dyn Fn(Vec3, f64) -> Vec3 + Send + Sync>;

/// An external streamfunction field. Sampled with an extra factor of 2 when
/// added to the node streamfunction, so that the half-sum kinetic-energy
/// identity (`E = Gamma/2 * sum psi . v`) stays correct once the external
/// contribution is mixed in (SPEC_FULL.md §4.7).
pub type StreamfunctionField = Box<dyn Fn(Vec3, f64) -> f64 + Send + Sync>;

/// Stretching velocity magnitude as a function of the local curvature
/// magnitude `kappa` (SPEC_FULL.md §4.7): the node is pushed along `-n_hat`
/// by `v_L(kappa)`.
pub type StretchingVelocity = Box<dyn Fn(f64) -> f64 + Send + Sync>;

/// Normal-fluid velocity field sampled at a node position and time, used by
/// [`MutualFriction`].
pub type NormalFluidVelocity = Box<dyn Fn(Vec3, f64) -> Vec3 + Send + Sync>;

/// Mutual-friction coupling to a user-supplied normal-fluid velocity field
/// (SPEC_FULL.md §4.7), following the standard HVBK law
///
/// `v_L = v_s + alpha (v_n - v_s) x t_hat - alpha' t_hat x ((v_n - v_s) x t_hat)`.
///
/// `v_s` (the plain self-induced velocity) is preserved for diagnostics; the
/// time stepper advects nodes by `v_L` instead once this hook is present.
pub struct MutualFriction {
    pub alpha: f64,
    pub alpha_prime: f64,
    pub normal_fluid_velocity: NormalFluidVelocity,
}

impl MutualFriction {
    pub fn new(alpha: f64, alpha_prime: f64, normal_fluid_velocity: NormalFluidVelocity) -> Self {
        MutualFriction {
            alpha,
            alpha_prime,
            normal_fluid_velocity,
        }
    }

    /// The actual line velocity `v_L` given the vortex self-induced velocity
    /// `v_s` at node position `x` with unit tangent `t_hat`.
    pub fn line_velocity(&self, v_s: Vec3, x: Vec3, t_hat: Vec3, time: f64) -> Vec3 {
        let v_n = (self.normal_fluid_velocity)(x, time);
        let rel = v_n - v_s;
        v_s + rel.cross(&t_hat) * self.alpha
            - t_hat.cross(&rel.cross(&t_hat)) * self.alpha_prime
    }
}

/// Bundle of optional forcing/dissipation hooks passed to
/// [`crate::integrator::TimeIntegrator::init`] (SPEC_FULL.md §4.6, §4.7).
#[derive(Default)]
pub struct ForcingHooks {
    pub external_velocity: Option<VelocityField>,
    pub external_streamfunction: Option<StreamfunctionField>,
    pub stretching_velocity: Option<StretchingVelocity>,
    pub mutual_friction: Option<MutualFriction>,
}

impl ForcingHooks {
    pub fn new() -> Self {
        ForcingHooks::default()
    }

    pub fn with_external_velocity(mut self, f: VelocityField) -> Self {
        self.external_velocity = Some(f);
        self
    }

    pub fn with_external_streamfunction(mut self, f: StreamfunctionField) -> Self {
        self.external_streamfunction = Some(f);
        self
    }

    pub fn with_stretching_velocity(mut self, f: StretchingVelocity) -> Self {
        self.stretching_velocity = Some(f);
        self
    }

    pub fn with_mutual_friction(mut self, mf: MutualFriction) -> Self {
        self.mutual_friction = Some(mf);
        self
    }

    pub fn has_mutual_friction(&self) -> bool {
        self.mutual_friction.is_some()
    }

    /// Add the external velocity/streamfunction and stretching-velocity
    /// contributions to `fields` in place, evaluated at the current node
    /// positions and simulation time `t` (SPEC_FULL.md §4.7). Mutual
    /// friction is applied separately by the time stepper (it needs to keep
    /// `v_s` around for diagnostics, see [`MutualFriction::line_velocity`]).
    pub fn apply_additive(&self, filaments: &[Filament], fields: &mut [NodeFields], t: f64) {
        if self.external_velocity.is_none()
            && self.external_streamfunction.is_none()
            && self.stretching_velocity.is_none()
        {
            return;
        }
        for (fi, f) in filaments.iter().enumerate() {
            for i in 1..=f.len() {
                let x = *f.nodes().get(i as isize);
                if let Some(vext) = &self.external_velocity {
                    fields[fi].velocity[i - 1] += vext(x, t);
                }
                if let Some(psi_ext) = &self.external_streamfunction {
                    fields[fi].streamfunction[i - 1] += 2.0 * psi_ext(x, t);
                }
                if let Some(v_l) = &self.stretching_velocity {
                    let kappa_vec = f.curvature_vector(i, 0.0);
                    let kappa = kappa_vec.norm();
                    if kappa > 0.0 {
                        let n_hat = kappa_vec / kappa;
                        fields[fi].velocity[i - 1] += -n_hat * v_l(kappa);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutual_friction_reduces_to_self_velocity_when_normal_fluid_matches() {
        let mf = MutualFriction::new(0.1, 0.05, Box::new(|_x, _t| Vec3::new(1.0, 2.0, 3.0)));
        let v_s = Vec3::new(1.0, 2.0, 3.0);
        let t_hat = Vec3::new(0.0, 0.0, 1.0);
        let v_l = mf.line_velocity(v_s, Vec3::zeros(), t_hat, 0.0);
        assert!((v_l - v_s).norm() < 1e-12);
    }

    #[test]
    fn mutual_friction_adds_transverse_component_when_slipping() {
        let mf = MutualFriction::new(0.5, 0.0, Box::new(|_x, _t| Vec3::zeros()));
        let v_s = Vec3::new(1.0, 0.0, 0.0);
        let t_hat = Vec3::new(0.0, 0.0, 1.0);
        let v_l = mf.line_velocity(v_s, Vec3::zeros(), t_hat, 0.0);
        // rel = v_n - v_s = (-1,0,0); rel x t_hat = (-1,0,0)x(0,0,1) = (0,1,0)*(-1)... check magnitude nonzero
        assert!((v_l - v_s).norm() > 1e-12);
    }
}

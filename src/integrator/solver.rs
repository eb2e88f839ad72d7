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

//! The time-stepping loop itself (SPEC_FULL.md §4.6): advection, periodic
//! folding, reconnection, refinement and the velocity/streamfunction
//! recompute that must run once per step, in that order.

use log::{info, warn};

use crate::biot_savart::{BiotSavartCache, EvaluatorFlags, NodeFields, ParamsBiotSavart};
use crate::cell_list::NeighborBackend;
use crate::error::{ConfigError, StepStatus, TerminationReason};
use crate::filament::refinement::{self, RefinementCriterion};
use crate::filament::Filament;
use crate::forcing::ForcingHooks;
use crate::reconnection::{ReconnectionCriterion, ReconnectionEngine, ReconnectionStats};
use crate::vec3::Vec3;

use super::adaptivity::AdaptivityCriterion;
use super::problem::Problem;
use super::scheme::{ExplicitScheme, FastTerm, MriGarkOrder, Scheme};

#[cfg(not(target_arch = "wasm32"))]
type ThreadPool = scoped_threadpool::Pool;
#[cfg(target_arch = "wasm32")]
struct ThreadPool;

#[cfg(not(target_arch = "wasm32"))]
fn new_thread_pool(num_threads: u32) -> ThreadPool {
    scoped_threadpool::Pool::new(num_threads.max(1))
}
#[cfg(target_arch = "wasm32")]
fn new_thread_pool(_num_threads: u32) -> ThreadPool {
    ThreadPool
}

/// Largest per-node displacement between `base` and `advanced`, used by the
/// adaptivity ceiling check (SPEC_FULL.md §4.6 step 3). Filament count and
/// per-filament node count are identical between the two (advection never
/// inserts/removes nodes), so positions line up by index.
fn max_node_displacement(base: &[Filament], advanced: &[Filament]) -> f64 {
    base.iter()
        .zip(advanced.iter())
        .flat_map(|(b, a)| {
            b.nodes()
                .as_visible_slice()
                .iter()
                .zip(a.nodes().as_visible_slice().iter())
                .map(|(p0, p1)| (p1 - p0).norm())
        })
        .fold(0.0, f64::max)
}

/// Hooks a caller may implement to observe or perturb a [`SolverState`]
/// around a step (SPEC_FULL.md §4.6 "Callback contract"). Both methods
/// default to doing nothing.
pub trait StepCallback {
    /// Runs before the step advances anything. May append new filaments
    /// (and matching [`NodeFields`] entries) to `state`, e.g. to inject a
    /// vortex ring mid-run. Must not mutate existing nodes, and must not
    /// read `state.fields` for anything but its length: the velocities
    /// still describe the *previous* step until this one completes.
    fn affect_before(&mut self, _state: &mut SolverState) {}

    /// Runs after the step has advected, folded, reconnected, refined and
    /// recomputed every per-node quantity. May read anything on `state`;
    /// must not mutate node arrays.
    fn callback_after(&mut self, _state: &SolverState) {}
}

/// A callback that does nothing, for callers with no use for either hook.
pub struct NoCallback;
impl StepCallback for NoCallback {}

/// Builder for a [`SolverState`] (SPEC_FULL.md §4.6 `TimeIntegrator::init`).
pub struct TimeIntegrator {
    scheme: Scheme,
    dt: f64,
    dt_min: f64,
    refinement: RefinementCriterion,
    reconnection: Option<(ReconnectionCriterion, NeighborBackend)>,
    adaptivity: AdaptivityCriterion,
    fold_periodic: bool,
    lia_only: bool,
    num_threads: u32,
}

impl TimeIntegrator {
    pub fn new(scheme: Scheme, dt: f64) -> Self {
        TimeIntegrator {
            scheme,
            dt,
            dt_min: 0.0,
            refinement: RefinementCriterion::NoRefinement,
            reconnection: None,
            adaptivity: AdaptivityCriterion::None,
            fold_periodic: false,
            lia_only: false,
            num_threads: 1,
        }
    }

    pub fn with_dt_min(mut self, dt_min: f64) -> Self {
        self.dt_min = dt_min;
        self
    }

    pub fn with_refinement(mut self, refinement: RefinementCriterion) -> Self {
        self.refinement = refinement;
        self
    }

    pub fn with_reconnection(mut self, criterion: ReconnectionCriterion, backend: NeighborBackend) -> Self {
        self.reconnection = Some((criterion, backend));
        self
    }

    pub fn with_adaptivity(mut self, adaptivity: AdaptivityCriterion) -> Self {
        self.adaptivity = adaptivity;
        self
    }

    pub fn with_fold_periodic(mut self, fold_periodic: bool) -> Self {
        self.fold_periodic = fold_periodic;
        self
    }

    pub fn with_lia_only(mut self, lia_only: bool) -> Self {
        self.lia_only = lia_only;
        self
    }

    pub fn with_num_threads(mut self, num_threads: u32) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Validate the configuration against `problem` and build the initial
    /// [`SolverState`] (SPEC_FULL.md §7 category 1).
    pub fn init(self, problem: Problem) -> Result<SolverState, ConfigError> {
        if !matches!(self.adaptivity, AdaptivityCriterion::None) && matches!(self.scheme, Scheme::MriGark { .. }) {
            // The multirate substep count is sized for a fixed outer dt at
            // construction time; letting adaptivity rescale dt underneath it
            // would silently change the fast/slow time-scale separation the
            // scheme was tuned for.
            return Err(ConfigError::AdaptivityIncompatibleWithScheme);
        }
        if self.lia_only {
            if let Some(fast_term) = self.scheme.fast_term() {
                if !fast_term.compatible_with_lia_only() {
                    return Err(ConfigError::LiaOnlyWithNonLocalFastTerm);
                }
            }
        }

        let bs_cache = BiotSavartCache::new(&problem.params);
        let mut state = SolverState {
            filaments: problem.filaments,
            fields: Vec::new(),
            time: problem.t_start,
            step: 0,
            rejection_count: 0,
            reconnection_stats: ReconnectionStats::default(),
            params: problem.params,
            t_end: problem.t_end,
            forcing: problem.forcing,
            scheme: self.scheme,
            dt: self.dt,
            dt_min: self.dt_min,
            refinement: self.refinement,
            reconnection: self
                .reconnection
                .map(|(criterion, backend)| ReconnectionEngine::new(criterion, backend)),
            adaptivity: self.adaptivity,
            fold_periodic: self.fold_periodic,
            lia_only: self.lia_only,
            bs_cache,
            thread_pool: new_thread_pool(self.num_threads),
        };
        let flags = state.evaluator_flags();
        let t0 = state.time;
        let filaments = state.filaments.clone();
        state.fields = state.evaluate_velocity(&filaments, flags, true, t0);
        Ok(state)
    }
}

/// Owns every piece of mutable state a running simulation needs: the
/// filaments, the per-node velocity/streamfunction fields aligned with
/// them, the Biot-Savart caches, and the bookkeeping counters
/// (SPEC_FULL.md §4.6 `SolverState`).
pub struct SolverState {
    pub filaments: Vec<Filament>,
    pub fields: Vec<NodeFields>,
    pub time: f64,
    pub step: usize,
    pub rejection_count: usize,
    pub reconnection_stats: ReconnectionStats,
    params: ParamsBiotSavart,
    t_end: f64,
    forcing: ForcingHooks,
    scheme: Scheme,
    dt: f64,
    dt_min: f64,
    refinement: RefinementCriterion,
    reconnection: Option<ReconnectionEngine>,
    adaptivity: AdaptivityCriterion,
    fold_periodic: bool,
    lia_only: bool,
    bs_cache: BiotSavartCache,
    thread_pool: ThreadPool,
}

impl SolverState {
    pub fn params(&self) -> &ParamsBiotSavart {
        &self.params
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    fn evaluator_flags(&self) -> EvaluatorFlags {
        if self.lia_only {
            EvaluatorFlags::LiaOnly
        } else {
            EvaluatorFlags::Full
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn compute_on_nodes(&mut self, filaments: &[Filament], flags: EvaluatorFlags, want_psi: bool) -> Vec<NodeFields> {
        self.bs_cache
            .compute_on_nodes_parallel(filaments, &self.params, flags, want_psi, &mut self.thread_pool)
    }
    #[cfg(target_arch = "wasm32")]
    fn compute_on_nodes(&mut self, filaments: &[Filament], flags: EvaluatorFlags, want_psi: bool) -> Vec<NodeFields> {
        self.bs_cache.compute_on_nodes(filaments, &self.params, flags, want_psi)
    }

    /// The full right-hand side at `filaments`/`t`: self-induced velocity
    /// under `flags`, plus additive forcing, plus mutual friction
    /// substituted in for the advection velocity (SPEC_FULL.md §4.7).
    fn evaluate_velocity(
        &mut self,
        filaments: &[Filament],
        flags: EvaluatorFlags,
        want_psi: bool,
        t: f64,
    ) -> Vec<NodeFields> {
        let mut fields = self.compute_on_nodes(filaments, flags, want_psi);
        self.forcing.apply_additive(filaments, &mut fields, t);
        if let Some(mf) = &self.forcing.mutual_friction {
            for (fi, f) in filaments.iter().enumerate() {
                for i in 1..=f.len() {
                    let x = *f.nodes().get(i as isize);
                    let t_hat = f.unit_tangent(i, 0.0);
                    let v_s = fields[fi].velocity[i - 1];
                    fields[fi].velocity[i - 1] = mf.line_velocity(v_s, x, t_hat, t);
                }
            }
        }
        fields
    }

    /// Advect every filament's nodes by `dt * sum(coeffs[k] * slopes[k])`,
    /// cloning `base` and rebuilding each filament's knots/coefficients in
    /// place. Returns `None` (a rejected step) if any resulting coordinate
    /// is non-finite.
    fn advect(&self, base: &[Filament], dt: f64, coeffs: &[f64], slopes: &[Vec<Vec<Vec3>>]) -> Option<Vec<Filament>> {
        let mut out = Vec::with_capacity(base.len());
        for (fi, f) in base.iter().enumerate() {
            let mut points: Vec<Vec3> = f.nodes().as_visible_slice().to_vec();
            for (stage, &c) in coeffs.iter().enumerate() {
                if c == 0.0 {
                    continue;
                }
                let slope = &slopes[stage][fi];
                for (p, v) in points.iter_mut().zip(slope.iter()) {
                    *p += *v * (dt * c);
                }
            }
            if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite() || !p.z.is_finite()) {
                return None;
            }
            let mut new_f = f.clone();
            new_f.replace_nodes(points).ok()?;
            out.push(new_f);
        }
        Some(out)
    }

    fn velocities(fields: &[NodeFields]) -> Vec<Vec<Vec3>> {
        fields.iter().map(|nf| nf.velocity.clone()).collect()
    }

    /// One attempt at advancing `base`/`base_fields` by `dt`; `None` means
    /// the step is rejected and must be retried at a smaller `dt`.
    fn advance(&mut self, base: &[Filament], base_fields: &[NodeFields], dt: f64) -> Option<Vec<Filament>> {
        match self.scheme {
            Scheme::Explicit(es) => self.advance_explicit(es, base, base_fields, dt),
            Scheme::Imex { fast_term } => self.advance_imex(fast_term, base, base_fields, dt),
            Scheme::MriGark {
                order,
                fast_term,
                inner_substeps,
            } => self.advance_mri_gark(order, fast_term, inner_substeps, base, base_fields, dt),
        }
    }

    fn advance_explicit(
        &mut self,
        es: ExplicitScheme,
        base: &[Filament],
        base_fields: &[NodeFields],
        dt: f64,
    ) -> Option<Vec<Filament>> {
        let tableau = es.tableau();
        let mut slopes: Vec<Vec<Vec<Vec3>>> = vec![Self::velocities(base_fields)];
        for k in 1..tableau.c.len() {
            let stage_filaments = self.advect(base, dt, &tableau.a[k], &slopes)?;
            let flags = self.evaluator_flags();
            let t_stage = self.time + tableau.c[k] * dt;
            let stage_fields = self.evaluate_velocity(&stage_filaments, flags, false, t_stage);
            slopes.push(Self::velocities(&stage_fields));
        }
        self.advect(base, dt, &tableau.b, &slopes)
    }

    /// IMEX fast/slow split (SPEC_FULL.md §4.6). The slow term is treated
    /// with forward Euler; the fast term (always the stiff, purely
    /// rotational LIA contribution or LIA+short-range) gets a
    /// predictor/trapezoidal correction, which is unconditionally stable
    /// for a term that only rotates the tangent and never grows it.
    fn advance_imex(
        &mut self,
        fast_term: FastTerm,
        base: &[Filament],
        base_fields: &[NodeFields],
        dt: f64,
    ) -> Option<Vec<Filament>> {
        let v_fast_n = {
            let flags = fast_term.fast_flags();
            let fields = self.evaluate_velocity(base, flags, false, self.time);
            Self::velocities(&fields)
        };
        let v_slow_n = Self::velocities(base_fields);
        // Predictor: full forward-Euler step.
        let predictor = self.advect(base, dt, &[1.0, 1.0], &[v_slow_n.clone(), v_fast_n.clone()])?;
        let v_fast_pred = {
            let flags = fast_term.fast_flags();
            let t1 = self.time + dt;
            let fields = self.evaluate_velocity(&predictor, flags, false, t1);
            Self::velocities(&fields)
        };
        // Corrector: slow term stays forward Euler, fast term becomes the
        // trapezoidal average of its value at both ends of the step.
        self.advect(
            base,
            dt,
            &[1.0, 0.5, 0.5],
            &[v_slow_n, v_fast_n, v_fast_pred],
        )
    }

    /// Multirate GARK (SPEC_FULL.md §4.6): `order.num_stages()` outer
    /// stages of length `dt/s`, each driving `inner_substeps` explicit
    /// (forward-Euler) micro-steps of the fast term, forced by an
    /// affine-in-`tau` combination of the slow velocities observed at every
    /// outer stage so far.
    fn advance_mri_gark(
        &mut self,
        order: MriGarkOrder,
        fast_term: FastTerm,
        inner_substeps: usize,
        base: &[Filament],
        base_fields: &[NodeFields],
        dt: f64,
    ) -> Option<Vec<Filament>> {
        let (gamma0, gamma1) = order.coefficients();
        let s = order.num_stages();
        let cdt = dt / s as f64;
        let inner_substeps = inner_substeps.max(1);
        let hfast = cdt / inner_substeps as f64;

        let mut current = base.to_vec();
        let mut v_slow: Vec<Vec<Vec<Vec3>>> = vec![Self::velocities(base_fields)];

        for k in 0..s {
            if k > 0 {
                let t_stage = self.time + k as f64 * cdt;
                let fields = self.evaluate_velocity(&current, fast_term.slow_flags(), false, t_stage);
                v_slow.push(Self::velocities(&fields));
            }
            for sub in 0..inner_substeps {
                let tau = (sub as f64 + 0.5) / inner_substeps as f64;
                let mut forcing: Vec<Vec<Vec3>> = current
                    .iter()
                    .map(|f| vec![Vec3::zeros(); f.len()])
                    .collect();
                for i in 0..=k {
                    let coeff = gamma0[k][i] + tau * gamma1[k][i];
                    if coeff == 0.0 {
                        continue;
                    }
                    for (fi, slope) in v_slow[i].iter().enumerate() {
                        for (out, v) in forcing[fi].iter_mut().zip(slope.iter()) {
                            *out += *v * coeff;
                        }
                    }
                }
                let advanced = self.advect(&current, hfast, &[1.0], std::slice::from_ref(&forcing))?;
                current = advanced;
            }
        }
        Some(current)
    }

    /// Run one step of the simulation (SPEC_FULL.md §4.6): advect, fold,
    /// reconnect, refine, recompute fields, propose the next `dt`.
    pub fn step(&mut self, callback: &mut dyn StepCallback) -> StepStatus {
        if self.time >= self.t_end {
            return StepStatus::Terminated(TerminationReason::EndOfSpan);
        }
        if self.filaments.is_empty() {
            return StepStatus::Terminated(TerminationReason::NoVorticesLeft);
        }

        callback.affect_before(self);

        let base = self.filaments.clone();
        let base_fields = self.fields.clone();

        let mut dt_used;
        loop {
            dt_used = self.dt.min(self.t_end - self.time);
            match self.advance(&base, &base_fields, dt_used) {
                Some(new_filaments) => {
                    if let Some(ceiling) = self.adaptivity.max_displacement_ceiling(&base) {
                        let max_disp = max_node_displacement(&base, &new_filaments);
                        if max_disp > ceiling {
                            self.rejection_count += 1;
                            self.dt *= 0.5;
                            warn!(
                                "step rejected (max displacement {:.3e} exceeds ceiling {:.3e}), halving dt to {}",
                                max_disp, ceiling, self.dt
                            );
                            if self.dt < self.dt_min {
                                return StepStatus::Terminated(TerminationReason::DtBelowMinimum);
                            }
                            continue;
                        }
                    }
                    self.filaments = new_filaments;
                    break;
                }
                None => {
                    self.rejection_count += 1;
                    self.dt *= 0.5;
                    warn!("step rejected (non-finite advance), halving dt to {}", self.dt);
                    if self.dt < self.dt_min {
                        return StepStatus::Terminated(TerminationReason::DtBelowMinimum);
                    }
                }
            }
        }

        if self.fold_periodic {
            for f in &mut self.filaments {
                if f.fold_periodic(&self.params.periods) {
                    f.update_coefficients();
                }
            }
        }

        if let Some(engine) = &self.reconnection {
            // `engine.step` both fires `on_change` as it goes and, before
            // returning, swap-removes every filament it flagged `Removed`
            // (degenerate children, the donor side of a merge) -- so
            // `self.filaments` already holds only the survivors and per-node
            // fields below are recomputed from that same list.
            let stats = engine.step(&mut self.filaments, &self.params.periods, &mut |_idx, _change| {});
            self.reconnection_stats.reconnections_performed += stats.reconnections_performed;
            self.reconnection_stats.length_lost += stats.length_lost;
            self.reconnection_stats.filaments_removed += stats.filaments_removed;
            self.reconnection_stats.length_removed += stats.length_removed;
            if stats.reconnections_performed > 0 {
                info!(
                    "reconnection: {} event(s), {:.3e} length lost, {} filament(s) removed",
                    stats.reconnections_performed, stats.length_lost, stats.filaments_removed
                );
            }
        }

        let mut degenerate = Vec::new();
        for (fi, f) in self.filaments.iter_mut().enumerate() {
            let p = refinement::plan(f, &self.refinement);
            if p.is_empty() {
                continue;
            }
            if refinement::apply(f, &p).is_err() {
                degenerate.push(fi);
            }
        }
        for &fi in degenerate.iter().rev() {
            self.filaments.swap_remove(fi);
        }

        if self.filaments.is_empty() {
            return StepStatus::Terminated(TerminationReason::NoVorticesLeft);
        }

        self.time += dt_used;
        self.step += 1;

        let flags = self.evaluator_flags();
        let t = self.time;
        let filaments = self.filaments.clone();
        self.fields = self.evaluate_velocity(&filaments, flags, true, t);

        if let Some(next_dt) = self.adaptivity.next_dt(&self.filaments, &self.fields, &self.params) {
            self.dt = next_dt.max(self.dt_min);
        }

        callback.callback_after(self);

        if self.time >= self.t_end {
            StepStatus::Terminated(TerminationReason::EndOfSpan)
        } else {
            StepStatus::Continuing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biot_savart::LongRangeBackend;
    use crate::cell_list::Periods;
    use crate::filament::DiscretisationMethod;
    use crate::quadrature::GaussLegendre;
    use std::f64::consts::PI;

    fn ring(radius: f64, n: usize) -> Filament {
        let points: Vec<Vec3> = (0..n)
            .map(|k| {
                let theta = 2.0 * PI * k as f64 / n as f64;
                Vec3::new(radius * theta.cos(), radius * theta.sin(), 0.0)
            })
            .collect();
        Filament::init(points, DiscretisationMethod::CubicSpline, Vec3::zeros()).unwrap()
    }

    fn open_params() -> ParamsBiotSavart {
        ParamsBiotSavart::new(
            1.0,
            1e-3,
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

    #[test]
    fn a_single_ring_under_euler_advances_time_and_stays_closed() {
        let problem = Problem::new(vec![ring(1.0, 24)], open_params(), 0.0, 1e-2);
        let integrator = TimeIntegrator::new(Scheme::Explicit(ExplicitScheme::Euler), 1e-3);
        let mut state = integrator.init(problem).unwrap();
        let mut cb = NoCallback;
        for _ in 0..5 {
            let status = state.step(&mut cb);
            if matches!(status, StepStatus::Terminated(_)) {
                break;
            }
        }
        assert!(state.time > 0.0);
        assert_eq!(state.filaments.len(), 1);
    }

    #[test]
    fn end_of_span_terminates_the_loop() {
        let problem = Problem::new(vec![ring(1.0, 16)], open_params(), 0.0, 1e-3);
        let integrator = TimeIntegrator::new(Scheme::Explicit(ExplicitScheme::Rk4), 1e-3);
        let mut state = integrator.init(problem).unwrap();
        let mut cb = NoCallback;
        let status = state.step(&mut cb);
        assert_eq!(status, StepStatus::Terminated(TerminationReason::EndOfSpan));
    }

    #[test]
    fn lia_only_with_non_local_fast_term_is_rejected_at_init() {
        let problem = Problem::new(vec![ring(1.0, 16)], open_params(), 0.0, 1e-2);
        let integrator = TimeIntegrator::new(
            Scheme::Imex {
                fast_term: FastTerm::LiaPlusShortRange,
            },
            1e-3,
        )
        .with_lia_only(true);
        let err = integrator.init(problem).unwrap_err();
        assert_eq!(err, ConfigError::LiaOnlyWithNonLocalFastTerm);
    }

    #[test]
    fn adaptivity_incompatible_with_multirate_scheme_is_rejected_at_init() {
        let problem = Problem::new(vec![ring(1.0, 16)], open_params(), 0.0, 1e-2);
        let integrator = TimeIntegrator::new(
            Scheme::MriGark {
                order: MriGarkOrder::Order3,
                fast_term: FastTerm::Lia,
                inner_substeps: 2,
            },
            1e-3,
        )
        .with_adaptivity(AdaptivityCriterion::BasedOnVelocity { delta: 0.1 });
        let err = integrator.init(problem).unwrap_err();
        assert_eq!(err, ConfigError::AdaptivityIncompatibleWithScheme);
    }

    #[test]
    fn mri_gark_step_runs_to_completion() {
        let problem = Problem::new(vec![ring(1.0, 24)], open_params(), 0.0, 5e-3);
        let integrator = TimeIntegrator::new(
            Scheme::MriGark {
                order: MriGarkOrder::Order3,
                fast_term: FastTerm::Lia,
                inner_substeps: 2,
            },
            1e-3,
        );
        let mut state = integrator.init(problem).unwrap();
        let mut cb = NoCallback;
        let status = state.step(&mut cb);
        assert_ne!(status, StepStatus::Terminated(TerminationReason::DtBelowMinimum));
        assert_eq!(state.filaments.len(), 1);
    }
}

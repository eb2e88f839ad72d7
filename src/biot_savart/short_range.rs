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

//! Short-range part of the Ewald-split Biot-Savart sum (SPEC_FULL.md §4.4):
//! a desingularized real-space kernel, integrated per segment with
//! Gauss-Legendre quadrature, evaluated only for segments delivered by the
//! neighbor finder within `rcut` of the target node. The node's own one or
//! two incident segments are always excluded here -- they are handled by
//! the LIA term instead ([`super::lia`]).

use crate::cell_list::{NeighborBackend, NeighborFinder, Periods, SegmentPoint, SegmentRef};
use crate::filament::Filament;
use crate::quadrature::GaussLegendre;
use crate::vec3::Vec3;

/// Caches neighbor-finder configuration and exposes basic health counters
/// for `log::debug!` (SPEC_FULL.md §3 "short-range cache", §4 supplemented
/// `CellListStats`).
pub struct ShortRangeCache {
    finder: NeighborFinder,
    pub stats: CellListStats,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CellListStats {
    pub occupied_cells: usize,
    pub max_cell_population: usize,
}

impl ShortRangeCache {
    pub fn new(backend: NeighborBackend, periods: Periods, cutoff: f64) -> Self {
        ShortRangeCache {
            finder: NeighborFinder::new(backend, periods, cutoff),
            stats: CellListStats::default(),
        }
    }

    /// Real-space Ewald kernel for the vector (velocity) part: the
    /// standard short-range dipole-sum kernel
    /// `q_SR(r) = [erfc(alpha r) + (2 alpha r / sqrt(pi)) exp(-alpha^2 r^2)] / r^3`,
    /// such that `q_SR + q_LR = 1/r^3` exactly (SPEC_FULL.md §4.4).
    fn kernel_velocity(r: f64, alpha: f64) -> f64 {
        if r <= 0.0 {
            return 0.0;
        }
        let ar = alpha * r;
        let erfc = 1.0 - crate::vec3::erf(ar);
        (erfc + 2.0 * ar / std::f64::consts::PI.sqrt() * (-ar * ar).exp()) / (r * r * r)
    }

    /// Real-space Ewald kernel for the scalar (streamfunction) part:
    /// `erfc(alpha r) / r`.
    fn kernel_streamfunction(r: f64, alpha: f64) -> f64 {
        if r <= 0.0 {
            return 0.0;
        }
        let erfc = 1.0 - crate::vec3::erf(alpha * r);
        erfc / r
    }

    /// Accumulate the short-range (non-local) velocity and streamfunction
    /// contributions at every node of every filament into `velocity_out`/
    /// `streamfunction_out` (same shape as `filaments`: outer index is the
    /// filament, inner is the node, 0-based).
    pub fn accumulate(
        &mut self,
        filaments: &[Filament],
        periods: &Periods,
        alpha: f64,
        circulation: f64,
        quad: &GaussLegendre,
        want_velocity: bool,
        want_streamfunction: bool,
        velocity_out: &mut [Vec<Vec3>],
        streamfunction_out: &mut [Vec<f64>],
    ) {
        let points = Self::segment_points(filaments);
        let cutoff = self.finder.cutoff();
        self.update_stats(&points, cutoff);
        let prefactor = circulation / (4.0 * std::f64::consts::PI);

        for (fi, filament) in filaments.iter().enumerate() {
            for i in 1..=filament.len() {
                let x = *filament.nodes().get(i as isize);
                let own_segments = own_incident_segments(i, filament.len());
                let nearby = self.finder.segments_within(x, &points, cutoff);
                let mut v_acc = Vec3::zeros();
                let mut psi_acc = 0.0;
                for seg in nearby {
                    if seg.filament_idx == fi && own_segments.contains(&seg.segment_idx) {
                        continue;
                    }
                    let g = &filaments[seg.filament_idx];
                    let j = seg.segment_idx;
                    let dt_seg = *g.knots().get(j as isize + 1) - *g.knots().get(j as isize);
                    if want_velocity {
                        v_acc += quad.integrate_vec3(|zeta| {
                            let s = g.evaluate(j, zeta, 0);
                            let ds_dzeta = g.evaluate(j, zeta, 1) * dt_seg;
                            let r_vec = periods.minimum_image(x, s);
                            let r = r_vec.norm();
                            Self::kernel_velocity(r, alpha) * r_vec.cross(&ds_dzeta)
                        });
                    }
                    if want_streamfunction {
                        psi_acc += quad.integrate(|zeta| {
                            let s = g.evaluate(j, zeta, 0);
                            let ds_dzeta = (g.evaluate(j, zeta, 1) * dt_seg).norm();
                            let r = periods.minimum_image(x, s).norm();
                            Self::kernel_streamfunction(r, alpha) * ds_dzeta
                        });
                    }
                }
                if want_velocity {
                    velocity_out[fi][i - 1] += v_acc * prefactor;
                }
                if want_streamfunction {
                    streamfunction_out[fi][i - 1] += psi_acc * prefactor;
                }
            }
        }
    }

    /// Same as [`ShortRangeCache::accumulate`], but splits the per-node loop
    /// across `thread_pool` by chunking filament indices -- the same
    /// chunked-scope pattern the teacher's `helpers::convolve_2d_parallel`
    /// uses for its FFT passes, applied here to an embarrassingly parallel
    /// per-node accumulation instead (SPEC_FULL.md §5). Falls back to the
    /// sequential path when the pool has fewer than two threads.
    #[cfg(not(target_arch = "wasm32"))]
    #[allow(clippy::too_many_arguments)]
    pub fn accumulate_parallel(
        &mut self,
        filaments: &[Filament],
        periods: &Periods,
        alpha: f64,
        circulation: f64,
        quad: &GaussLegendre,
        want_velocity: bool,
        want_streamfunction: bool,
        velocity_out: &mut [Vec<Vec3>],
        streamfunction_out: &mut [Vec<f64>],
        thread_pool: &mut scoped_threadpool::Pool,
    ) {
        let num_threads = thread_pool.thread_count() as usize;
        if num_threads < 2 || filaments.len() < 2 {
            return self.accumulate(
                filaments,
                periods,
                alpha,
                circulation,
                quad,
                want_velocity,
                want_streamfunction,
                velocity_out,
                streamfunction_out,
            );
        }

        let points = Self::segment_points(filaments);
        let cutoff = self.finder.cutoff();
        self.update_stats(&points, cutoff);
        let finder = &self.finder;

        thread_pool.scoped(|scope| {
            let chunk = (filaments.len() + num_threads - 1) / num_threads;
            let mut v_chunks = velocity_out.chunks_mut(chunk);
            let mut psi_chunks = streamfunction_out.chunks_mut(chunk);
            let mut base = 0usize;
            while base < filaments.len() {
                let end = (base + chunk).min(filaments.len());
                let v_chunk = v_chunks.next().unwrap();
                let psi_chunk = psi_chunks.next().unwrap();
                let points = &points;
                scope.execute(move || {
                    accumulate_target_range(
                        filaments,
                        base,
                        end,
                        finder,
                        points,
                        cutoff,
                        periods,
                        alpha,
                        circulation,
                        quad,
                        want_velocity,
                        want_streamfunction,
                        v_chunk,
                        psi_chunk,
                    );
                });
                base = end;
            }
        });
    }

    fn segment_points(filaments: &[Filament]) -> Vec<SegmentPoint> {
        let mut points = Vec::new();
        for (fi, f) in filaments.iter().enumerate() {
            for i in 1..=f.num_segments() {
                points.push(SegmentPoint {
                    segment: SegmentRef {
                        filament_idx: fi,
                        segment_idx: i,
                    },
                    position: f.evaluate(i, 0.5, 0),
                });
            }
        }
        points
    }

    fn update_stats(&mut self, points: &[SegmentPoint], cutoff: f64) {
        use std::collections::HashMap;
        let cell_side = cutoff.max(1e-12);
        let mut buckets: HashMap<(i64, i64, i64), usize> = HashMap::new();
        for p in points {
            let key = (
                (p.position.x / cell_side).floor() as i64,
                (p.position.y / cell_side).floor() as i64,
                (p.position.z / cell_side).floor() as i64,
            );
            *buckets.entry(key).or_insert(0) += 1;
        }
        self.stats.occupied_cells = buckets.len();
        self.stats.max_cell_population = buckets.values().copied().max().unwrap_or(0);
    }
}

/// Worker body for [`ShortRangeCache::accumulate_parallel`]: the same
/// per-node loop as [`ShortRangeCache::accumulate`], restricted to target
/// nodes on filaments `[base, end)`, but with the full `filaments` slice in
/// scope so that short-range contributions from any other filament (the
/// common case) are still found.
#[cfg(not(target_arch = "wasm32"))]
#[allow(clippy::too_many_arguments)]
fn accumulate_target_range(
    filaments: &[Filament],
    base: usize,
    end: usize,
    finder: &NeighborFinder,
    all_points: &[SegmentPoint],
    cutoff: f64,
    periods: &Periods,
    alpha: f64,
    circulation: f64,
    quad: &GaussLegendre,
    want_velocity: bool,
    want_streamfunction: bool,
    velocity_out: &mut [Vec<Vec3>],
    streamfunction_out: &mut [Vec<f64>],
) {
    let prefactor = circulation / (4.0 * std::f64::consts::PI);
    for fi in base..end {
        let filament = &filaments[fi];
        let local_fi = fi - base;
        for i in 1..=filament.len() {
            let x = *filament.nodes().get(i as isize);
            let own_segments = own_incident_segments(i, filament.len());
            let nearby = finder.segments_within(x, all_points, cutoff);
            let mut v_acc = Vec3::zeros();
            let mut psi_acc = 0.0;
            for seg in nearby {
                if seg.filament_idx == fi && own_segments.contains(&seg.segment_idx) {
                    continue;
                }
                let g = &filaments[seg.filament_idx];
                let j = seg.segment_idx;
                let dt_seg = *g.knots().get(j as isize + 1) - *g.knots().get(j as isize);
                if want_velocity {
                    v_acc += quad.integrate_vec3(|zeta| {
                        let s = g.evaluate(j, zeta, 0);
                        let ds_dzeta = g.evaluate(j, zeta, 1) * dt_seg;
                        let r_vec = periods.minimum_image(x, s);
                        let r = r_vec.norm();
                        ShortRangeCache::kernel_velocity(r, alpha) * r_vec.cross(&ds_dzeta)
                    });
                }
                if want_streamfunction {
                    psi_acc += quad.integrate(|zeta| {
                        let s = g.evaluate(j, zeta, 0);
                        let ds_dzeta = (g.evaluate(j, zeta, 1) * dt_seg).norm();
                        let r = periods.minimum_image(x, s).norm();
                        ShortRangeCache::kernel_streamfunction(r, alpha) * ds_dzeta
                    });
                }
            }
            if want_velocity {
                velocity_out[local_fi][i - 1] += v_acc * prefactor;
            }
            if want_streamfunction {
                streamfunction_out[local_fi][i - 1] += psi_acc * prefactor;
            }
        }
    }
}

fn own_incident_segments(node: usize, n: usize) -> [usize; 2] {
    let prev = if node == 1 { n } else { node - 1 };
    [prev, node]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filament::DiscretisationMethod;
    use std::f64::consts::PI;

    #[test]
    fn kernel_splits_exactly_into_short_plus_long() {
        let alpha = 1.3;
        for &r in &[0.1, 0.5, 1.0, 2.0] {
            let short = ShortRangeCache::kernel_streamfunction(r, alpha);
            let long = crate::vec3::erf(alpha * r) / r;
            assert!((short + long - 1.0 / r).abs() < 1e-12);
        }
    }

    #[test]
    fn excludes_nodes_own_incident_segments() {
        let n = 16;
        let points: Vec<Vec3> = (0..n)
            .map(|k| {
                let theta = 2.0 * PI * k as f64 / n as f64;
                Vec3::new(theta.cos(), theta.sin(), 0.0)
            })
            .collect();
        let f = Filament::init(points, DiscretisationMethod::CubicSpline, Vec3::zeros()).unwrap();
        let own = own_incident_segments(1, n);
        assert_eq!(own, [n, 1]);
    }
}

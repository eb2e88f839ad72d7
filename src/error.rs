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

//! Error and status types (see SPEC_FULL.md §7).
//!
//! Fatal configuration problems are reported eagerly as `ConfigError`.
//! Everything that can be recovered from during a run (dynamic filament
//! degeneracy, step rejection) is communicated through `StepStatus`, not
//! through this error type.

use thiserror::Error;

/// Fatal, construction-time configuration errors (SPEC_FULL.md §7 category 1).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("short-range cutoff {rcut} must be smaller than half the smallest period {half_min_period}")]
    CutoffTooLarge { rcut: f64, half_min_period: f64 },

    #[error("grid size along axis {axis} ({size}) must be even")]
    GridSizeNotEven { axis: usize, size: usize },

    #[error("circulation must be strictly positive, got {0}")]
    NonPositiveCirculation(f64),

    #[error("core radius must be strictly positive, got {0}")]
    NonPositiveCoreRadius(f64),

    #[error("core parameter delta must lie in [0,1], got {0}")]
    CoreParameterOutOfRange(f64),

    #[error("Ewald splitting parameter alpha must be strictly positive, got {0}")]
    NonPositiveAlpha(f64),

    #[error("adaptivity scheme is incompatible with a non-adaptive time integration scheme")]
    AdaptivityIncompatibleWithScheme,

    #[error("LIA_only cannot be combined with a non-local fast term in a multirate scheme")]
    LiaOnlyWithNonLocalFastTerm,

    #[error("mixed periodic/open dimensions are not supported (periods: {0:?})")]
    MixedPeriodicity([bool; 3]),

    #[error("filament has {n} nodes, below the minimum of {min} required by its discretisation method")]
    DegenerateFilament { n: usize, min: usize },
}

/// Reason the time integration loop stopped (SPEC_FULL.md §2.3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Simulation time reached the end of the requested span.
    EndOfSpan,
    /// All filaments were removed as degenerate; nothing left to integrate.
    NoVorticesLeft,
    /// The adaptive step size fell below `dtmin` while `t < t_end`: fatal
    /// per SPEC_FULL.md §7 category 3.
    DtBelowMinimum,
}

/// Outcome of a single call to `TimeIntegrator::step` (SPEC_FULL.md §2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The step succeeded; integration may continue.
    Continuing,
    /// The step was rejected by the adaptivity criterion and retried
    /// internally at a smaller `dt`; this variant is only observed by a
    /// caller inspecting `SolverState::rejection_count`, not returned on
    /// its own (rejection is transparent to the caller unless it recurses
    /// into a fatal `DtBelowMinimum`).
    Rejected,
    /// The loop has terminated; no further steps should be taken.
    Terminated(TerminationReason),
}

/// Errors raised by numerical backends during a step that are surfaced as
/// warnings rather than aborting the simulation (SPEC_FULL.md §7 category 4).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NumericalWarning {
    #[error("NUFFT spreading did not converge to the requested tolerance {requested:e} (observed {observed:e})")]
    NufftNotConverged { requested: f64, observed: f64 },

    #[error("external velocity field is inconsistent with its streamfunction at sample point (curl mismatch {mismatch:e})")]
    VelocityStreamfunctionMismatch { mismatch: f64 },
}

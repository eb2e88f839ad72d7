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

//! Persisted state (SPEC_FULL.md §2.13, §6): a concrete, pragmatic stand-in
//! for the "self-describing HDF5-like container" the distilled spec
//! describes only as an external collaborator. An appendable `Journal` of
//! per-step records, `serde`-derived and `bincode`-encoded, mirroring how
//! `NNPDF-pineappl` persists its interpolation grids with `serde` plus a
//! binary codec. A true HDF5 backend is out of scope (`spec.md` §1
//! Non-goals: the file I/O format is an external collaborator).

use std::io::{self, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::biot_savart::NodeFields;
use crate::error::ConfigError;
use crate::filament::{DiscretisationMethod, Filament};
use crate::vec3::Vec3;

/// One filament's node array and periodic offset. The discretization
/// method is deliberately not stored here: SPEC_FULL.md §6 specifies that
/// the reader reconstructs filaments "from node arrays and a
/// discretization method supplied at read time", so the method travels out
/// of band (typically fixed for an entire run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilamentRecord {
    pub points: Vec<Vec3>,
    pub offset: Vec3,
}

impl FilamentRecord {
    pub fn from_filament(f: &Filament) -> Self {
        FilamentRecord {
            points: f.nodes().as_visible_slice().to_vec(),
            offset: f.offset(),
        }
    }

    pub fn into_filament(self, method: DiscretisationMethod) -> Result<Filament, ConfigError> {
        Filament::init(self.points, method, self.offset)
    }
}

/// Per-node fields aligned with a [`FilamentRecord`]'s node array
/// (SPEC_FULL.md §6 (b)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeFieldsRecord {
    pub velocity: Vec<Vec3>,
    pub streamfunction: Vec<f64>,
    pub tangent: Vec<Vec3>,
}

impl NodeFieldsRecord {
    pub fn from_fields(filament: &Filament, fields: &NodeFields) -> Self {
        let tangent = (1..=filament.len())
            .map(|i| filament.unit_tangent(i, 0.0))
            .collect();
        NodeFieldsRecord {
            velocity: fields.velocity.clone(),
            streamfunction: fields.streamfunction.clone(),
            tangent,
        }
    }
}

/// One appended record: every filament's nodes and offset, the aligned
/// per-node fields, and scalar metadata for that step (SPEC_FULL.md §6
/// (a), (c)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub time: f64,
    pub step: usize,
    pub filaments: Vec<FilamentRecord>,
    pub fields: Vec<NodeFieldsRecord>,
    pub reconnections_performed: usize,
    pub filaments_removed_length: f64,
}

/// A small header of run-wide scalar fields, written once ahead of the
/// per-step journal (SPEC_FULL.md §6 (c) "global scalar fields").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalHeader {
    pub circulation: f64,
    pub core_radius: f64,
    pub core_parameter: f64,
    pub t_start: f64,
    pub t_end: f64,
}

/// An appendable journal of [`StepRecord`]s plus a header, the concrete
/// realization of SPEC_FULL.md §6's persisted-state container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub header: JournalHeader,
    pub steps: Vec<StepRecord>,
}

impl Journal {
    pub fn new(header: JournalHeader) -> Self {
        Journal {
            header,
            steps: Vec::new(),
        }
    }

    pub fn append(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    /// Serialize the whole journal to `path` with `bincode`.
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(&bytes)
    }

    /// Deserialize a journal previously written by [`Journal::save`].
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        bincode::deserialize(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biot_savart::NodeFields;
    use std::f64::consts::PI;

    fn ring(n: usize, radius: f64) -> Filament {
        let points: Vec<Vec3> = (0..n)
            .map(|k| {
                let theta = 2.0 * PI * k as f64 / n as f64;
                Vec3::new(radius * theta.cos(), radius * theta.sin(), 0.0)
            })
            .collect();
        Filament::init(points, DiscretisationMethod::CubicSpline, Vec3::zeros()).unwrap()
    }

    #[test]
    fn filament_record_round_trips_through_the_same_discretisation_method() {
        let f = ring(16, 1.0);
        let record = FilamentRecord::from_filament(&f);
        let restored = record
            .into_filament(DiscretisationMethod::CubicSpline)
            .unwrap();
        for i in 1..=f.len() {
            assert_eq!(*f.nodes().get(i as isize), *restored.nodes().get(i as isize));
        }
        assert_eq!(f.offset(), restored.offset());
    }

    #[test]
    fn journal_bincode_round_trip_is_bitwise_identical() {
        let f = ring(8, 1.0);
        let fields = NodeFields {
            velocity: vec![Vec3::new(1.0, 2.0, 3.0); f.len()],
            streamfunction: vec![0.5; f.len()],
        };
        let mut journal = Journal::new(JournalHeader {
            circulation: 1.0,
            core_radius: 1e-4,
            core_parameter: 0.5,
            t_start: 0.0,
            t_end: 1.0,
        });
        journal.append(StepRecord {
            time: 0.0,
            step: 0,
            filaments: vec![FilamentRecord::from_filament(&f)],
            fields: vec![NodeFieldsRecord::from_fields(&f, &fields)],
            reconnections_performed: 0,
            filaments_removed_length: 0.0,
        });
        let encoded = bincode::serialize(&journal).unwrap();
        let decoded: Journal = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded.steps.len(), 1);
        assert_eq!(decoded.steps[0].filaments[0].points, journal.steps[0].filaments[0].points);
    }
}

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

//! One-dimensional indexed sequence with `M` ghost slots on each side
//! (SPEC_FULL.md §4.1). This is the storage substrate for every per-node
//! quantity on a filament: positions, velocities, streamfunction values,
//! tangents. Stencils and interpolation read past the logical endpoints
//! without branching by indexing into the padding.

use std::ops::{Index, IndexMut};

/// How to fill the `M` ghost slots on each side from the `N` visible
/// entries (SPEC_FULL.md §3, invariant on `PaddedSequence`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingMode {
    /// Copy the last `M` visible entries into the left pad and the first
    /// `M` into the right pad (wrap "from the centre").
    FromCentre,
    /// Copy only from the right side's visible entries into both pads
    /// (used when a one-sided extension, rather than periodic wrap, is
    /// wanted -- e.g. while a filament is mid-surgery and its left side
    /// is temporarily invalid).
    FromRight,
}

/// A logically `N`-long sequence of `T`, physically stored with `M` extra
/// slots on each side so that indices in `[1-M, N+M]` are all valid.
///
/// Indices are 1-based logical indices matching SPEC_FULL.md's notation
/// (`X[1..N]`); internally they are offset by `M` into the backing `Vec`.
#[derive(Debug, Clone)]
pub struct PaddedSequence<T> {
    data: Vec<T>,
    n: usize,
    m: usize,
}

impl<T: Clone + Default> PaddedSequence<T> {
    /// Create a new padded sequence of logical length `n` with `m` ghost
    /// slots on each side, all entries default-initialized.
    pub fn new(n: usize, m: usize) -> Self {
        Self {
            data: vec![T::default(); n + 2 * m],
            n,
            m,
        }
    }

    /// Construct from a slice of visible values; pads are left
    /// default-initialized (call `apply_padding` before reading them).
    pub fn from_visible(values: &[T], m: usize) -> Self {
        let n = values.len();
        let mut data = vec![T::default(); n + 2 * m];
        data[m..m + n].clone_from_slice(values);
        Self { data, n, m }
    }
}

impl<T: Clone> PaddedSequence<T> {
    /// Logical length (number of visible entries).
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Ghost width on each side.
    pub fn pad_width(&self) -> usize {
        self.m
    }

    /// Translate a logical index (which may be negative or `> n`, as long
    /// as it is within `[1-m, n+m]`) into a backing-array offset.
    #[inline]
    fn offset(&self, i: isize) -> usize {
        let shifted = i + self.m as isize - 1;
        debug_assert!(
            shifted >= 0 && (shifted as usize) < self.data.len(),
            "index {} out of padded bounds [{}, {}]",
            i,
            1 - self.m as isize,
            self.n + self.m
        );
        shifted as usize
    }

    /// Read at logical index `i` (1-based), `i` may reach into the pad.
    pub fn get(&self, i: isize) -> &T {
        &self.data[self.offset(i)]
    }

    /// Write at logical index `i` (1-based), `i` may reach into the pad.
    pub fn set(&mut self, i: isize, value: T) {
        let off = self.offset(i);
        self.data[off] = value;
    }

    /// Mutable access at logical index `i`.
    pub fn get_mut(&mut self, i: isize) -> &mut T {
        let off = self.offset(i);
        &mut self.data[off]
    }

    /// Iterate over the visible range `[1, n]` in order.
    pub fn iter_visible(&self) -> impl Iterator<Item = &T> {
        self.data[self.m..self.m + self.n].iter()
    }

    /// Mutable iteration over the visible range `[1, n]`.
    pub fn iter_visible_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.data[self.m..self.m + self.n].iter_mut()
    }

    /// Visible entries as a plain slice.
    pub fn as_visible_slice(&self) -> &[T] {
        &self.data[self.m..self.m + self.n]
    }

    /// Visible entries as a mutable plain slice.
    pub fn as_visible_slice_mut(&mut self) -> &mut [T] {
        &mut self.data[self.m..self.m + self.n]
    }

    /// The full padded backing storage, including both ghost regions, in
    /// storage order (left pad, visible, right pad).
    pub fn as_padded_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: Clone + Default> PaddedSequence<T> {
    /// Resize to a new logical length, keeping as many existing visible
    /// entries (from the front) as fit and default-initializing the rest.
    /// Pads become stale and must be refreshed with `apply_padding`.
    pub fn resize(&mut self, new_n: usize) {
        let mut new_data = vec![T::default(); new_n + 2 * self.m];
        let keep = self.n.min(new_n);
        new_data[self.m..self.m + keep].clone_from_slice(&self.data[self.m..self.m + keep]);
        self.data = new_data;
        self.n = new_n;
    }

    /// Insert a value before logical index `i` (`1 <= i <= n+1`), growing
    /// the visible range by one. Pads become stale.
    pub fn insert(&mut self, i: usize, value: T) {
        assert!((1..=self.n + 1).contains(&i));
        let mut new_data = vec![T::default(); self.n + 1 + 2 * self.m];
        // Entries before the insertion point.
        new_data[self.m..self.m + i - 1].clone_from_slice(&self.data[self.m..self.m + i - 1]);
        new_data[self.m + i - 1] = value;
        // Entries at/after the insertion point.
        new_data[self.m + i..self.m + self.n + 1]
            .clone_from_slice(&self.data[self.m + i - 1..self.m + self.n]);
        self.data = new_data;
        self.n += 1;
    }

    /// Remove the entry at logical index `i` (`1 <= i <= n`), shrinking the
    /// visible range by one. Pads become stale.
    pub fn remove(&mut self, i: usize) -> T {
        assert!((1..=self.n).contains(&i));
        let removed = self.data[self.m + i - 1].clone();
        let mut new_data = vec![T::default(); self.n - 1 + 2 * self.m];
        new_data[self.m..self.m + i - 1].clone_from_slice(&self.data[self.m..self.m + i - 1]);
        new_data[self.m + i - 1..self.m + self.n - 1]
            .clone_from_slice(&self.data[self.m + i..self.m + self.n]);
        self.data = new_data;
        self.n -= 1;
        removed
    }
}

/// Periodic padding for sequences whose values support addition with an
/// offset of the same type (positions padded by a periodic displacement
/// `Δ`, see SPEC_FULL.md §3). Kept as a separate impl block since plain
/// scalar quantities (velocities, curvatures) pad with a zero offset via
/// the `T: Default` fallback in `apply_padding_from_centre`.
impl<T: Clone + Default> PaddedSequence<T> {
    /// Fill the pad from the visible range, wrapping around the centre:
    /// `left_pad[k] = visible[N-M+k] - offset`, `right_pad[k] = visible[k] + offset`.
    /// `add` combines a visible value with `+offset`/`-offset` (identity
    /// closure for quantities with no periodic drift, e.g. velocities).
    pub fn apply_padding_from_centre<F>(&mut self, add: F)
    where
        F: Fn(&T, i64) -> T,
    {
        let n = self.n as isize;
        let m = self.m as isize;
        if n == 0 {
            return;
        }
        for k in 1..=m {
            // Left pad: logical index 1-k mirrors visible n-k+1, shifted by one full period back.
            let src_idx = ((1 - k - 1).rem_euclid(n)) + 1;
            let src = self.get(src_idx).clone();
            self.set(1 - k, add(&src, -1));
            // Right pad: logical index n+k mirrors visible k, shifted one period forward.
            let src_idx2 = ((n + k - 1).rem_euclid(n)) + 1;
            let src2 = self.get(src_idx2).clone();
            self.set(n + k, add(&src2, 1));
        }
    }

    /// Fill both pads purely from the right-hand visible entries, giving
    /// priority to right-pad values over a centred wrap (SPEC_FULL.md §4.1).
    pub fn apply_padding_from_right<F>(&mut self, add: F)
    where
        F: Fn(&T, i64) -> T,
    {
        let n = self.n as isize;
        let m = self.m as isize;
        if n == 0 {
            return;
        }
        for k in 1..=m {
            let src_idx = ((k - 1).rem_euclid(n)) + 1;
            let src = self.get(src_idx).clone();
            self.set(1 - k, add(&src, -1));
            self.set(n + k, add(&src, 0));
        }
    }
}

impl<T: Clone> Index<isize> for PaddedSequence<T> {
    type Output = T;
    fn index(&self, i: isize) -> &T {
        self.get(i)
    }
}

impl<T: Clone> IndexMut<isize> for PaddedSequence<T> {
    fn index_mut(&mut self, i: isize) -> &mut T {
        self.get_mut(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_roundtrip() {
        let seq = PaddedSequence::from_visible(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.as_visible_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn periodic_padding_from_centre_no_offset() {
        let mut seq = PaddedSequence::from_visible(&[1.0, 2.0, 3.0, 4.0], 2);
        seq.apply_padding_from_centre(|v, _off| *v);
        // Left pad mirrors the tail: [3,4 | 1,2,3,4 | 1,2]
        assert_eq!(*seq.get(-1), 3.0);
        assert_eq!(*seq.get(0), 4.0);
        assert_eq!(*seq.get(5), 1.0);
        assert_eq!(*seq.get(6), 2.0);
    }

    #[test]
    fn periodic_padding_with_offset() {
        let mut seq = PaddedSequence::from_visible(&[0.0, 1.0, 2.0], 1);
        let delta = 3.0;
        seq.apply_padding_from_centre(|v, off| v + off as f64 * delta);
        assert_eq!(*seq.get(0), 2.0 - delta);
        assert_eq!(*seq.get(4), 0.0 + delta);
    }

    #[test]
    fn insert_and_remove() {
        let mut seq = PaddedSequence::from_visible(&[1.0, 2.0, 4.0], 1);
        seq.insert(3, 3.0);
        assert_eq!(seq.as_visible_slice(), &[1.0, 2.0, 3.0, 4.0]);
        let removed = seq.remove(1);
        assert_eq!(removed, 1.0);
        assert_eq!(seq.as_visible_slice(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn resize_keeps_prefix() {
        let mut seq = PaddedSequence::from_visible(&[1.0, 2.0, 3.0], 1);
        seq.resize(5);
        assert_eq!(&seq.as_visible_slice()[..3], &[1.0, 2.0, 3.0]);
        seq.resize(2);
        assert_eq!(seq.as_visible_slice(), &[1.0, 2.0]);
    }
}

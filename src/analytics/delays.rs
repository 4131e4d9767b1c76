//! Time-lag discovery and tolerance-based binning.
//!
//! Lags are collected per trajectory (never across trajectories), rounded to a
//! fixed number of decimals and merged so floating-point jitter cannot split one
//! physical lag into several bins.

use crate::config::MAX_LAG_TOLERANCE_DECIMALS;
use crate::trajectory::Trajectory;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::collections::BTreeSet;

/// Bins whose representatives are closer than this many quanta are merged.
const MERGE_WINDOW_QUANTA: f64 = 1.5;

/// Rounds `x` to the nearest multiple of `10^-decimals`.
///
/// `decimals` is capped at [`MAX_LAG_TOLERANCE_DECIMALS`].
pub fn roundn(x: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals.min(MAX_LAG_TOLERANCE_DECIMALS) as i32);
    (x * scale).round() / scale
}

/// Absolute tolerance under which two time values or lags are the same.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagTolerance {
    decimals: u32,
}

impl LagTolerance {
    /// Tolerance of `10^-decimals`, with `decimals` capped at
    /// [`MAX_LAG_TOLERANCE_DECIMALS`].
    pub fn new(decimals: u32) -> Self {
        LagTolerance {
            decimals: decimals.min(MAX_LAG_TOLERANCE_DECIMALS),
        }
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Smallest distinguishable step, `10^-decimals`.
    pub fn quantum(&self) -> f64 {
        10f64.powi(-(self.decimals as i32))
    }

    pub fn round(&self, x: f64) -> f64 {
        roundn(x, self.decimals)
    }

    /// Whether two already-rounded values fall in the same bin.
    pub fn same(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= MERGE_WINDOW_QUANTA * self.quantum()
    }
}

impl Default for LagTolerance {
    fn default() -> Self {
        LagTolerance::new(crate::config::LAG_TOLERANCE_DECIMALS)
    }
}

/// Sorted, tolerance-deduplicated set of values.
///
/// Used both for lag sets and for the common time base of drift estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct Bins {
    values: Vec<f64>,
    tolerance: LagTolerance,
}

/// Distinct lags present in a set of trajectories.
pub type LagSet = Bins;

impl Bins {
    /// Rounds every value, sorts them and keeps one representative per bin.
    ///
    /// A value joins the current bin when it lies within the merge window of
    /// the bin's first (smallest) member, so a bin never spans more than the
    /// window and chains of near-neighbours cannot collapse distant values.
    pub fn from_values<I>(values: I, tolerance: LagTolerance) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let sorted: BTreeSet<OrderedFloat<f64>> = values
            .into_iter()
            .filter(|value| value.is_finite())
            .map(|value| OrderedFloat(tolerance.round(value)))
            .collect();

        let mut merged: Vec<f64> = Vec::with_capacity(sorted.len());
        for OrderedFloat(value) in sorted {
            match merged.last() {
                Some(&representative) if tolerance.same(representative, value) => {}
                _ => merged.push(value),
            }
        }

        Bins {
            values: merged,
            tolerance,
        }
    }

    /// Merges several bin sets into one, re-deduplicating at the same tolerance.
    pub fn union<'a, I>(sets: I, tolerance: LagTolerance) -> Self
    where
        I: IntoIterator<Item = &'a Bins>,
    {
        Bins::from_values(
            sets.into_iter().flat_map(|set| set.values.iter().copied()),
            tolerance,
        )
    }

    /// Index of the bin `value` falls in, if any.
    pub fn index_of(&self, value: f64) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        let rounded = self.tolerance.round(value);
        let upper = self.values.partition_point(|&v| v < rounded);

        let candidates = [upper.checked_sub(1), Some(upper)];
        candidates
            .iter()
            .flatten()
            .filter(|&&idx| idx < self.values.len())
            .min_by(|&&a, &&b| {
                let da = (self.values[a] - rounded).abs();
                let db = (self.values[b] - rounded).abs();
                da.total_cmp(&db)
            })
            .copied()
            .filter(|&idx| self.tolerance.same(self.values[idx], rounded))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn tolerance(&self) -> LagTolerance {
        self.tolerance
    }
}

/// Lags within one trajectory: magnitudes of every pairwise difference of the
/// rounded time stamps, zero lag included.
pub fn track_delays(track: &Trajectory, tolerance: LagTolerance) -> LagSet {
    let times: Vec<f64> = track.times().map(|t| tolerance.round(t)).collect();
    let mut diffs = Vec::with_capacity(times.len() * (times.len() + 1) / 2);
    for (i, &ti) in times.iter().enumerate() {
        for &tj in &times[i..] {
            diffs.push((tj - ti).abs());
        }
    }
    Bins::from_values(diffs, tolerance)
}

/// Union of the per-trajectory lag sets.
///
/// Per-track extraction is independent and read-only, so it runs on the rayon
/// pool when `parallel` is set.
pub fn collect_delays(tracks: &[&Trajectory], tolerance: LagTolerance, parallel: bool) -> LagSet {
    let per_track: Vec<LagSet> = if parallel {
        tracks
            .par_iter()
            .map(|track| track_delays(track, tolerance))
            .collect()
    } else {
        tracks
            .iter()
            .map(|track| track_delays(track, tolerance))
            .collect()
    };

    let lags = Bins::union(per_track.iter(), tolerance);
    tracing::debug!(
        "collected {} distinct lags from {} tracks",
        lags.len(),
        tracks.len()
    );
    lags
}

//! Ensemble drift estimation and correction.
//!
//! The drift is a single trajectory over the common time base, the rounded
//! union of every track's time stamps. Correction subtracts the drift value
//! at each sample's own time stamp and never touches the input tracks.

use crate::analytics::delays::{Bins, LagTolerance};
use crate::trajectory::{Trajectory, TrajectoryPoint};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How the drift trajectory is estimated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftMode {
    /// Integrate the ensemble-mean velocity over the time base
    #[default]
    Velocity,
    /// Track the ensemble centroid relative to its first position
    Centroid,
}

impl DriftMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftMode::Velocity => "velocity",
            DriftMode::Centroid => "centroid",
        }
    }
}

impl std::fmt::Display for DriftMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rounded, deduplicated union of all track time stamps.
pub fn common_time_base(tracks: &[&Trajectory], tolerance: LagTolerance) -> Bins {
    Bins::from_values(tracks.iter().flat_map(|track| track.times()), tolerance)
}

/// Estimates the drift trajectory of an ensemble.
///
/// Returns an empty trajectory when no track has samples.
pub fn estimate_drift(
    tracks: &[&Trajectory],
    n_dim: usize,
    mode: DriftMode,
    tolerance: LagTolerance,
) -> Trajectory {
    let base = common_time_base(tracks, tolerance);
    if base.is_empty() {
        return Trajectory::from_points_unchecked(Vec::new());
    }

    let offsets = match mode {
        DriftMode::Velocity => velocity_drift(tracks, &base, n_dim),
        DriftMode::Centroid => centroid_drift(tracks, &base, n_dim),
    };

    debug!(
        "estimated {} drift over {} time points from {} tracks",
        mode,
        base.len(),
        tracks.len()
    );

    let points = base
        .as_slice()
        .iter()
        .zip(offsets)
        .map(|(&t, offset)| TrajectoryPoint::new(t, offset))
        .collect();
    Trajectory::from_points_unchecked(points)
}

/// Every step of every track credits its velocity to each base interval it
/// spans, so tracks with missing frames still inform the intervals they
/// skip. Intervals nobody covers have zero mean velocity.
fn velocity_drift(tracks: &[&Trajectory], base: &Bins, n_dim: usize) -> Vec<Vec<f64>> {
    let times = base.as_slice();
    let n_intervals = times.len() - 1;
    let mut sum_v = vec![vec![0.0; n_dim]; n_intervals];
    let mut n_v = vec![0usize; n_intervals];

    for track in tracks {
        for pair in track.points().windows(2) {
            let (Some(start), Some(end)) = (base.index_of(pair[0].t), base.index_of(pair[1].t))
            else {
                continue;
            };
            let dt = pair[1].t - pair[0].t;
            for interval in start..end {
                let steps = pair[0].position.iter().zip(&pair[1].position);
                for (sum, (x0, x1)) in sum_v[interval].iter_mut().zip(steps) {
                    *sum += (x1 - x0) / dt;
                }
                n_v[interval] += 1;
            }
        }
    }

    let mut drift = Vec::with_capacity(times.len());
    let mut current = vec![0.0; n_dim];
    drift.push(current.clone());
    for interval in 0..n_intervals {
        let dt = times[interval + 1] - times[interval];
        if n_v[interval] > 0 {
            let count = n_v[interval] as f64;
            for (position, sum) in current.iter_mut().zip(&sum_v[interval]) {
                *position += sum / count * dt;
            }
        }
        drift.push(current.clone());
    }
    drift
}

/// Centroid of the tracks present at each base time, relative to the first
/// centroid.
fn centroid_drift(tracks: &[&Trajectory], base: &Bins, n_dim: usize) -> Vec<Vec<f64>> {
    let mut sums = vec![vec![0.0; n_dim]; base.len()];
    let mut counts = vec![0usize; base.len()];

    for track in tracks {
        for point in track.points() {
            if let Some(idx) = base.index_of(point.t) {
                for (sum, x) in sums[idx].iter_mut().zip(&point.position) {
                    *sum += x;
                }
                counts[idx] += 1;
            }
        }
    }

    let mut drift: Vec<Vec<f64>> = Vec::with_capacity(base.len());
    let mut origin: Option<Vec<f64>> = None;
    for (sum, count) in sums.iter().zip(&counts) {
        if *count == 0 {
            let previous = drift.last().cloned().unwrap_or_else(|| vec![0.0; n_dim]);
            drift.push(previous);
            continue;
        }
        let centroid: Vec<f64> = sum.iter().map(|s| s / *count as f64).collect();
        let reference = origin.get_or_insert_with(|| centroid.clone());
        drift.push(
            centroid
                .iter()
                .zip(reference.iter())
                .map(|(c, r)| c - r)
                .collect(),
        );
    }
    drift
}

/// Subtracts the drift from one track.
///
/// Samples whose time is not on the drift's time base are dropped. A track
/// with no sample on the base is returned unchanged.
pub fn correct_track(track: &Trajectory, drift: &Trajectory, tolerance: LagTolerance) -> Trajectory {
    let base = Bins::from_values(drift.times(), tolerance);
    let drift_points = drift.points();

    let corrected: Vec<TrajectoryPoint> = track
        .points()
        .iter()
        .filter_map(|point| {
            let idx = base.index_of(point.t)?;
            let offset = &drift_points.get(idx)?.position;
            let position = point
                .position
                .iter()
                .zip(offset)
                .map(|(x, dx)| x - dx)
                .collect();
            Some(TrajectoryPoint::new(point.t, position))
        })
        .collect();

    if corrected.is_empty() && !track.is_empty() {
        warn!(
            "track with {} samples shares no time point with the drift; left uncorrected",
            track.len()
        );
        return track.clone();
    }
    Trajectory::from_points_unchecked(corrected)
}

pub fn correct_tracks(tracks: &[Trajectory], drift: &Trajectory, tolerance: LagTolerance) -> Vec<Trajectory> {
    tracks
        .iter()
        .map(|track| correct_track(track, drift, tolerance))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(rows: &[[f64; 3]]) -> Trajectory {
        Trajectory::from_rows(rows).unwrap()
    }

    fn drifting(times: &[f64], origin: f64) -> Trajectory {
        let rows: Vec<[f64; 3]> = times.iter().map(|&t| [t, origin + 0.5 * t, -t]).collect();
        track(&rows)
    }

    #[test]
    fn velocity_drift_recovers_uniform_motion() {
        let a = drifting(&[0.0, 1.0, 2.0, 3.0], 10.0);
        let b = drifting(&[1.0, 2.0, 3.0, 4.0], -4.0);
        let drift = estimate_drift(&[&a, &b], 2, DriftMode::Velocity, LagTolerance::default());

        assert_eq!(drift.times().collect::<Vec<_>>(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        for point in drift.points() {
            assert!((point.position[0] - 0.5 * point.t).abs() < 1e-12);
            assert!((point.position[1] + point.t).abs() < 1e-12);
        }
    }

    #[test]
    fn velocity_drift_bridges_missing_frames() {
        let a = drifting(&[0.0, 3.0], 0.0);
        let b = drifting(&[0.0, 1.0, 2.0, 3.0], 1.0);
        let drift = estimate_drift(&[&a, &b], 2, DriftMode::Velocity, LagTolerance::default());
        assert_eq!(drift.len(), 4);
        assert!((drift.points()[2].position[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn correction_removes_shared_motion_and_keeps_input() {
        let a = drifting(&[0.0, 1.0, 2.0], 3.0);
        let b = drifting(&[0.0, 1.0, 2.0], 7.0);
        let drift = estimate_drift(&[&a, &b], 2, DriftMode::Velocity, LagTolerance::default());
        let corrected = correct_tracks(&[a.clone(), b.clone()], &drift, LagTolerance::default());

        for point in corrected[0].points() {
            assert!((point.position[0] - 3.0).abs() < 1e-12);
            assert!(point.position[1].abs() < 1e-12);
        }
        assert_eq!(a.points()[2].position[0], 4.0);
    }

    #[test]
    fn centroid_drift_is_relative_to_first_centroid() {
        let a = track(&[[0.0, 0.0, 0.0], [1.0, 2.0, 0.0]]);
        let b = track(&[[0.0, 4.0, 2.0], [1.0, 6.0, 2.0]]);
        let drift = estimate_drift(&[&a, &b], 2, DriftMode::Centroid, LagTolerance::default());
        assert_eq!(drift.points()[0].position, vec![0.0, 0.0]);
        assert_eq!(drift.points()[1].position, vec![2.0, 0.0]);
    }

    #[test]
    fn track_off_the_time_base_is_left_uncorrected() {
        let a = drifting(&[0.0, 1.0], 0.0);
        let drift = estimate_drift(&[&a], 2, DriftMode::Velocity, LagTolerance::default());
        let stranger = drifting(&[5.5, 6.5], 1.0);
        let corrected = correct_track(&stranger, &drift, LagTolerance::default());
        assert_eq!(corrected, stranger);
    }

    #[test]
    fn samples_off_the_base_are_dropped() {
        let a = drifting(&[0.0, 1.0, 2.0], 0.0);
        let drift = estimate_drift(&[&a], 2, DriftMode::Velocity, LagTolerance::default());
        let partial = drifting(&[1.0, 1.5, 2.0], 0.0);
        let corrected = correct_track(&partial, &drift, LagTolerance::default());
        assert_eq!(corrected.times().collect::<Vec<_>>(), vec![1.0, 2.0]);
    }

    #[test]
    fn empty_ensemble_has_empty_drift() {
        let drift = estimate_drift(&[], 2, DriftMode::Velocity, LagTolerance::default());
        assert!(drift.is_empty());
    }

    #[test]
    fn drift_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&DriftMode::Centroid).unwrap(), "\"centroid\"");
        assert_eq!(DriftMode::Velocity.to_string(), "velocity");
    }
}

//! Per-trajectory MSD and velocity-autocorrelation curves.
//!
//! Every pair of samples in a track is binned by its rounded lag. All pairs in
//! one bin collapse into a single row for that track, weighted by the pair
//! count, so the ensemble step sees one contribution per track per lag.

use crate::analytics::delays::LagSet;
use crate::analytics::weighted::RunningStats;
use crate::curve::{Curve, CurveRow};
use crate::trajectory::{Trajectory, TrajectoryPoint};
use rayon::prelude::*;
use tracing::{debug, trace};

/// Stateless per-track curve analytic.
pub trait CurveAnalytic: Send + Sync {
    fn name(&self) -> &'static str;
    fn compute(&self, track: &Trajectory, lags: &LagSet) -> Curve;
}

/// Squared displacement `‖x_j − x_i‖²` over pairs `i < j`.
pub struct SquaredDisplacement;

impl CurveAnalytic for SquaredDisplacement {
    fn name(&self) -> &'static str {
        "msd"
    }

    fn compute(&self, track: &Trajectory, lags: &LagSet) -> Curve {
        track_msd(track, lags)
    }
}

/// Velocity dot product `v_i · v_j` over pairs `i ≤ j` of a velocity track.
pub struct VelocityCorrelation {
    /// Divide by the zero-lag value so the curve starts at 1
    pub normalize: bool,
}

impl CurveAnalytic for VelocityCorrelation {
    fn name(&self) -> &'static str {
        "vacf"
    }

    fn compute(&self, track: &Trajectory, lags: &LagSet) -> Curve {
        track_vcorr(track, lags, self.normalize)
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (y - x) * (y - x)).sum()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Accumulates `observation(i, j)` for every pair in the track into the lag
/// bins, starting `j` at `i + offset`.
fn accumulate_pairs<F>(track: &Trajectory, lags: &LagSet, offset: usize, observation: F) -> Vec<RunningStats>
where
    F: Fn(&TrajectoryPoint, &TrajectoryPoint) -> f64,
{
    let tolerance = lags.tolerance();
    let points = track.points();
    let times: Vec<f64> = points.iter().map(|p| tolerance.round(p.t)).collect();
    let mut bins = vec![RunningStats::new(); lags.len()];

    for i in 0..points.len() {
        for j in (i + offset)..points.len() {
            let lag = tolerance.round(times[j] - times[i]);
            match lags.index_of(lag) {
                Some(idx) => bins[idx].push(observation(&points[i], &points[j])),
                None => trace!("lag {} not in lag set, pair ({}, {}) skipped", lag, i, j),
            }
        }
    }

    bins
}

fn rows_from_bins(lags: &LagSet, bins: &[RunningStats]) -> Vec<CurveRow> {
    lags.as_slice()
        .iter()
        .zip(bins)
        .filter(|(_, stats)| stats.count() > 0)
        .map(|(&lag, stats)| {
            let n = stats.count();
            let std = stats.std_dev();
            CurveRow::new(lag, stats.mean(), std, std / (n as f64).sqrt(), n)
        })
        .collect()
}

/// Mean squared displacement of one track.
///
/// Lag zero is always present for a non-empty track, with mean `0.0` and one
/// count per sample.
pub fn track_msd(track: &Trajectory, lags: &LagSet) -> Curve {
    if track.is_empty() {
        return Curve::default();
    }

    let bins = accumulate_pairs(track, lags, 1, |a, b| {
        squared_distance(&a.position, &b.position)
    });
    let mut rows = rows_from_bins(lags, &bins);

    let zero = CurveRow::new(0.0, 0.0, 0.0, 0.0, track.len());
    let has_zero = rows
        .first()
        .map_or(false, |row| lags.tolerance().same(row.lag, 0.0));
    if has_zero {
        rows[0] = zero;
    } else {
        rows.insert(0, zero);
    }

    Curve::new(rows)
}

/// Velocity autocorrelation of one velocity track (see [`velocities`]).
///
/// With `normalize` set, mean and dispersion are divided by the zero-lag mean
/// when that mean is non-zero.
pub fn track_vcorr(velocity_track: &Trajectory, lags: &LagSet, normalize: bool) -> Curve {
    let bins = accumulate_pairs(velocity_track, lags, 0, |a, b| dot(&a.position, &b.position));
    let mut rows = rows_from_bins(lags, &bins);

    if normalize {
        let scale = rows
            .first()
            .filter(|row| lags.tolerance().same(row.lag, 0.0))
            .map(|row| row.mean)
            .filter(|&mean| mean != 0.0 && mean.is_finite());
        if let Some(scale) = scale {
            for row in rows.iter_mut() {
                row.mean /= scale;
                row.std /= scale.abs();
                row.sem /= scale.abs();
            }
        }
    }

    Curve::new(rows)
}

/// Finite-difference velocities, stamped at the start of each step.
///
/// A track with fewer than two samples has no velocities.
pub fn velocities(track: &Trajectory) -> Trajectory {
    let points = track
        .points()
        .windows(2)
        .map(|pair| {
            let dt = pair[1].t - pair[0].t;
            let velocity = pair[0]
                .position
                .iter()
                .zip(&pair[1].position)
                .map(|(x0, x1)| (x1 - x0) / dt)
                .collect();
            TrajectoryPoint::new(pair[0].t, velocity)
        })
        .collect();
    Trajectory::from_points_unchecked(points)
}

/// Applies `analytic` to every track, in parallel when requested.
pub fn compute_curves<A: CurveAnalytic + ?Sized>(
    analytic: &A,
    tracks: &[&Trajectory],
    lags: &LagSet,
    parallel: bool,
) -> Vec<Curve> {
    debug!(
        "computing {} for {} tracks over {} lags (parallel: {})",
        analytic.name(),
        tracks.len(),
        lags.len(),
        parallel
    );

    if parallel {
        tracks
            .par_iter()
            .map(|track| analytic.compute(track, lags))
            .collect()
    } else {
        tracks
            .iter()
            .map(|track| analytic.compute(track, lags))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::delays::{collect_delays, LagTolerance};

    fn linear_track(times: &[f64], speed: f64) -> Trajectory {
        let rows: Vec<Vec<f64>> = times.iter().map(|&t| vec![t, speed * t, 0.0]).collect();
        Trajectory::from_rows(&rows).unwrap()
    }

    fn lags_for(tracks: &[&Trajectory]) -> LagSet {
        collect_delays(tracks, LagTolerance::default(), false)
    }

    #[test]
    fn msd_of_linear_motion_is_lag_squared() {
        let track = linear_track(&[0.0, 1.0, 2.0, 3.0], 1.0);
        let curve = track_msd(&track, &lags_for(&[&track]));

        assert_eq!(curve.lags(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(curve.means(), vec![0.0, 1.0, 4.0, 9.0]);
        let counts: Vec<usize> = curve.rows().iter().map(|row| row.n).collect();
        assert_eq!(counts, vec![4, 3, 2, 1]);
    }

    #[test]
    fn msd_at_zero_lag_is_exactly_zero() {
        let track = Trajectory::from_rows(&[vec![0.3, 5.0, -2.0], vec![0.7, 1.0, 1.0]]).unwrap();
        let curve = track_msd(&track, &lags_for(&[&track]));
        assert_eq!(curve.rows()[0].lag, 0.0);
        assert_eq!(curve.rows()[0].mean, 0.0);
        assert_eq!(curve.rows()[0].n, 2);
    }

    #[test]
    fn single_sample_track_only_has_zero_lag() {
        let track = linear_track(&[4.0], 1.0);
        let curve = track_msd(&track, &lags_for(&[&track]));
        assert_eq!(curve.len(), 1);
        assert_eq!(curve.rows()[0].n, 1);
        assert!(track_vcorr(&velocities(&track), &lags_for(&[&track]), true).is_empty());
    }

    #[test]
    fn lags_missing_from_a_track_are_not_emitted() {
        let dense = linear_track(&[0.0, 1.0, 2.0], 1.0);
        let sparse = linear_track(&[0.0, 2.0], 1.0);
        let lags = lags_for(&[&dense, &sparse]);
        let curve = track_msd(&sparse, &lags);
        assert_eq!(curve.lags(), vec![0.0, 2.0]);
    }

    #[test]
    fn msd_groups_pairs_across_missing_frames() {
        // frame at t=2 missing; lag 1 pairs: (0,1), (3,4)
        let track = linear_track(&[0.0, 1.0, 3.0, 4.0], 2.0);
        let curve = track_msd(&track, &lags_for(&[&track]));
        let row = curve.row_at(1.0, 1e-12).unwrap();
        assert_eq!(row.n, 2);
        assert!((row.mean - 4.0).abs() < 1e-12);
        assert_eq!(row.std, 0.0);
    }

    #[test]
    fn velocities_use_actual_time_steps() {
        let track = linear_track(&[0.0, 0.5, 2.0], 3.0);
        let v = velocities(&track);
        assert_eq!(v.len(), 2);
        assert!((v.points()[0].position[0] - 3.0).abs() < 1e-12);
        assert!((v.points()[1].position[0] - 3.0).abs() < 1e-12);
        assert_eq!(v.points()[1].t, 0.5);
    }

    #[test]
    fn vacf_of_constant_velocity_is_flat_after_normalization() {
        let track = linear_track(&[0.0, 1.0, 2.0, 3.0], 2.0);
        let v = velocities(&track);
        let curve = track_vcorr(&v, &lags_for(&[&v]), true);
        assert_eq!(curve.lags(), vec![0.0, 1.0, 2.0]);
        for row in curve.rows() {
            assert!((row.mean - 1.0).abs() < 1e-12);
        }

        let raw = track_vcorr(&v, &lags_for(&[&v]), false);
        assert!((raw.rows()[0].mean - 4.0).abs() < 1e-12);
        assert_eq!(raw.rows()[0].n, 3);
    }

    #[test]
    fn vacf_of_reversing_motion_is_negative_at_first_lag() {
        let track = Trajectory::from_rows(&[
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![2.0, 0.0],
            vec![3.0, 1.0],
        ])
        .unwrap();
        let v = velocities(&track);
        let curve = track_vcorr(&v, &lags_for(&[&v]), true);
        assert!((curve.rows()[1].mean + 1.0).abs() < 1e-12);
    }

    #[test]
    fn compute_curves_parallel_matches_serial() {
        let a = linear_track(&[0.0, 1.0, 2.0, 3.0], 1.0);
        let b = linear_track(&[0.0, 2.0, 4.0], 0.5);
        let tracks = [&a, &b];
        let lags = lags_for(&tracks);
        let serial = compute_curves(&SquaredDisplacement, &tracks, &lags, false);
        let parallel = compute_curves(&SquaredDisplacement, &tracks, &lags, true);
        assert_eq!(serial, parallel);
    }
}

//! Time-stamped particle tracks.
//!
//! A [`Trajectory`] is the unit of input for every analysis: an ordered list of
//! samples with one time stamp and one position each. Construction validates
//! the samples once, so downstream code can assume finite values, a single
//! dimensionality and strictly increasing time.

use crate::error::AnalyzerError;
use serde::{Deserialize, Serialize};

/// A single trajectory sample: time stamp plus position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Time of the sample
    pub t: f64,
    /// Position, one coordinate per dimension
    pub position: Vec<f64>,
}

impl TrajectoryPoint {
    /// Creates a new TrajectoryPoint.
    pub fn new(t: f64, position: Vec<f64>) -> Self {
        TrajectoryPoint { t, position }
    }
}

/// A linked particle track.
///
/// Time values are strictly increasing but need not be uniformly spaced, start
/// at zero, or match the time stamps of any other track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedTrajectory")]
pub struct Trajectory {
    points: Vec<TrajectoryPoint>,
}

/// Wire form of a trajectory; deserialized tracks are validated on the way in.
#[derive(Deserialize)]
struct UncheckedTrajectory {
    points: Vec<TrajectoryPoint>,
}

impl TryFrom<UncheckedTrajectory> for Trajectory {
    type Error = AnalyzerError;

    fn try_from(raw: UncheckedTrajectory) -> Result<Self, Self::Error> {
        Trajectory::new(raw.points)
    }
}

impl Trajectory {
    /// Creates a trajectory, checking that times and coordinates are finite,
    /// that times are strictly increasing and that every point has the same
    /// dimensionality.
    ///
    /// # Errors
    /// Returns `AnalyzerError::BadArgument` describing the first offending sample.
    pub fn new(points: Vec<TrajectoryPoint>) -> Result<Self, AnalyzerError> {
        if let Some(first) = points.first() {
            let n_dim = first.position.len();
            for (i, point) in points.iter().enumerate() {
                if !point.t.is_finite() {
                    return Err(AnalyzerError::BadArgument(format!(
                        "sample {} has a non-finite time",
                        i
                    )));
                }
                if let Some(axis) = point.position.iter().position(|x| !x.is_finite()) {
                    return Err(AnalyzerError::BadArgument(format!(
                        "sample {} has a non-finite coordinate on axis {}",
                        i, axis
                    )));
                }
                if point.position.len() != n_dim {
                    return Err(AnalyzerError::BadArgument(format!(
                        "sample {} has {} coordinates, expected {}",
                        i,
                        point.position.len(),
                        n_dim
                    )));
                }
            }
            if let Some(i) = points.windows(2).position(|pair| pair[1].t <= pair[0].t) {
                return Err(AnalyzerError::BadArgument(format!(
                    "time is not strictly increasing at sample {}",
                    i + 1
                )));
            }
        }
        Ok(Trajectory { points })
    }

    /// Builds a trajectory from `[t, x_1, .., x_d]` rows.
    ///
    /// # Arguments
    /// * `rows` - One row per sample, time first
    ///
    /// # Returns
    /// The validated trajectory, or `AnalyzerError::BadArgument` if a row has
    /// no coordinates or the samples fail [`Trajectory::new`].
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, AnalyzerError> {
        let mut points = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() < 2 {
                return Err(AnalyzerError::BadArgument(format!(
                    "row {} needs a time column and at least one coordinate",
                    i
                )));
            }
            points.push(TrajectoryPoint::new(row[0], row[1..].to_vec()));
        }
        Trajectory::new(points)
    }

    /// Used for tracks derived from already-validated input (drift correction,
    /// velocities), which inherit ordering from their source.
    pub(crate) fn from_points_unchecked(points: Vec<TrajectoryPoint>) -> Self {
        Trajectory { points }
    }

    /// Samples in time order.
    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the track has no samples.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Dimensionality of the positions, `None` for an empty track.
    pub fn n_dim(&self) -> Option<usize> {
        self.points.first().map(|point| point.position.len())
    }

    /// Time stamps in order.
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|point| point.t)
    }

    /// Returns the track as `[t, x_1, .., x_d]` rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.points
            .iter()
            .map(|point| {
                let mut row = Vec::with_capacity(point.position.len() + 1);
                row.push(point.t);
                row.extend_from_slice(&point.position);
                row
            })
            .collect()
    }
}

//! Trajectory analytics
//!
//! Pure building blocks of the MSD/VACF engine. Each submodule operates on
//! borrowed trajectories or curves and returns new values; caching and
//! invalidation live in [`crate::analyzer`].
//!
//! - [`delays`]: lag discovery and tolerance binning
//! - [`weighted`]: weighted mean / standard error and the per-lag accumulator
//! - [`curves`]: per-track MSD and VACF
//! - [`ensemble`]: weighted ensemble averaging
//! - [`drift`]: drift estimation and correction

pub mod curves;
pub mod delays;
pub mod drift;
pub mod ensemble;
pub mod weighted;

pub use curves::{compute_curves, velocities, CurveAnalytic, SquaredDisplacement, VelocityCorrelation};
pub use delays::{collect_delays, roundn, Bins, LagSet, LagTolerance};
pub use drift::{correct_track, correct_tracks, estimate_drift, DriftMode};
pub use ensemble::ensemble_curve;
pub use weighted::{weighted_mean, weighted_standard_error, weighted_std, RunningStats};

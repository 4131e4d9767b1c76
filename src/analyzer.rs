//! MSD / VACF analyzer
//!
//! `MsdAnalyzer` owns a set of trajectories and memoizes everything derived
//! from them: the lag set, per-track MSD and VACF curves, and the drift.
//! Every cached value records the track-set revision (and, for curves, the
//! drift revision) it was computed from, and is only served while both still
//! match. Mutations take `&mut self`, so no reader can observe a cache while
//! it is being replaced.

use crate::analytics::curves::{compute_curves, velocities, SquaredDisplacement, VelocityCorrelation};
use crate::analytics::delays::{collect_delays, LagSet, LagTolerance};
use crate::analytics::drift::{correct_tracks, estimate_drift, DriftMode};
use crate::analytics::ensemble::ensemble_curve;
use crate::config::AnalyzerConfig;
use crate::curve::Curve;
use crate::error::AnalyzerError;
use crate::provider::TrajectoryProvider;
use crate::trajectory::Trajectory;
use tracing::debug;

/// Revisions a cached value was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheKey {
    tracks: u64,
    drift: u64,
}

#[derive(Debug, Clone)]
struct Cached<T> {
    key: CacheKey,
    value: T,
}

impl<T> Cached<T> {
    fn current(slot: &Option<Cached<T>>, key: CacheKey) -> Option<&T> {
        slot.as_ref()
            .filter(|cached| cached.key == key)
            .map(|cached| &cached.value)
    }
}

/// Ensemble MSD / VACF analyzer for one dataset.
#[derive(Debug, Clone)]
pub struct MsdAnalyzer {
    n_dim: usize,
    space_units: String,
    time_units: String,
    config: AnalyzerConfig,
    tracks: Vec<Trajectory>,
    track_revision: u64,
    drift_revision: u64,
    delays: Option<Cached<LagSet>>,
    drift: Option<Cached<Trajectory>>,
    msd: Option<Cached<Vec<Curve>>>,
    vcorr: Option<Cached<Vec<Curve>>>,
}

impl MsdAnalyzer {
    /// Creates an empty analyzer with the default configuration.
    ///
    /// # Errors
    /// Returns `AnalyzerError::BadDimensionality` if `n_dim` is zero.
    pub fn new(
        n_dim: usize,
        space_units: impl Into<String>,
        time_units: impl Into<String>,
    ) -> Result<Self, AnalyzerError> {
        Self::with_config(n_dim, space_units, time_units, AnalyzerConfig::default())
    }

    /// Creates an empty analyzer with an explicit configuration.
    ///
    /// # Errors
    /// Returns `AnalyzerError::BadDimensionality` if `n_dim` is zero and
    /// `AnalyzerError::BadArgument` if `config` fails
    /// [`AnalyzerConfig::validate`].
    pub fn with_config(
        n_dim: usize,
        space_units: impl Into<String>,
        time_units: impl Into<String>,
        config: AnalyzerConfig,
    ) -> Result<Self, AnalyzerError> {
        if n_dim == 0 {
            return Err(AnalyzerError::BadDimensionality(n_dim));
        }
        config.validate()?;

        Ok(MsdAnalyzer {
            n_dim,
            space_units: space_units.into(),
            time_units: time_units.into(),
            config,
            tracks: Vec::new(),
            track_revision: 0,
            drift_revision: 0,
            delays: None,
            drift: None,
            msd: None,
            vcorr: None,
        })
    }

    /// Spatial dimensionality every track must have.
    pub fn n_dim(&self) -> usize {
        self.n_dim
    }

    /// Opaque unit label for positions, compared only when pooling.
    pub fn space_units(&self) -> &str {
        &self.space_units
    }

    /// Opaque unit label for time stamps and lags.
    pub fn time_units(&self) -> &str {
        &self.time_units
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Lag tolerance derived from the configured decimal count.
    pub fn tolerance(&self) -> LagTolerance {
        LagTolerance::new(self.config.lag_tolerance_decimals)
    }

    fn key(&self) -> CacheKey {
        CacheKey {
            tracks: self.track_revision,
            drift: self.drift_revision,
        }
    }

    fn track_key(&self) -> CacheKey {
        CacheKey {
            tracks: self.track_revision,
            drift: 0,
        }
    }

    fn check_dimensions(&self, tracks: &[Trajectory]) -> Result<(), AnalyzerError> {
        for (i, track) in tracks.iter().enumerate() {
            if let Some(n_dim) = track.n_dim() {
                if n_dim != self.n_dim {
                    return Err(AnalyzerError::BadArgument(format!(
                        "track {} has dimensionality {}, analyzer expects {}",
                        i, n_dim, self.n_dim
                    )));
                }
            }
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.track_revision += 1;
        debug!(
            "track set changed (revision {}), {} tracks",
            self.track_revision,
            self.tracks.len()
        );
    }

    /// Appends tracks to the analyzer.
    ///
    /// Invalidates every cached lag set, curve and drift.
    pub fn add_all(&mut self, tracks: Vec<Trajectory>) -> Result<(), AnalyzerError> {
        self.check_dimensions(&tracks)?;
        self.tracks.extend(tracks);
        self.invalidate();
        Ok(())
    }

    /// Replaces the whole track set.
    ///
    /// Invalidates every cached lag set, curve and drift.
    pub fn replace_tracks(&mut self, tracks: Vec<Trajectory>) -> Result<(), AnalyzerError> {
        self.check_dimensions(&tracks)?;
        self.tracks = tracks;
        self.invalidate();
        Ok(())
    }

    /// Appends every track of `dataset` from a provider.
    pub fn load_from<P: TrajectoryProvider + ?Sized>(
        &mut self,
        provider: &P,
        dataset: &str,
    ) -> Result<(), AnalyzerError> {
        let tracks = provider.load_tracks(dataset)?;
        self.add_all(tracks)
    }

    /// Raw tracks as ingested.
    pub fn tracks(&self) -> &[Trajectory] {
        &self.tracks
    }

    pub fn n_tracks(&self) -> usize {
        self.tracks.len()
    }

    fn select(&self, indices: &[usize]) -> Result<Vec<&Trajectory>, AnalyzerError> {
        indices
            .iter()
            .map(|&i| {
                self.tracks.get(i).ok_or_else(|| {
                    AnalyzerError::BadArgument(format!(
                        "track index {} out of range for {} tracks",
                        i,
                        self.tracks.len()
                    ))
                })
            })
            .collect()
    }

    /// Distinct lags over all tracks, cached until the track set changes.
    pub fn all_delays(&mut self) -> &LagSet {
        let key = self.track_key();
        let cached = match self.delays.take() {
            Some(cached) if cached.key == key => cached,
            _ => {
                let tracks: Vec<&Trajectory> = self.tracks.iter().collect();
                let parallel = self.config.use_parallel(tracks.len());
                let lags = collect_delays(&tracks, self.tolerance(), parallel);
                Cached { key, value: lags }
            }
        };
        &self.delays.insert(cached).value
    }

    /// Distinct lags over a subset of tracks. Not cached.
    pub fn delays_of(&self, indices: &[usize]) -> Result<LagSet, AnalyzerError> {
        let tracks = self.select(indices)?;
        let parallel = self.config.use_parallel(tracks.len());
        Ok(collect_delays(&tracks, self.tolerance(), parallel))
    }

    fn bump_drift(&mut self) {
        self.drift_revision += 1;
    }

    /// Estimates the ensemble drift and makes it the active correction.
    pub fn compute_drift(&mut self, mode: DriftMode) -> &Trajectory {
        let tracks: Vec<&Trajectory> = self.tracks.iter().collect();
        let drift = estimate_drift(&tracks, self.n_dim, mode, self.tolerance());
        self.bump_drift();
        let key = self.track_key();
        &self.drift.insert(Cached { key, value: drift }).value
    }

    /// Installs a caller-supplied drift trajectory.
    ///
    /// # Errors
    /// Returns `AnalyzerError::BadArgument` if the drift's dimensionality does
    /// not match the analyzer.
    pub fn set_drift(&mut self, drift: Trajectory) -> Result<(), AnalyzerError> {
        if let Some(n_dim) = drift.n_dim() {
            if n_dim != self.n_dim {
                return Err(AnalyzerError::BadArgument(format!(
                    "drift has dimensionality {}, analyzer expects {}",
                    n_dim, self.n_dim
                )));
            }
        }
        self.bump_drift();
        let key = self.track_key();
        self.drift = Some(Cached { key, value: drift });
        Ok(())
    }

    /// Removes the drift correction.
    pub fn clear_drift(&mut self) {
        if self.drift.take().is_some() {
            self.bump_drift();
        }
    }

    /// Active drift, if one was computed for the current track set.
    pub fn drift(&self) -> Option<&Trajectory> {
        Cached::current(&self.drift, self.track_key())
    }

    pub fn drift_valid(&self) -> bool {
        self.drift().is_some()
    }

    /// Tracks with the active drift subtracted, or copies of the raw tracks
    /// when there is none. Raw tracks are never modified.
    pub fn corrected_tracks(&self) -> Vec<Trajectory> {
        match self.drift() {
            Some(drift) => correct_tracks(&self.tracks, drift, self.tolerance()),
            None => self.tracks.clone(),
        }
    }

    /// Runs `f` over the tracks MSD/VACF should see: drift-corrected when a
    /// drift is active, raw otherwise.
    fn with_working_tracks<R>(&self, f: impl FnOnce(&[&Trajectory]) -> R) -> R {
        match self.drift() {
            Some(drift) => {
                let corrected = correct_tracks(&self.tracks, drift, self.tolerance());
                let refs: Vec<&Trajectory> = corrected.iter().collect();
                f(&refs)
            }
            None => {
                let refs: Vec<&Trajectory> = self.tracks.iter().collect();
                f(&refs)
            }
        }
    }

    pub fn msd_valid(&self) -> bool {
        Cached::current(&self.msd, self.key()).is_some()
    }

    /// Per-track MSD curves, computed on first use.
    pub fn compute_msd(&mut self) -> &[Curve] {
        let key = self.key();
        let cached = match self.msd.take() {
            Some(cached) if cached.key == key => cached,
            _ => {
                let lags = self.all_delays().clone();
                let parallel = self.config.use_parallel(self.tracks.len());
                let curves = self.with_working_tracks(|tracks| {
                    compute_curves(&SquaredDisplacement, tracks, &lags, parallel)
                });
                Cached { key, value: curves }
            }
        };
        &self.msd.insert(cached).value
    }

    /// Per-track MSD curves if they are up to date.
    pub fn msd(&self) -> Option<&[Curve]> {
        Cached::current(&self.msd, self.key()).map(Vec::as_slice)
    }

    /// Ensemble MSD over all tracks.
    pub fn mean_msd(&mut self) -> Curve {
        let tolerance = self.tolerance();
        ensemble_curve(self.compute_msd(), tolerance)
    }

    /// Ensemble MSD over a subset of tracks.
    pub fn mean_msd_of(&mut self, indices: &[usize]) -> Result<Curve, AnalyzerError> {
        self.select(indices)?;
        let tolerance = self.tolerance();
        let curves = self.compute_msd();
        Ok(ensemble_curve(indices.iter().map(|&i| &curves[i]), tolerance))
    }

    pub fn vcorr_valid(&self) -> bool {
        Cached::current(&self.vcorr, self.key()).is_some()
    }

    /// Per-track velocity autocorrelation curves, computed on first use.
    pub fn compute_vcorr(&mut self) -> &[Curve] {
        let key = self.key();
        let cached = match self.vcorr.take() {
            Some(cached) if cached.key == key => cached,
            _ => {
                let tolerance = self.tolerance();
                let parallel = self.config.use_parallel(self.tracks.len());
                let analytic = VelocityCorrelation {
                    normalize: self.config.normalize_vacf,
                };
                let curves = self.with_working_tracks(|tracks| {
                    let v: Vec<Trajectory> = tracks.iter().map(|track| velocities(track)).collect();
                    let v_refs: Vec<&Trajectory> = v.iter().collect();
                    // velocity tracks have their own time stamps, hence their own lags
                    let lags = collect_delays(&v_refs, tolerance, parallel);
                    compute_curves(&analytic, &v_refs, &lags, parallel)
                });
                Cached { key, value: curves }
            }
        };
        &self.vcorr.insert(cached).value
    }

    /// Per-track VACF curves if they are up to date.
    pub fn vcorr(&self) -> Option<&[Curve]> {
        Cached::current(&self.vcorr, self.key()).map(Vec::as_slice)
    }

    /// Ensemble VACF over all tracks.
    pub fn mean_vcorr(&mut self) -> Curve {
        let tolerance = self.tolerance();
        ensemble_curve(self.compute_vcorr(), tolerance)
    }

    /// Ensemble VACF over a subset of tracks.
    pub fn mean_vcorr_of(&mut self, indices: &[usize]) -> Result<Curve, AnalyzerError> {
        self.select(indices)?;
        let tolerance = self.tolerance();
        let curves = self.compute_vcorr();
        Ok(ensemble_curve(indices.iter().map(|&i| &curves[i]), tolerance))
    }

    /// Finite-difference velocity tracks of the raw trajectories.
    pub fn velocities(&self, indices: &[usize]) -> Result<Vec<Trajectory>, AnalyzerError> {
        Ok(self
            .select(indices)?
            .into_iter()
            .map(velocities)
            .collect())
    }

    /// Forces drift (when none is active), MSD and VACF. Used before pooling.
    pub(crate) fn prepare_for_pool(&mut self) {
        if !self.drift_valid() {
            let mode = self.config.drift_mode;
            self.compute_drift(mode);
        }
        self.compute_msd();
        self.compute_vcorr();
    }
}

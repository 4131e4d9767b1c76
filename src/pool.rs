//! Pooling of independently analyzed datasets.
//!
//! Pooling concatenates ensemble curves; it does not re-average them. Two
//! sources that both report lag `τ` contribute two rows at `τ`, and the
//! downstream fitter treats them as independent observations. Callers that
//! want one row per lag across every pooled track use
//! [`PooledEnsemble::mean_msd`] / [`PooledEnsemble::mean_vcorr`] explicitly.

use crate::analytics::delays::LagTolerance;
use crate::analytics::ensemble::ensemble_curve;
use crate::analyzer::MsdAnalyzer;
use crate::curve::Curve;
use crate::error::{AnalyzerError, PoolField};
use rayon::prelude::*;
use tracing::debug;

/// Combined curves from several analyzers. Holds no raw trajectories and no
/// drift.
#[derive(Debug, Clone, PartialEq)]
pub struct PooledEnsemble {
    n_dim: usize,
    space_units: String,
    time_units: String,
    tolerance: LagTolerance,
    n_sources: usize,
    msd: Curve,
    vcorr: Curve,
    track_msd: Vec<Curve>,
    track_vcorr: Vec<Curve>,
}

impl PooledEnsemble {
    /// Dimensionality shared by every pooled source.
    pub fn n_dim(&self) -> usize {
        self.n_dim
    }

    pub fn space_units(&self) -> &str {
        &self.space_units
    }

    pub fn time_units(&self) -> &str {
        &self.time_units
    }

    /// Number of analyzers that were pooled.
    pub fn n_sources(&self) -> usize {
        self.n_sources
    }

    /// Concatenated ensemble MSD rows of every source, in source order.
    pub fn msd(&self) -> &Curve {
        &self.msd
    }

    /// Concatenated ensemble VACF rows of every source, in source order.
    pub fn vcorr(&self) -> &Curve {
        &self.vcorr
    }

    /// Per-track MSD curves of every source, in source order.
    pub fn track_msd(&self) -> &[Curve] {
        &self.track_msd
    }

    pub fn track_vcorr(&self) -> &[Curve] {
        &self.track_vcorr
    }

    /// Weighted ensemble MSD over all pooled tracks, one row per lag.
    pub fn mean_msd(&self) -> Curve {
        ensemble_curve(&self.track_msd, self.tolerance)
    }

    /// Weighted ensemble VACF over all pooled tracks, one row per lag.
    pub fn mean_vcorr(&self) -> Curve {
        ensemble_curve(&self.track_vcorr, self.tolerance)
    }
}

fn check_consistency(analyzers: &[MsdAnalyzer]) -> Result<(), AnalyzerError> {
    let first = analyzers
        .first()
        .ok_or_else(|| AnalyzerError::BadArgument("pool: no analyzers given".to_string()))?;

    for (index, other) in analyzers.iter().enumerate().skip(1) {
        let field = if other.n_dim() != first.n_dim() {
            Some(PoolField::Dimensionality)
        } else if other.space_units() != first.space_units() {
            Some(PoolField::SpaceUnits)
        } else if other.time_units() != first.time_units() {
            Some(PoolField::TimeUnits)
        } else {
            None
        };

        if let Some(field) = field {
            return Err(AnalyzerError::InconsistentArray { index, field });
        }
    }
    Ok(())
}

/// Pools several analyzers into one ensemble.
///
/// All inputs are checked before any work is done, so a mismatch produces no
/// partial result. The work runs on copies of the sources: each copy has its
/// drift (if none is active), MSD and VACF forced, so pooled curves are
/// always drift-corrected while the callers' analyzers keep their own state.
///
/// # Errors
/// - `AnalyzerError::BadArgument` if `sources` is empty
/// - `AnalyzerError::InconsistentArray` naming the first analyzer whose
///   dimensionality, space units or time units differ from the first one
pub fn pool(sources: &[MsdAnalyzer]) -> Result<PooledEnsemble, AnalyzerError> {
    check_consistency(sources)?;

    let mut analyzers: Vec<MsdAnalyzer> = sources.to_vec();
    analyzers
        .par_iter_mut()
        .for_each(|analyzer| analyzer.prepare_for_pool());

    let ensembles: Vec<(Curve, Curve)> = analyzers
        .iter_mut()
        .map(|analyzer| (analyzer.mean_msd(), analyzer.mean_vcorr()))
        .collect();

    let mut track_msd = Vec::new();
    let mut track_vcorr = Vec::new();
    for analyzer in analyzers.iter() {
        track_msd.extend(analyzer.msd().unwrap_or_default().iter().cloned());
        track_vcorr.extend(analyzer.vcorr().unwrap_or_default().iter().cloned());
    }

    let first = &analyzers[0];
    let pooled = PooledEnsemble {
        n_dim: first.n_dim(),
        space_units: first.space_units().to_string(),
        time_units: first.time_units().to_string(),
        tolerance: first.tolerance(),
        n_sources: analyzers.len(),
        msd: Curve::concat(ensembles.iter().map(|(msd, _)| msd)),
        vcorr: Curve::concat(ensembles.iter().map(|(_, vcorr)| vcorr)),
        track_msd,
        track_vcorr,
    };

    debug!(
        "pooled {} analyzers: {} MSD rows, {} VACF rows",
        pooled.n_sources,
        pooled.msd.len(),
        pooled.vcorr.len()
    );
    Ok(pooled)
}

//! Ensemble averaging of per-track curves.

use crate::analytics::delays::{Bins, LagTolerance};
use crate::analytics::weighted::{weighted_mean, weighted_standard_error, weighted_std};
use crate::curve::{Curve, CurveRow};

/// Combines per-track curves into one row per lag.
///
/// Each track contributes its mean at a lag weighted by its own pair count.
/// Track lags are re-binned at `tolerance`, so curves produced by different
/// analyzers line up. Lags with no weight are left out and the output is
/// sorted by lag.
pub fn ensemble_curve<'a, I>(curves: I, tolerance: LagTolerance) -> Curve
where
    I: IntoIterator<Item = &'a Curve>,
{
    let contributions: Vec<&CurveRow> = curves
        .into_iter()
        .flat_map(|curve| curve.rows())
        .filter(|row| row.n > 0 && row.mean.is_finite())
        .collect();

    let lags = Bins::from_values(contributions.iter().map(|row| row.lag), tolerance);
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); lags.len()];
    let mut weights: Vec<Vec<f64>> = vec![Vec::new(); lags.len()];

    for row in &contributions {
        if let Some(idx) = lags.index_of(row.lag) {
            values[idx].push(row.mean);
            weights[idx].push(row.n as f64);
        }
    }

    let rows = lags
        .as_slice()
        .iter()
        .zip(values.iter().zip(&weights))
        .filter(|(_, (_, w))| w.iter().sum::<f64>() > 0.0)
        .map(|(&lag, (x, w))| {
            CurveRow::new(
                lag,
                weighted_mean(x, w),
                weighted_std(x, w),
                weighted_standard_error(x, w),
                w.iter().sum::<f64>() as usize,
            )
        })
        .collect();

    Curve::new(rows)
}

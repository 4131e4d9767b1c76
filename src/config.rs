//! Analyzer configuration.

use crate::analytics::drift::DriftMode;
use crate::error::AnalyzerError;
use serde::{Deserialize, Serialize};

/// Number of decimals time values and lags are rounded to before binning.
pub const LAG_TOLERANCE_DECIMALS: u32 = 12;

/// Finest supported rounding; beyond this `f64` has no digits left to round.
pub const MAX_LAG_TOLERANCE_DECIMALS: u32 = 15;

/// Track count from which per-track work is spread over the rayon pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// Analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Lag tolerance as a decimal count (default: 12, i.e. 1e-12)
    pub lag_tolerance_decimals: u32,
    /// Minimum number of tracks before computing in parallel (default: 64)
    pub parallel_threshold: usize,
    /// Divide each per-track VACF by its zero-lag value (default: true)
    pub normalize_vacf: bool,
    /// Drift mode used when pooling forces a drift estimate (default: velocity)
    pub drift_mode: DriftMode,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            lag_tolerance_decimals: LAG_TOLERANCE_DECIMALS,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            normalize_vacf: true,
            drift_mode: DriftMode::Velocity,
        }
    }
}

impl AnalyzerConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` for malformed JSON and for a
    /// `lag_tolerance_decimals` above [`MAX_LAG_TOLERANCE_DECIMALS`].
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let config: AnalyzerConfig = serde_json::from_str(json)?;
        config
            .validate()
            .map_err(|err| <serde_json::Error as serde::de::Error>::custom(err.to_string()))?;
        Ok(config)
    }

    /// Checks that every field is usable by the analyzer.
    ///
    /// # Errors
    /// Returns `AnalyzerError::BadArgument` if `lag_tolerance_decimals`
    /// exceeds [`MAX_LAG_TOLERANCE_DECIMALS`].
    pub fn validate(&self) -> Result<(), AnalyzerError> {
        if self.lag_tolerance_decimals > MAX_LAG_TOLERANCE_DECIMALS {
            return Err(AnalyzerError::BadArgument(format!(
                "lag_tolerance_decimals {} exceeds the maximum of {}",
                self.lag_tolerance_decimals, MAX_LAG_TOLERANCE_DECIMALS
            )));
        }
        Ok(())
    }

    /// Whether `n_tracks` is enough work to hand to rayon.
    pub fn use_parallel(&self, n_tracks: usize) -> bool {
        n_tracks >= self.parallel_threshold.max(1)
    }
}

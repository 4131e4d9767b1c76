pub mod analytics;
pub mod analyzer;
pub mod config;
pub mod curve;
pub mod error;
pub mod pool;
pub mod provider;
pub mod sqlite_provider;
pub mod trajectory;


pub use analytics::{
    roundn,
    weighted_mean,
    weighted_standard_error,
    weighted_std,
    DriftMode,
    LagSet,
    LagTolerance,
};
pub use analyzer::MsdAnalyzer;
pub use config::{AnalyzerConfig, LAG_TOLERANCE_DECIMALS, MAX_LAG_TOLERANCE_DECIMALS};
pub use curve::{Curve, CurveRow};
pub use error::{AnalyzerError, PoolField, ProviderError};
pub use pool::{pool, PooledEnsemble};
pub use provider::{InMemoryTrajectoryProvider, TrajectoryProvider};
pub use sqlite_provider::SqliteTrajectoryProvider;
pub use trajectory::{Trajectory, TrajectoryPoint};

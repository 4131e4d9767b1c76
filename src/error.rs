//! Error types for analyzer construction, ingestion and pooling.

use std::fmt;

/// Which analyzer property disagreed during pooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolField {
    /// Problem dimensionality
    Dimensionality,
    /// Space unit label
    SpaceUnits,
    /// Time unit label
    TimeUnits,
}

impl PoolField {
    /// Returns a string representation of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolField::Dimensionality => "dimensionality",
            PoolField::SpaceUnits => "space units",
            PoolField::TimeUnits => "time units",
        }
    }
}

impl fmt::Display for PoolField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur when loading trajectories from a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Dataset not found in the store
    DatasetNotFound(String),
    /// Stored rows could not be turned into trajectories
    Malformed(String),
    /// Generic error message
    Other(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::DatasetNotFound(name) => write!(f, "Dataset not found: {}", name),
            ProviderError::Malformed(msg) => write!(f, "Malformed trajectory data: {}", msg),
            ProviderError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<rusqlite::Error> for ProviderError {
    fn from(err: rusqlite::Error) -> Self {
        ProviderError::Other(format!("SQL error: {}", err))
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Malformed(format!("JSON error: {}", err))
    }
}

/// Error types for analyzer operations.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerError {
    /// Dimensionality must be a positive integer
    BadDimensionality(usize),
    /// Invalid argument (malformed track, bad index, empty pool input)
    BadArgument(String),
    /// Pool input disagrees with the first analyzer
    InconsistentArray { index: usize, field: PoolField },
    /// Trajectory provider failure
    Provider(ProviderError),
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerError::BadDimensionality(n) => {
                write!(f, "Bad dimensionality: expected a positive integer, got {}", n)
            }
            AnalyzerError::BadArgument(msg) => write!(f, "Bad argument: {}", msg),
            AnalyzerError::InconsistentArray { index, field } => write!(
                f,
                "pool: inconsistent ensemble: element {} does not have the same {} as the first element",
                index, field
            ),
            AnalyzerError::Provider(err) => write!(f, "Provider error: {}", err),
        }
    }
}

impl std::error::Error for AnalyzerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalyzerError::Provider(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProviderError> for AnalyzerError {
    fn from(err: ProviderError) -> Self {
        AnalyzerError::Provider(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inconsistent_array_names_index_and_field() {
        let err = AnalyzerError::InconsistentArray {
            index: 2,
            field: PoolField::SpaceUnits,
        };
        let message = err.to_string();
        assert!(message.contains("element 2"));
        assert!(message.contains("space units"));
    }

    #[test]
    fn provider_errors_convert_and_chain() {
        let err: AnalyzerError = ProviderError::DatasetNotFound("cells".to_string()).into();
        assert_eq!(
            err,
            AnalyzerError::Provider(ProviderError::DatasetNotFound("cells".to_string()))
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}

use crate::error::ProviderError;
use crate::trajectory::Trajectory;
use std::collections::HashMap;

/// Trait for trajectory source abstraction.
///
/// Acquisition and linking happen elsewhere; a provider only hands over
/// already-linked tracks grouped by dataset name.
pub trait TrajectoryProvider {
    /// Retrieves every track of a dataset.
    ///
    /// # Errors
    /// Returns `ProviderError::DatasetNotFound` if the dataset is unknown, or
    /// another variant if the stored data cannot be read.
    fn load_tracks(&self, dataset: &str) -> Result<Vec<Trajectory>, ProviderError>;
}

/// In-memory trajectory provider, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTrajectoryProvider {
    data: HashMap<String, Vec<Trajectory>>,
}

impl InMemoryTrajectoryProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the tracks of a dataset.
    pub fn add_dataset(&mut self, dataset: impl Into<String>, tracks: Vec<Trajectory>) {
        self.data.insert(dataset.into(), tracks);
    }

    /// Removes every dataset.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl TrajectoryProvider for InMemoryTrajectoryProvider {
    fn load_tracks(&self, dataset: &str) -> Result<Vec<Trajectory>, ProviderError> {
        self.data
            .get(dataset)
            .cloned()
            .ok_or_else(|| ProviderError::DatasetNotFound(dataset.to_string()))
    }
}

use ethindex_storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EpochStateError {
    #[error("cannot apply non-continuous epoch {requested} (expected epoch {expected})")]
    NonContinuousEpoch { requested: u64, expected: u64 },
    #[error("cannot export non-finalized epoch {0}")]
    NonFinalizedEpoch(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("validator state serialization failed: {0}")]
    Serialization(String),
    #[error("epoch state engine unavailable: {0}")]
    Unavailable(String),
}

impl EpochStateError {
    /// Whether the request was rejected before anything was mutated.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EpochStateError::NonContinuousEpoch { .. } | EpochStateError::NonFinalizedEpoch(_)
        ) || matches!(self, EpochStateError::Store(StoreError::Validation(_)))
    }
}

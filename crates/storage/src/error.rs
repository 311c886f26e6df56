use crate::api;

/// Errors surfaced by the storage layer.
///
/// `NotFound` is an expected outcome and is kept apart from transport failures
/// so callers can tell an empty chain from an unreachable store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage transport error: {0}")]
    Transport(#[from] api::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("bulk write batch {batch} failed: {source}")]
    BatchFailed {
        batch: usize,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<prost::DecodeError> for StoreError {
    fn from(err: prost::DecodeError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguishable() {
        assert!(StoreError::NotFound("block 7".into()).is_not_found());
        let transport: StoreError = api::Error::from("connection reset").into();
        assert!(!transport.is_not_found());
    }

    #[test]
    fn test_batch_failure_message_names_the_batch() {
        let err = StoreError::BatchFailed {
            batch: 2,
            source: Box::new(StoreError::Transport("disk full".into())),
        };
        assert_eq!(
            err.to_string(),
            "bulk write batch 2 failed: storage transport error: disk full"
        );
    }
}

//! The persisted validator-state snapshot.
//!
//! The whole state is stored as one SSZ value under a single row so that it
//! can be replaced atomically and recovered with a single read.

use std::collections::BTreeMap;

use ethindex_storage::{
    StorageBackend, StoreError, Table,
    api::{DATA_COLUMN, DEFAULT_FAMILY, Mutation},
    keys::VALIDATOR_STATE_KEY,
};
use ethindex_types::validator::ValidatorRecord;
use ssz::{Decode, Encode};
use ssz_derive::{Decode, Encode};

use crate::error::EpochStateError;

/// Highest fully processed epoch and every validator seen up to it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidatorState {
    pub epoch: u64,
    pub validators: BTreeMap<u64, ValidatorRecord>,
}

#[derive(Encode, Decode)]
struct StoredState {
    epoch: u64,
    validators: Vec<ValidatorRecord>,
}

impl ValidatorState {
    pub fn validator(&self, index: u64) -> Option<&ValidatorRecord> {
        self.validators.get(&index)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        StoredState {
            epoch: self.epoch,
            validators: self.validators.values().cloned().collect(),
        }
        .as_ssz_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EpochStateError> {
        let stored = StoredState::from_ssz_bytes(bytes)
            .map_err(|err| EpochStateError::Serialization(format!("{err:?}")))?;
        Ok(Self {
            epoch: stored.epoch,
            validators: stored
                .validators
                .into_iter()
                .map(|record| (record.index, record))
                .collect(),
        })
    }
}

/// Read the stored snapshot, if any.
pub fn load(backend: &dyn StorageBackend) -> Result<Option<ValidatorState>, EpochStateError> {
    let view = backend
        .begin_read()
        .map_err(StoreError::from)?;
    let row = view
        .read_row(Table::ValidatorState, VALIDATOR_STATE_KEY)
        .map_err(StoreError::from)?;
    row.as_ref()
        .and_then(|row| row.latest(DEFAULT_FAMILY, DATA_COLUMN))
        .map(|cell| ValidatorState::from_bytes(&cell.value))
        .transpose()
}

/// Overwrite the stored snapshot.
pub fn persist(backend: &dyn StorageBackend, state: &ValidatorState) -> Result<(), EpochStateError> {
    let mutation = Mutation::new().set(DEFAULT_FAMILY, DATA_COLUMN, 0, state.to_bytes());
    let mut batch = backend
        .begin_write()
        .map_err(StoreError::from)?;
    batch
        .apply(Table::ValidatorState, VALIDATOR_STATE_KEY, mutation)
        .map_err(StoreError::from)?;
    batch.commit().map_err(StoreError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethindex_storage::{SchemaAdmin, backend::InMemoryBackend};
    use ethindex_types::validator::ValidatorStatus;
    use std::sync::Arc;

    fn state() -> ValidatorState {
        let mut validators = BTreeMap::new();
        for index in [0, 5] {
            validators.insert(
                index,
                ValidatorRecord {
                    index,
                    pubkey: vec![index as u8; 48],
                    balance: 32_000_000_000,
                    last_attestation_slot: 300,
                    status: ValidatorStatus::ActiveOnline,
                    ..Default::default()
                },
            );
        }
        ValidatorState {
            epoch: 9,
            validators,
        }
    }

    #[test]
    fn test_bytes_round_trip() {
        let state = state();
        assert_eq!(ValidatorState::from_bytes(&state.to_bytes()).unwrap(), state);
    }

    #[test]
    fn test_corrupt_bytes_rejected() {
        let err = ValidatorState::from_bytes(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, EpochStateError::Serialization(_)));
    }

    #[test]
    fn test_load_and_persist() {
        let backend = InMemoryBackend::new();
        SchemaAdmin::new(Arc::new(backend.clone()))
            .setup_core()
            .unwrap();

        assert_eq!(load(&backend).unwrap(), None);
        persist(&backend, &state()).unwrap();
        assert_eq!(load(&backend).unwrap(), Some(state()));
    }
}

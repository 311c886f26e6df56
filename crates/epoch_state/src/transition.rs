use ethindex_types::{epoch::EpochData, validator::ValidatorRecord};
use tracing::warn;

use crate::error::EpochStateError;
use crate::snapshot::ValidatorState;
use crate::status::{StatusInputs, derive_status, threshold_slot};

/// Whether the balance seen at `epoch` is the validator's activation balance.
///
/// State starts at epoch 0 and the first advance is to epoch 1, so genesis
/// validators (activation epoch 0) get theirs recorded at epoch 1.
fn records_activation_balance(epoch: u64, activation_epoch: u64) -> bool {
    epoch == activation_epoch || (epoch == 1 && activation_epoch == 0)
}

/// Build the state for `data.epoch` from `current`.
///
/// `current` is never modified. Fails without doing any work unless
/// `data.epoch` immediately follows `current.epoch`.
pub fn apply_epoch(
    current: &ValidatorState,
    data: &EpochData,
    slots_per_epoch: u64,
) -> Result<ValidatorState, EpochStateError> {
    let expected = current.epoch.checked_add(1);
    if expected != Some(data.epoch) {
        return Err(EpochStateError::NonContinuousEpoch {
            requested: data.epoch,
            expected: current.epoch.saturating_add(1),
        });
    }
    let epoch = data.epoch;
    let mut next = current.clone();

    for snapshot in &data.validators {
        let record = next
            .validators
            .entry(snapshot.index)
            .or_insert_with(|| ValidatorRecord::new(snapshot));
        record.update_from(snapshot);
        if records_activation_balance(epoch, snapshot.activation_epoch) {
            record.balance_activation = snapshot.balance;
        }
    }

    for (attester, slot) in data.attester_slots() {
        match next.validators.get_mut(&attester) {
            Some(record) => record.last_attestation_slot = slot,
            None => warn!(%epoch, %attester, %slot, "Skipping attestation from unknown validator"),
        }
    }
    for block in &data.blocks {
        match next.validators.get_mut(&block.proposer) {
            Some(record) => record.last_proposal_slot = block.slot,
            None => warn!(%epoch, proposer = block.proposer, slot = block.slot, "Skipping proposal from unknown validator"),
        }
    }

    let threshold = threshold_slot(epoch, slots_per_epoch);
    for record in next.validators.values_mut() {
        record.status = derive_status(&StatusInputs::from_record(record, epoch, threshold));
    }

    next.epoch = epoch;
    Ok(next)
}

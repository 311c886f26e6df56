//! Validator status derivation.
//!
//! Statuses come from an ordered list of `(predicate, status)` rules. The
//! first rule whose predicate holds wins, and the last rule always holds.

use ethindex_types::{
    FAR_FUTURE_EPOCH,
    validator::{ValidatorRecord, ValidatorStatus},
};

/// How far back (in slots) an attestation still counts as "online".
pub const OFFLINE_LOOKBACK_SLOTS: u64 = 96;

/// First slot an attestation must reach for the validator to be online.
///
/// Zero for the first two epochs and whenever the lookback reaches past genesis.
pub fn threshold_slot(epoch: u64, slots_per_epoch: u64) -> u64 {
    if epoch < 2 {
        return 0;
    }
    epoch
        .saturating_mul(slots_per_epoch)
        .saturating_sub(OFFLINE_LOOKBACK_SLOTS)
}

/// Everything the status rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInputs {
    pub exit_epoch: u64,
    pub slashed: bool,
    pub activation_eligibility_epoch: u64,
    pub activation_epoch: u64,
    pub last_attestation_slot: u64,
    pub threshold_slot: u64,
    pub epoch: u64,
}

impl StatusInputs {
    pub fn from_record(record: &ValidatorRecord, epoch: u64, threshold_slot: u64) -> Self {
        Self {
            exit_epoch: record.exit_epoch,
            slashed: record.slashed,
            activation_eligibility_epoch: record.activation_eligibility_epoch,
            activation_epoch: record.activation_epoch,
            last_attestation_slot: record.last_attestation_slot,
            threshold_slot,
            epoch,
        }
    }

    fn is_offline(&self) -> bool {
        self.last_attestation_slot < self.threshold_slot || self.last_attestation_slot == 0
    }

    fn has_exited(&self) -> bool {
        self.exit_epoch <= self.epoch
    }

    fn is_exiting(&self) -> bool {
        self.exit_epoch < FAR_FUTURE_EPOCH
    }
}

pub struct StatusRule {
    pub name: &'static str,
    pub predicate: fn(&StatusInputs) -> bool,
    pub status: ValidatorStatus,
}

pub static STATUS_RULES: [StatusRule; 10] = [
    StatusRule {
        name: "exited while slashed",
        predicate: |v| v.has_exited() && v.slashed,
        status: ValidatorStatus::Slashed,
    },
    StatusRule {
        name: "exited",
        predicate: |v| v.has_exited(),
        status: ValidatorStatus::Exited,
    },
    StatusRule {
        name: "not eligible for activation",
        predicate: |v| v.activation_eligibility_epoch == FAR_FUTURE_EPOCH,
        status: ValidatorStatus::Deposited,
    },
    StatusRule {
        name: "activating",
        predicate: |v| v.activation_epoch >= v.epoch,
        status: ValidatorStatus::Pending,
    },
    StatusRule {
        name: "slashed and offline",
        predicate: |v| v.slashed && v.activation_epoch < v.epoch && v.is_offline(),
        status: ValidatorStatus::SlashingOffline,
    },
    StatusRule {
        name: "slashed",
        predicate: |v| v.slashed,
        status: ValidatorStatus::SlashingOnline,
    },
    StatusRule {
        name: "exiting and offline",
        predicate: |v| v.is_exiting() && v.is_offline(),
        status: ValidatorStatus::ExitingOffline,
    },
    StatusRule {
        name: "exiting",
        predicate: |v| v.is_exiting(),
        status: ValidatorStatus::ExitingOnline,
    },
    StatusRule {
        name: "active and offline",
        predicate: |v| v.activation_epoch < v.epoch && v.is_offline(),
        status: ValidatorStatus::ActiveOffline,
    },
    StatusRule {
        name: "active",
        predicate: |_| true,
        status: ValidatorStatus::ActiveOnline,
    },
];

/// Index into [`STATUS_RULES`] of the first rule that holds.
pub fn matching_rule(inputs: &StatusInputs) -> usize {
    STATUS_RULES
        .iter()
        .position(|rule| (rule.predicate)(inputs))
        .unwrap_or(STATUS_RULES.len() - 1)
}

pub fn derive_status(inputs: &StatusInputs) -> ValidatorStatus {
    STATUS_RULES[matching_rule(inputs)].status
}

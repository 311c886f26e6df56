//! Per-epoch input delivered by the consensus data source, and the records
//! derived from it for export.

use serde::{Deserialize, Serialize};

use crate::validator::ValidatorSnapshot;

/// Attestation as seen inside a block: the attested slot and who attested.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockAttestation {
    pub slot: u64,
    pub attesters: Vec<u64>,
}

/// A beacon block included in an epoch.
///
/// Only the parts the indexer consumes are modelled; operations other than
/// attestations are carried as counts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EpochBlock {
    pub slot: u64,
    pub proposer: u64,
    #[serde(default)]
    pub block_root: Vec<u8>,
    #[serde(default)]
    pub attestations: Vec<BlockAttestation>,
    #[serde(default)]
    pub proposer_slashings: u64,
    #[serde(default)]
    pub attester_slashings: u64,
    #[serde(default)]
    pub deposits: u64,
    #[serde(default)]
    pub voluntary_exits: u64,
}

/// Participation figures for an epoch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpochParticipation {
    pub finalized: bool,
    pub eligible_ether: u64,
    pub global_participation_rate: f32,
    pub voted_ether: u64,
}

/// Everything the upstream source produces once per epoch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpochData {
    pub epoch: u64,
    pub validators: Vec<ValidatorSnapshot>,
    pub blocks: Vec<EpochBlock>,
    #[serde(default)]
    pub participation: EpochParticipation,
}

impl EpochData {
    /// Iterate every (attester, attested slot) pair across all blocks.
    pub fn attester_slots(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.blocks.iter().flat_map(|block| {
            block.attestations.iter().flat_map(|attestation| {
                attestation
                    .attesters
                    .iter()
                    .map(move |attester| (*attester, attestation.slot))
            })
        })
    }
}

/// Aggregate statistics written to the epochs table.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EpochSummary {
    #[prost(uint64, tag = "1")]
    pub epoch: u64,
    #[prost(uint64, tag = "2")]
    pub blocks_count: u64,
    #[prost(uint64, tag = "3")]
    pub proposer_slashings_count: u64,
    #[prost(uint64, tag = "4")]
    pub attester_slashings_count: u64,
    #[prost(uint64, tag = "5")]
    pub attestations_count: u64,
    #[prost(uint64, tag = "6")]
    pub deposits_count: u64,
    #[prost(uint64, tag = "7")]
    pub voluntary_exits_count: u64,
    #[prost(uint64, tag = "8")]
    pub validators_count: u64,
    #[prost(uint64, tag = "9")]
    pub validator_balance_average: u64,
    #[prost(uint64, tag = "10")]
    pub validator_balance_sum: u64,
    #[prost(bool, tag = "11")]
    pub finalized: bool,
    #[prost(uint64, tag = "12")]
    pub eligible_ether: u64,
    #[prost(float, tag = "13")]
    pub global_participation_rate: f32,
    #[prost(uint64, tag = "14")]
    pub voted_ether: u64,
}

/// One row of the immutable balance history, keyed `<index>#<epoch>`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ValidatorBalanceRecord {
    #[prost(uint64, tag = "1")]
    pub balance: u64,
    #[prost(uint64, tag = "2")]
    pub effective_balance: u64,
}

/// Full per-epoch validator export used for aggregate statistics.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ValidatorExportRecord {
    #[prost(bytes = "vec", tag = "1")]
    pub pubkey: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub withdrawable_epoch: u64,
    #[prost(bytes = "vec", tag = "3")]
    pub withdrawal_credentials: Vec<u8>,
    #[prost(uint64, tag = "4")]
    pub balance: u64,
    #[prost(uint64, tag = "5")]
    pub effective_balance: u64,
    #[prost(bool, tag = "6")]
    pub slashed: bool,
    #[prost(uint64, tag = "7")]
    pub activation_eligibility_epoch: u64,
    #[prost(uint64, tag = "8")]
    pub activation_epoch: u64,
    #[prost(uint64, tag = "9")]
    pub exit_epoch: u64,
    #[prost(uint64, tag = "10")]
    pub balance_1d: u64,
    #[prost(uint64, tag = "11")]
    pub balance_7d: u64,
    #[prost(uint64, tag = "12")]
    pub balance_31d: u64,
}

impl From<&ValidatorSnapshot> for ValidatorBalanceRecord {
    fn from(validator: &ValidatorSnapshot) -> Self {
        Self {
            balance: validator.balance,
            effective_balance: validator.effective_balance,
        }
    }
}

impl From<&ValidatorSnapshot> for ValidatorExportRecord {
    fn from(validator: &ValidatorSnapshot) -> Self {
        Self {
            pubkey: validator.pubkey.clone(),
            withdrawable_epoch: validator.withdrawable_epoch,
            withdrawal_credentials: validator.withdrawal_credentials.clone(),
            balance: validator.balance,
            effective_balance: validator.effective_balance,
            slashed: validator.slashed,
            activation_eligibility_epoch: validator.activation_eligibility_epoch,
            activation_epoch: validator.activation_epoch,
            exit_epoch: validator.exit_epoch,
            balance_1d: validator.balance_1d,
            balance_7d: validator.balance_7d,
            balance_31d: validator.balance_31d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_data_from_json() {
        let json = r#"{
            "epoch": 12,
            "validators": [{
                "index": 0,
                "balance": 32000000000,
                "effective_balance": 32000000000,
                "slashed": false,
                "activation_eligibility_epoch": 0,
                "activation_epoch": 0,
                "exit_epoch": 18446744073709551615,
                "withdrawable_epoch": 18446744073709551615
            }],
            "blocks": [{
                "slot": 384,
                "proposer": 0,
                "attestations": [{ "slot": 383, "attesters": [0, 1] }]
            }]
        }"#;

        let data: EpochData = serde_json::from_str(json).unwrap();
        assert_eq!(data.epoch, 12);
        assert_eq!(data.validators[0].exit_epoch, crate::FAR_FUTURE_EPOCH);
        assert!(!data.participation.finalized);
        let pairs: Vec<_> = data.attester_slots().collect();
        assert_eq!(pairs, vec![(0, 383), (1, 383)]);
    }
}

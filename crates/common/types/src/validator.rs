use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use ssz_derive::{Decode, Encode};

/// Lifecycle label derived from a validator's epoch-relative fields.
///
/// This is not protocol state: it is recomputed on every epoch advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ValidatorStatus {
    #[default]
    Deposited = 0,
    Pending = 1,
    ActiveOnline = 2,
    ActiveOffline = 3,
    ExitingOnline = 4,
    ExitingOffline = 5,
    SlashingOnline = 6,
    SlashingOffline = 7,
    Exited = 8,
    Slashed = 9,
}

/// All status variants, in discriminant order.
pub const ALL_STATUSES: [ValidatorStatus; 10] = [
    ValidatorStatus::Deposited,
    ValidatorStatus::Pending,
    ValidatorStatus::ActiveOnline,
    ValidatorStatus::ActiveOffline,
    ValidatorStatus::ExitingOnline,
    ValidatorStatus::ExitingOffline,
    ValidatorStatus::SlashingOnline,
    ValidatorStatus::SlashingOffline,
    ValidatorStatus::Exited,
    ValidatorStatus::Slashed,
];

impl ValidatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorStatus::Deposited => "deposited",
            ValidatorStatus::Pending => "pending",
            ValidatorStatus::ActiveOnline => "active_online",
            ValidatorStatus::ActiveOffline => "active_offline",
            ValidatorStatus::ExitingOnline => "exiting_online",
            ValidatorStatus::ExitingOffline => "exiting_offline",
            ValidatorStatus::SlashingOnline => "slashing_online",
            ValidatorStatus::SlashingOffline => "slashing_offline",
            ValidatorStatus::Exited => "exited",
            ValidatorStatus::Slashed => "slashed",
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        ALL_STATUSES.get(value as usize).copied()
    }
}

impl std::fmt::Display for ValidatorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Statuses travel inside the SSZ state snapshot as a single byte.
impl Encode for ValidatorStatus {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        1
    }

    fn ssz_bytes_len(&self) -> usize {
        1
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        buf.push(*self as u8);
    }
}

impl Decode for ValidatorStatus {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        1
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let [byte] = bytes else {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: 1,
            });
        };
        Self::from_u8(*byte)
            .ok_or_else(|| DecodeError::BytesInvalid(format!("unknown validator status {byte}")))
    }
}

/// A validator as reported by the upstream epoch-data source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidatorSnapshot {
    pub index: u64,
    #[serde(default)]
    pub pubkey: Vec<u8>,
    pub balance: u64,
    pub effective_balance: u64,
    pub slashed: bool,
    pub activation_eligibility_epoch: u64,
    pub activation_epoch: u64,
    pub exit_epoch: u64,
    pub withdrawable_epoch: u64,
    #[serde(default)]
    pub withdrawal_credentials: Vec<u8>,
    #[serde(default)]
    pub balance_1d: u64,
    #[serde(default)]
    pub balance_7d: u64,
    #[serde(default)]
    pub balance_31d: u64,
}

/// A validator as tracked by the epoch state engine.
///
/// Created the first time the validator shows up in an epoch and carried
/// forward from then on. Records are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct ValidatorRecord {
    pub index: u64,
    pub pubkey: Vec<u8>,
    pub balance: u64,
    pub effective_balance: u64,
    pub slashed: bool,
    pub activation_eligibility_epoch: u64,
    pub activation_epoch: u64,
    pub exit_epoch: u64,
    pub withdrawable_epoch: u64,
    pub withdrawal_credentials: Vec<u8>,
    pub balance_1d: u64,
    pub balance_7d: u64,
    pub balance_31d: u64,
    pub last_attestation_slot: u64,
    pub last_proposal_slot: u64,
    /// Balance observed in the epoch the validator activated.
    pub balance_activation: u64,
    pub status: ValidatorStatus,
}

impl ValidatorRecord {
    /// Create a fresh record for a validator seen for the first time.
    pub fn new(snapshot: &ValidatorSnapshot) -> Self {
        let mut record = Self {
            index: snapshot.index,
            pubkey: snapshot.pubkey.clone(),
            ..Default::default()
        };
        record.update_from(snapshot);
        record
    }

    /// Overwrite every field the upstream source owns.
    ///
    /// Attestation/proposal slots, activation balance and status are left alone.
    pub fn update_from(&mut self, snapshot: &ValidatorSnapshot) {
        self.balance = snapshot.balance;
        self.effective_balance = snapshot.effective_balance;
        self.slashed = snapshot.slashed;
        self.activation_eligibility_epoch = snapshot.activation_eligibility_epoch;
        self.activation_epoch = snapshot.activation_epoch;
        self.exit_epoch = snapshot.exit_epoch;
        self.withdrawable_epoch = snapshot.withdrawable_epoch;
        self.withdrawal_credentials = snapshot.withdrawal_credentials.clone();
        self.balance_1d = snapshot.balance_1d;
        self.balance_7d = snapshot.balance_7d;
        self.balance_31d = snapshot.balance_31d;
    }
}

//! Row key formats.

use crate::error::StoreError;

/// Default ceiling for block numbers encoded in block keys.
///
/// Keys store `MAX_BLOCK - number` zero-padded to the width of
/// `MAX_BLOCK - 1`, so only numbers in `1..=MAX_BLOCK` are representable.
pub const MAX_BLOCK: u64 = 1_000_000_000;

/// Key of the single validator-state snapshot row.
pub const VALIDATOR_STATE_KEY: &str = "state";

/// Encodes block numbers as `<chain>:<padded reversed number>`.
///
/// Lexicographic order over these keys is descending block order, so a
/// forward scan from the chain prefix yields the newest blocks first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockKeys {
    chain_id: String,
    max_block: u64,
    width: usize,
}

impl BlockKeys {
    pub fn new(chain_id: impl Into<String>, max_block: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            max_block,
            width: max_block.saturating_sub(1).to_string().len(),
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn max_block(&self) -> u64 {
        self.max_block
    }

    /// Common prefix of every key on this chain.
    pub fn prefix(&self) -> String {
        format!("{}:", self.chain_id)
    }

    pub fn encode(&self, number: u64) -> Result<String, StoreError> {
        if number == 0 || number > self.max_block {
            return Err(StoreError::Validation(format!(
                "block number {number} outside encodable range 1..={}",
                self.max_block
            )));
        }
        Ok(format!(
            "{}:{:0width$}",
            self.chain_id,
            self.max_block - number,
            width = self.width
        ))
    }
}

/// Key of an epoch summary row.
pub fn epoch_key(epoch: u64) -> String {
    epoch.to_string()
}

/// Key of a per-validator, per-epoch export row.
pub fn validator_epoch_key(index: u64, epoch: u64) -> String {
    format!("{index}#{epoch}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed_keys_sort_newest_first() {
        let keys = BlockKeys::new("1", MAX_BLOCK);
        let older = keys.encode(100).unwrap();
        let newer = keys.encode(101).unwrap();
        assert_eq!(older, "1:999999900");
        assert_eq!(newer, "1:999999899");
        assert!(newer < older);
    }

    #[test]
    fn test_fixed_width() {
        let keys = BlockKeys::new("5", MAX_BLOCK);
        assert_eq!(keys.encode(MAX_BLOCK).unwrap(), "5:000000000");
        assert_eq!(keys.encode(1).unwrap(), "5:999999999");
    }

    #[test]
    fn test_out_of_range_numbers_rejected() {
        let keys = BlockKeys::new("1", MAX_BLOCK);
        assert!(matches!(keys.encode(0), Err(StoreError::Validation(_))));
        assert!(matches!(
            keys.encode(MAX_BLOCK + 1),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_overridden_ceiling() {
        let keys = BlockKeys::new("1", 1_000);
        assert_eq!(keys.encode(1).unwrap(), "1:999");
        assert_eq!(keys.encode(999).unwrap(), "1:001");
        assert!(keys.encode(1_001).is_err());
    }

    #[test]
    fn test_row_keys() {
        assert_eq!(epoch_key(42), "42");
        assert_eq!(validator_epoch_key(7, 42), "7#42");
    }
}

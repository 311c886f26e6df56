//! Execution-layer block records as stored by the block store.

use crate::ShortHash;

/// A canonical execution block together with its opaque payloads.
///
/// Encoded as a field-numbered protobuf message so new fields can be appended
/// without invalidating rows that were written by older versions.
#[derive(Clone, PartialEq, prost::Message)]
pub struct BlockRecord {
    /// Block height. Unique per chain.
    #[prost(uint64, tag = "1")]
    pub number: u64,

    #[prost(bytes = "vec", tag = "2")]
    pub hash: Vec<u8>,

    #[prost(bytes = "vec", tag = "3")]
    pub parent_hash: Vec<u8>,

    /// Unix timestamp in seconds.
    #[prost(uint64, tag = "4")]
    pub timestamp: u64,

    /// Raw header as delivered by the execution node.
    #[prost(bytes = "vec", tag = "5")]
    pub header: Vec<u8>,

    /// One opaque entry per transaction receipt.
    #[prost(bytes = "vec", repeated, tag = "6")]
    pub receipts: Vec<Vec<u8>>,

    /// One opaque entry per transaction trace.
    #[prost(bytes = "vec", repeated, tag = "7")]
    pub traces: Vec<Vec<u8>>,
}

impl BlockRecord {
    pub fn short_hash(&self) -> ShortHash<'_> {
        ShortHash(&self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_unknown_fields_are_skipped() {
        let block = BlockRecord {
            number: 7,
            hash: vec![0xaa; 32],
            ..Default::default()
        };
        let mut bytes = block.encode_to_vec();
        // Field 15, varint 1: written by some future version of the record.
        bytes.extend_from_slice(&[0x78, 0x01]);

        let decoded = BlockRecord::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_short_hash() {
        let block = BlockRecord {
            hash: vec![0xde, 0xad, 0xbe, 0xef, 0x01],
            ..Default::default()
        };
        assert_eq!(block.short_hash().to_string(), "deadbeef");
    }
}

pub mod block;
pub mod epoch;
pub mod primitives;
pub mod validator;

/// Sentinel used by the beacon chain for "never" epochs (2^64 - 1).
pub const FAR_FUTURE_EPOCH: u64 = u64::MAX;

/// Display helper for truncated hashes (8 hex chars)
pub struct ShortHash<'a>(pub &'a [u8]);

impl std::fmt::Display for ShortHash<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0.iter().take(4) {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

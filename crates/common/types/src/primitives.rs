// Re-export codec traits to avoid users having to depend on these directly
pub use prost::Message;
pub use ssz::{Decode, DecodeError, Encode};

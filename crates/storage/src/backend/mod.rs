//! Storage backend implementations.
//!
//! This module provides concrete implementations of the [`crate::api::StorageBackend`]
//! and [`crate::api::AdminBackend`] traits.
//!
//! # Backends
//!
//! - [`InMemoryBackend`]: Thread-safe in-memory storage using `RwLock<HashMap>` of
//!   ordered maps. Suitable for tests and throwaway runs. Data is lost on restart.
//!
//! - [`RocksDBBackend`] (requires `rocksdb` feature): Persistent storage using RocksDB,
//!   one column family per table.

mod in_memory;
#[cfg(feature = "rocksdb")]
mod rocksdb;

pub use in_memory::InMemoryBackend;
#[cfg(feature = "rocksdb")]
pub use rocksdb::RocksDBBackend;

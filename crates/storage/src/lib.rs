mod admin;
pub mod api;
pub mod backend;
mod block_store;
mod bulk;
mod cache;
mod error;
pub mod keys;
mod metrics;

pub use admin::{FamilySpec, SchemaAdmin, TableSpec, cache_table, core_tables};
pub use api::{AdminBackend, StorageBackend, Table};
pub use block_store::BlockStore;
pub use bulk::{BulkWriteSummary, BulkWriter, DEFAULT_BATCH_SIZE};
pub use cache::{CacheLifetime, CacheStore};
pub use error::StoreError;

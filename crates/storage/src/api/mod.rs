//! Storage backend API.
//!
//! This module defines the traits and types for pluggable wide-column backends.
//!
//! # Traits
//!
//! - [`StorageBackend`]: Main trait for storage implementations. Creates read views and write batches.
//! - [`StorageReadView`]: Read-only access via exact-key `read_row` and ordered `scan`.
//! - [`StorageWriteBatch`]: Row mutations applied together on `commit`.
//! - [`AdminBackend`]: Table and column-family management, including GC policies.
//!
//! # Data model
//!
//! Storage is organized into [`Table`]s. A table holds rows sorted by their
//! UTF-8 key. Each [`Row`] groups its cells by column family and column; a
//! column keeps several timestamped [`Cell`] versions, newest first, subject
//! to the family's [`GcPolicy`].

mod row;
mod schema;
mod tables;
mod traits;

pub use row::{Cell, Mutation, MutationOp, Row, RowRange, now_micros};
pub use schema::{GcPolicy, TableInfo, TableSchema};
pub use tables::{ALL_TABLES, DATA_COLUMN, DEFAULT_FAMILY, Table};
pub use traits::{AdminBackend, Error, RowResult, StorageBackend, StorageReadView, StorageWriteBatch};

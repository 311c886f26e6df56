use super::{GcPolicy, Mutation, Row, RowRange, Table, TableInfo};

/// Storage error type.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Result type for scan iterator items.
pub type RowResult = Result<Row, Error>;

/// A storage backend that can create read views and write batches.
pub trait StorageBackend: Send + Sync {
    /// Begin a read-only view.
    fn begin_read(&self) -> Result<Box<dyn StorageReadView + '_>, Error>;

    /// Begin a write batch.
    fn begin_write(&self) -> Result<Box<dyn StorageWriteBatch + 'static>, Error>;
}

/// A read-only view of the storage.
///
/// Cells already collected by their family's GC policy are never returned,
/// and rows left without cells are treated as absent.
pub trait StorageReadView {
    /// Get a row by its exact key.
    fn read_row(&self, table: Table, key: &str) -> Result<Option<Row>, Error>;

    /// Iterate rows in ascending key order within `range`, up to `limit` rows.
    fn scan(
        &self,
        table: Table,
        range: &RowRange,
        limit: usize,
    ) -> Result<Box<dyn Iterator<Item = RowResult> + '_>, Error>;
}

/// A batch of row mutations.
///
/// Every mutation touches a single row, and each row is updated atomically.
/// Committing a batch is the bulk multi-row apply of the store.
pub trait StorageWriteBatch: Send {
    /// Queue a mutation for the row at `key`.
    fn apply(&mut self, table: Table, key: &str, mutation: Mutation) -> Result<(), Error>;

    /// Commit the batch, consuming it.
    fn commit(self: Box<Self>) -> Result<(), Error>;
}

/// Administrative operations over tables and column families.
pub trait AdminBackend: Send + Sync {
    /// Names of all existing tables.
    fn tables(&self) -> Result<Vec<String>, Error>;

    /// Column families of an existing table.
    fn table_info(&self, table: Table) -> Result<TableInfo, Error>;

    /// Create an empty table. Fails if it already exists.
    fn create_table(&self, table: Table) -> Result<(), Error>;

    /// Create a column family with no GC policy. Fails if it already exists.
    fn create_column_family(&self, table: Table, family: &str) -> Result<(), Error>;

    /// Replace the GC policy of an existing column family.
    fn set_gc_policy(&self, table: Table, family: &str, policy: &GcPolicy) -> Result<(), Error>;

    /// Drop a table and all its rows.
    fn delete_table(&self, table: Table) -> Result<(), Error>;
}

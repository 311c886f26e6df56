//! RocksDB storage backend.
//!
//! Every table lives in its own column family. A row is stored as a single
//! SSZ-encoded value holding all of its families, columns and cell versions,
//! so row mutations are read-modify-write under a writer lock. Table schemas
//! (families and GC policies) are kept as JSON in the default column family.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use rocksdb::{
    DBWithThreadMode, DEFAULT_COLUMN_FAMILY_NAME, Direction, IteratorMode, MultiThreaded, Options,
    WriteBatch, WriteOptions,
};
use ssz::{Decode, Encode};
use ssz_derive::{Decode, Encode};

use crate::api::{
    ALL_TABLES, AdminBackend, Cell, Error, GcPolicy, Mutation, Row, RowRange, RowResult,
    StorageBackend, StorageReadView, StorageWriteBatch, Table, TableInfo, TableSchema, now_micros,
};

type Db = DBWithThreadMode<MultiThreaded>;
type Schemas = BTreeMap<Table, TableSchema>;

fn schema_key(table: Table) -> String {
    format!("schema:{}", table.name())
}

fn table_not_found(table: Table) -> Error {
    format!("Table {} not found", table.name()).into()
}

#[derive(Encode, Decode)]
struct StoredCell {
    timestamp: u64,
    value: Vec<u8>,
}

#[derive(Encode, Decode)]
struct StoredColumn {
    family: Vec<u8>,
    column: Vec<u8>,
    cells: Vec<StoredCell>,
}

#[derive(Encode, Decode)]
struct StoredRow {
    columns: Vec<StoredColumn>,
}

fn encode_row(row: &Row) -> Vec<u8> {
    let mut columns: Vec<StoredColumn> = Vec::new();
    for (family, column, cell) in row.iter_cells() {
        let stored = StoredCell {
            timestamp: cell.timestamp,
            value: cell.value.clone(),
        };
        match columns.last_mut() {
            Some(last) if last.family == family.as_bytes() && last.column == column.as_bytes() => {
                last.cells.push(stored)
            }
            _ => columns.push(StoredColumn {
                family: family.as_bytes().to_vec(),
                column: column.as_bytes().to_vec(),
                cells: vec![stored],
            }),
        }
    }
    StoredRow { columns }.as_ssz_bytes()
}

fn decode_row(key: &str, bytes: &[u8]) -> Result<Row, Error> {
    let stored =
        StoredRow::from_ssz_bytes(bytes).map_err(|e| format!("Corrupt row {key}: {e:?}"))?;
    let mut row = Row::new(key);
    for column in stored.columns {
        let family = String::from_utf8(column.family)?;
        let name = String::from_utf8(column.column)?;
        for cell in column.cells {
            row.insert_cell(
                &family,
                &name,
                Cell {
                    timestamp: cell.timestamp,
                    value: cell.value,
                },
            );
        }
    }
    Ok(row)
}

/// Decode a stored row and drop collected versions. `None` if nothing is left.
fn visible_row(key: &str, bytes: &[u8], schema: &TableSchema, now: u64) -> Option<RowResult> {
    match decode_row(key, bytes) {
        Ok(mut row) => {
            row.collect_garbage(schema, now);
            (!row.is_empty()).then_some(Ok(row))
        }
        Err(err) => Some(Err(err)),
    }
}

/// RocksDB storage backend.
#[derive(Clone)]
pub struct RocksDBBackend {
    db: Arc<Db>,
    schemas: Arc<RwLock<Schemas>>,
    // Serializes read-modify-write commits and schema changes
    writer: Arc<Mutex<()>>,
}

impl RocksDBBackend {
    /// Open a RocksDB database at the given path, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);

        // A fresh directory has no column families to list yet
        let cf_names = Db::list_cf(&opts, path)
            .unwrap_or_else(|_| vec![DEFAULT_COLUMN_FAMILY_NAME.to_string()]);
        let db = Db::open_cf(&opts, path, &cf_names)?;

        let mut schemas = Schemas::new();
        for table in ALL_TABLES {
            let Some(json) = db.get(schema_key(table))? else {
                continue;
            };
            if db.cf_handle(table.name()).is_none() {
                return Err(format!("Schema found for {} but its data is missing", table.name()).into());
            }
            schemas.insert(table, serde_json::from_slice(&json)?);
        }

        Ok(Self {
            db: Arc::new(db),
            schemas: Arc::new(RwLock::new(schemas)),
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn persist_schema(&self, table: Table, schema: &TableSchema) -> Result<(), Error> {
        self.db.put(schema_key(table), serde_json::to_vec(schema)?)?;
        Ok(())
    }

    /// Apply `change` to the schema of an existing table and persist it.
    fn update_schema(
        &self,
        table: Table,
        change: impl FnOnce(&mut TableSchema) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let _writer = self.writer.lock().map_err(|e| e.to_string())?;
        let mut schemas = self.schemas.write().map_err(|e| e.to_string())?;
        let schema = schemas.get_mut(&table).ok_or_else(|| table_not_found(table))?;
        let mut updated = schema.clone();
        change(&mut updated)?;
        self.persist_schema(table, &updated)?;
        *schema = updated;
        Ok(())
    }
}

impl StorageBackend for RocksDBBackend {
    fn begin_read(&self) -> Result<Box<dyn StorageReadView + '_>, Error> {
        let schemas = self.schemas.read().map_err(|e| e.to_string())?.clone();
        Ok(Box::new(RocksDBReadView {
            db: &self.db,
            schemas,
        }))
    }

    fn begin_write(&self) -> Result<Box<dyn StorageWriteBatch + 'static>, Error> {
        Ok(Box::new(RocksDBWriteBatch {
            backend: self.clone(),
            pending: Vec::new(),
        }))
    }
}

/// Read-only view into RocksDB.
struct RocksDBReadView<'a> {
    db: &'a Db,
    schemas: Schemas,
}

impl RocksDBReadView<'_> {
    fn schema(&self, table: Table) -> Result<&TableSchema, Error> {
        self.schemas.get(&table).ok_or_else(|| table_not_found(table))
    }
}

impl StorageReadView for RocksDBReadView<'_> {
    fn read_row(&self, table: Table, key: &str) -> Result<Option<Row>, Error> {
        let schema = self.schema(table)?;
        let cf = self
            .db
            .cf_handle(table.name())
            .ok_or_else(|| table_not_found(table))?;
        let Some(bytes) = self.db.get_cf(&cf, key)? else {
            return Ok(None);
        };
        visible_row(key, &bytes, schema, now_micros()).transpose()
    }

    fn scan(
        &self,
        table: Table,
        range: &RowRange,
        limit: usize,
    ) -> Result<Box<dyn Iterator<Item = RowResult> + '_>, Error> {
        let schema = self.schema(table)?;
        let cf = self
            .db
            .cf_handle(table.name())
            .ok_or_else(|| table_not_found(table))?;
        let now = now_micros();
        let end = range.end().map(|end| end.as_bytes().to_vec());

        let iter = self
            .db
            .iterator_cf(
                &cf,
                IteratorMode::From(range.start().as_bytes(), Direction::Forward),
            )
            .take_while(move |entry| match (entry, &end) {
                (Ok((key, _)), Some(end)) => key.as_ref() < end.as_slice(),
                _ => true, // propagate errors
            })
            .filter_map(move |entry| match entry {
                Ok((key, value)) => match std::str::from_utf8(&key) {
                    Ok(key) => visible_row(key, &value, schema, now),
                    Err(err) => Some(Err(err.into())),
                },
                Err(err) => Some(Err(err.into())),
            })
            .take(limit);

        Ok(Box::new(iter))
    }
}

/// Write batch for RocksDB.
struct RocksDBWriteBatch {
    backend: RocksDBBackend,
    pending: Vec<(Table, String, Mutation)>,
}

impl StorageWriteBatch for RocksDBWriteBatch {
    fn apply(&mut self, table: Table, key: &str, mutation: Mutation) -> Result<(), Error> {
        self.pending.push((table, key.to_string(), mutation));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), Error> {
        let RocksDBWriteBatch { backend, pending } = *self;
        let db = &backend.db;
        let _writer = backend.writer.lock().map_err(|e| e.to_string())?;
        let schemas = backend.schemas.read().map_err(|e| e.to_string())?;

        for (table, key, mutation) in &pending {
            let schema = schemas.get(table).ok_or_else(|| table_not_found(*table))?;
            if let Some(family) = mutation.families().find(|f| !schema.has_family(f)) {
                return Err(format!(
                    "Column family {family} not found in table {} (row {key})",
                    table.name()
                )
                .into());
            }
        }

        // Rows touched more than once in this batch must see earlier mutations
        let now = now_micros();
        let mut touched: HashMap<(Table, String), Row> = HashMap::new();
        for (table, key, mutation) in pending {
            let row = match touched.entry((table, key)) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let (table, key) = entry.key();
                    let cf = db
                        .cf_handle(table.name())
                        .ok_or_else(|| table_not_found(*table))?;
                    let row = match db.get_cf(&cf, key)? {
                        Some(bytes) => decode_row(key, &bytes)?,
                        None => Row::new(key.clone()),
                    };
                    entry.insert(row)
                }
            };
            row.apply(&mutation);
        }

        let mut batch = WriteBatch::default();
        for ((table, key), mut row) in touched {
            let cf = db
                .cf_handle(table.name())
                .ok_or_else(|| table_not_found(table))?;
            if let Some(schema) = schemas.get(&table) {
                row.collect_garbage(schema, now);
            }
            if row.is_empty() {
                batch.delete_cf(&cf, key);
            } else {
                batch.put_cf(&cf, key, encode_row(&row));
            }
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(false);
        db.write_opt(batch, &write_opts)?;
        Ok(())
    }
}

impl AdminBackend for RocksDBBackend {
    fn tables(&self) -> Result<Vec<String>, Error> {
        let schemas = self.schemas.read().map_err(|e| e.to_string())?;
        let mut names: Vec<String> = schemas.keys().map(|t| t.name().to_string()).collect();
        names.sort();
        Ok(names)
    }

    fn table_info(&self, table: Table) -> Result<TableInfo, Error> {
        let schemas = self.schemas.read().map_err(|e| e.to_string())?;
        let schema = schemas.get(&table).ok_or_else(|| table_not_found(table))?;
        Ok(schema.info())
    }

    fn create_table(&self, table: Table) -> Result<(), Error> {
        let _writer = self.writer.lock().map_err(|e| e.to_string())?;
        let mut schemas = self.schemas.write().map_err(|e| e.to_string())?;
        if schemas.contains_key(&table) {
            return Err(format!("Table {} already exists", table.name()).into());
        }
        self.db.create_cf(table.name(), &Options::default())?;
        let schema = TableSchema::default();
        self.persist_schema(table, &schema)?;
        schemas.insert(table, schema);
        Ok(())
    }

    fn create_column_family(&self, table: Table, family: &str) -> Result<(), Error> {
        self.update_schema(table, |schema| {
            if !schema.add_family(family) {
                return Err(format!("Column family {family} already exists in {}", table.name()).into());
            }
            Ok(())
        })
    }

    fn set_gc_policy(&self, table: Table, family: &str, policy: &GcPolicy) -> Result<(), Error> {
        self.update_schema(table, |schema| {
            if !schema.set_policy(family, policy.clone()) {
                return Err(format!("Column family {family} not found in {}", table.name()).into());
            }
            Ok(())
        })
    }

    fn delete_table(&self, table: Table) -> Result<(), Error> {
        let _writer = self.writer.lock().map_err(|e| e.to_string())?;
        let mut schemas = self.schemas.write().map_err(|e| e.to_string())?;
        if schemas.remove(&table).is_none() {
            return Err(table_not_found(table));
        }
        self.db.delete(schema_key(table))?;
        self.db.drop_cf(table.name())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DATA_COLUMN, DEFAULT_FAMILY};
    use crate::backend::tests::run_backend_tests;
    use tempfile::tempdir;

    #[test]
    fn test_rocksdb_backend() {
        let dir = tempdir().unwrap();
        let backend = RocksDBBackend::open(dir.path()).unwrap();
        run_backend_tests(&backend);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();

        // Write data
        {
            let backend = RocksDBBackend::open(dir.path()).unwrap();
            backend.create_table(Table::Epochs).unwrap();
            backend
                .create_column_family(Table::Epochs, DEFAULT_FAMILY)
                .unwrap();
            backend
                .set_gc_policy(Table::Epochs, DEFAULT_FAMILY, &GcPolicy::MaxVersions(1))
                .unwrap();
            let mut batch = backend.begin_write().unwrap();
            batch
                .apply(
                    Table::Epochs,
                    "42",
                    Mutation::new().set(DEFAULT_FAMILY, DATA_COLUMN, 0, b"value1".to_vec()),
                )
                .unwrap();
            batch.commit().unwrap();
        }

        // Reopen and read
        {
            let backend = RocksDBBackend::open(dir.path()).unwrap();
            let info = backend.table_info(Table::Epochs).unwrap();
            assert_eq!(info.policies[DEFAULT_FAMILY], GcPolicy::MaxVersions(1));

            let view = backend.begin_read().unwrap();
            let row = view.read_row(Table::Epochs, "42").unwrap().unwrap();
            assert_eq!(row.latest(DEFAULT_FAMILY, DATA_COLUMN).unwrap().value, b"value1");
        }
    }

    #[test]
    fn test_same_row_twice_in_one_batch() {
        let dir = tempdir().unwrap();
        let backend = RocksDBBackend::open(dir.path()).unwrap();
        backend.create_table(Table::Cache).unwrap();
        backend.create_column_family(Table::Cache, "a").unwrap();
        backend.create_column_family(Table::Cache, "b").unwrap();

        let mut batch = backend.begin_write().unwrap();
        batch
            .apply(Table::Cache, "k", Mutation::new().set("a", DATA_COLUMN, 1, b"1".to_vec()))
            .unwrap();
        batch
            .apply(Table::Cache, "k", Mutation::new().set("b", DATA_COLUMN, 1, b"2".to_vec()))
            .unwrap();
        batch.commit().unwrap();

        let view = backend.begin_read().unwrap();
        let row = view.read_row(Table::Cache, "k").unwrap().unwrap();
        assert_eq!(row.latest("a", DATA_COLUMN).unwrap().value, b"1");
        assert_eq!(row.latest("b", DATA_COLUMN).unwrap().value, b"2");
    }
}

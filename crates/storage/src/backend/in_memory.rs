use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use crate::api::{
    AdminBackend, Error, GcPolicy, Mutation, Row, RowRange, RowResult, StorageBackend,
    StorageReadView, StorageWriteBatch, Table, TableInfo, TableSchema, now_micros,
};

#[derive(Default)]
struct TableData {
    schema: TableSchema,
    rows: BTreeMap<String, Row>,
}

type StorageData = HashMap<Table, TableData>;
type PendingMutations = Vec<(Table, String, Mutation)>;

/// In-memory wide-column backend using ordered maps.
///
/// Tables and families must be created through [`AdminBackend`] before rows
/// can be written, just like on a real store.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<StorageData>>,
}

impl InMemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

fn table_not_found(table: Table) -> Error {
    format!("Table {} not found", table.name()).into()
}

impl StorageBackend for InMemoryBackend {
    fn begin_read(&self) -> Result<Box<dyn StorageReadView + '_>, Error> {
        let guard = self.data.read().map_err(|e| e.to_string())?;
        Ok(Box::new(InMemoryReadView { guard }))
    }

    fn begin_write(&self) -> Result<Box<dyn StorageWriteBatch + 'static>, Error> {
        Ok(Box::new(InMemoryWriteBatch {
            data: Arc::clone(&self.data),
            pending: Vec::new(),
        }))
    }
}

/// Read view holding a read lock on the storage data.
struct InMemoryReadView<'a> {
    guard: std::sync::RwLockReadGuard<'a, StorageData>,
}

impl InMemoryReadView<'_> {
    fn table(&self, table: Table) -> Result<&TableData, Error> {
        self.guard.get(&table).ok_or_else(|| table_not_found(table))
    }
}

/// Copy a stored row with expired versions removed, or `None` if nothing is left.
fn visible(row: &Row, schema: &TableSchema, now: u64) -> Option<Row> {
    let mut row = row.clone();
    row.collect_garbage(schema, now);
    (!row.is_empty()).then_some(row)
}

impl StorageReadView for InMemoryReadView<'_> {
    fn read_row(&self, table: Table, key: &str) -> Result<Option<Row>, Error> {
        let data = self.table(table)?;
        Ok(data
            .rows
            .get(key)
            .and_then(|row| visible(row, &data.schema, now_micros())))
    }

    fn scan(
        &self,
        table: Table,
        range: &RowRange,
        limit: usize,
    ) -> Result<Box<dyn Iterator<Item = RowResult> + '_>, Error> {
        let data = self.table(table)?;
        let now = now_micros();
        let upper = match range.end() {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let rows = data
            .rows
            .range::<str, _>((Bound::Included(range.start()), upper))
            .filter_map(move |(_, row)| visible(row, &data.schema, now))
            .take(limit)
            .map(Ok);
        Ok(Box::new(rows))
    }
}

/// Write batch that accumulates mutations before committing.
struct InMemoryWriteBatch {
    data: Arc<RwLock<StorageData>>,
    pending: PendingMutations,
}

impl StorageWriteBatch for InMemoryWriteBatch {
    fn apply(&mut self, table: Table, key: &str, mutation: Mutation) -> Result<(), Error> {
        self.pending.push((table, key.to_string(), mutation));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), Error> {
        let InMemoryWriteBatch { data, pending } = *self;
        let mut guard = data.write().map_err(|e| e.to_string())?;

        // Validate everything first so a bad mutation leaves the store untouched
        for (table, key, mutation) in &pending {
            let data = guard.get(table).ok_or_else(|| table_not_found(*table))?;
            if let Some(family) = mutation.families().find(|f| !data.schema.has_family(f)) {
                return Err(format!(
                    "Column family {family} not found in table {} (row {key})",
                    table.name()
                )
                .into());
            }
        }

        let now = now_micros();
        for (table, key, mutation) in pending {
            let data = guard.get_mut(&table).ok_or_else(|| table_not_found(table))?;
            let row = data.rows.entry(key.clone()).or_insert_with(|| Row::new(key.clone()));
            row.apply(&mutation);
            row.collect_garbage(&data.schema, now);
            if row.is_empty() {
                data.rows.remove(&key);
            }
        }

        Ok(())
    }
}

impl AdminBackend for InMemoryBackend {
    fn tables(&self) -> Result<Vec<String>, Error> {
        let guard = self.data.read().map_err(|e| e.to_string())?;
        let mut names: Vec<String> = guard.keys().map(|t| t.name().to_string()).collect();
        names.sort();
        Ok(names)
    }

    fn table_info(&self, table: Table) -> Result<TableInfo, Error> {
        let guard = self.data.read().map_err(|e| e.to_string())?;
        let data = guard.get(&table).ok_or_else(|| table_not_found(table))?;
        Ok(data.schema.info())
    }

    fn create_table(&self, table: Table) -> Result<(), Error> {
        let mut guard = self.data.write().map_err(|e| e.to_string())?;
        if guard.contains_key(&table) {
            return Err(format!("Table {} already exists", table.name()).into());
        }
        guard.insert(table, TableData::default());
        Ok(())
    }

    fn create_column_family(&self, table: Table, family: &str) -> Result<(), Error> {
        let mut guard = self.data.write().map_err(|e| e.to_string())?;
        let data = guard.get_mut(&table).ok_or_else(|| table_not_found(table))?;
        if !data.schema.add_family(family) {
            return Err(format!("Column family {family} already exists in {}", table.name()).into());
        }
        Ok(())
    }

    fn set_gc_policy(&self, table: Table, family: &str, policy: &GcPolicy) -> Result<(), Error> {
        let mut guard = self.data.write().map_err(|e| e.to_string())?;
        let data = guard.get_mut(&table).ok_or_else(|| table_not_found(table))?;
        if !data.schema.set_policy(family, policy.clone()) {
            return Err(format!("Column family {family} not found in {}", table.name()).into());
        }
        Ok(())
    }

    fn delete_table(&self, table: Table) -> Result<(), Error> {
        let mut guard = self.data.write().map_err(|e| e.to_string())?;
        guard.remove(&table).ok_or_else(|| table_not_found(table))?;
        Ok(())
    }
}

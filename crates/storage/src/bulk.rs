use std::sync::Arc;

use tracing::{error, info};

use crate::api::{Mutation, StorageBackend, Table};
use crate::error::StoreError;
use crate::metrics;

/// Upper bound on rows committed per batch.
pub const DEFAULT_BATCH_SIZE: usize = 90_000;

/// Outcome of a completed bulk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkWriteSummary {
    pub rows: usize,
    pub batches: usize,
}

/// Writes a long sequence of row mutations to one table in bounded batches.
///
/// Batches are committed one after another. The first failing commit stops
/// the write and is reported as [`StoreError::BatchFailed`] with its 0-based
/// index; rows of earlier batches stay written.
pub struct BulkWriter {
    backend: Arc<dyn StorageBackend>,
    table: Table,
    batch_size: usize,
}

impl BulkWriter {
    pub fn new(backend: Arc<dyn StorageBackend>, table: Table) -> Self {
        Self {
            backend,
            table,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn write<I>(&self, rows: I) -> Result<BulkWriteSummary, StoreError>
    where
        I: IntoIterator<Item = (String, Mutation)>,
    {
        let mut summary = BulkWriteSummary::default();
        let mut buffer = Vec::new();

        for row in rows {
            buffer.push(row);
            if buffer.len() == self.batch_size {
                summary.rows += self.flush(summary.batches, std::mem::take(&mut buffer))?;
                summary.batches += 1;
            }
        }
        if !buffer.is_empty() {
            summary.rows += self.flush(summary.batches, buffer)?;
            summary.batches += 1;
        }

        Ok(summary)
    }

    fn flush(&self, index: usize, rows: Vec<(String, Mutation)>) -> Result<usize, StoreError> {
        let timing = metrics::time_bulk_flush();
        let count = rows.len();

        let result = self.backend.begin_write().and_then(|mut batch| {
            for (key, mutation) in rows {
                batch.apply(self.table, &key, mutation)?;
            }
            batch.commit()
        });
        if let Err(err) = result {
            error!(table = %self.table, batch = index, rows = count, %err, "Bulk write batch failed");
            return Err(StoreError::BatchFailed {
                batch: index,
                source: Box::new(StoreError::Transport(err)),
            });
        }

        metrics::inc_bulk_rows_written(self.table.name(), count as u64);
        info!(
            table = %self.table,
            batch = index,
            rows = count,
            elapsed_ms = (timing.elapsed_secs() * 1000.0) as u64,
            "Flushed bulk write batch"
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::api::{DATA_COLUMN, DEFAULT_FAMILY, Error, StorageReadView, StorageWriteBatch};

    /// Backend that records the size of every commit and fails the nth one.
    #[derive(Default)]
    struct RecordingBackend {
        commits: Arc<Mutex<Vec<usize>>>,
        fail_on: Option<usize>,
    }

    struct RecordingBatch {
        commits: Arc<Mutex<Vec<usize>>>,
        fail_on: Option<usize>,
        rows: usize,
    }

    impl StorageBackend for RecordingBackend {
        fn begin_read(&self) -> Result<Box<dyn StorageReadView + '_>, Error> {
            Err("reads not supported".into())
        }

        fn begin_write(&self) -> Result<Box<dyn StorageWriteBatch + 'static>, Error> {
            Ok(Box::new(RecordingBatch {
                commits: Arc::clone(&self.commits),
                fail_on: self.fail_on,
                rows: 0,
            }))
        }
    }

    impl StorageWriteBatch for RecordingBatch {
        fn apply(&mut self, _table: Table, _key: &str, _mutation: Mutation) -> Result<(), Error> {
            self.rows += 1;
            Ok(())
        }

        fn commit(self: Box<Self>) -> Result<(), Error> {
            let mut commits = self.commits.lock().unwrap();
            if self.fail_on == Some(commits.len()) {
                return Err("store unavailable".into());
            }
            commits.push(self.rows);
            Ok(())
        }
    }

    fn rows(count: usize) -> impl Iterator<Item = (String, Mutation)> {
        (0..count).map(|i| {
            (
                format!("{i}#1"),
                Mutation::new().set(DEFAULT_FAMILY, DATA_COLUMN, 0, vec![]),
            )
        })
    }

    #[test]
    fn test_flushes_full_batches_then_remainder() {
        let backend = Arc::new(RecordingBackend::default());
        let writer = BulkWriter::new(backend.clone(), Table::ValidatorBalanceHistory);

        let summary = writer.write(rows(180_001)).unwrap();

        assert_eq!(*backend.commits.lock().unwrap(), vec![90_000, 90_000, 1]);
        assert_eq!(summary, BulkWriteSummary { rows: 180_001, batches: 3 });
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_flush() {
        let backend = Arc::new(RecordingBackend::default());
        let writer = BulkWriter::new(backend.clone(), Table::Validators).with_batch_size(10);

        writer.write(rows(20)).unwrap();
        assert_eq!(*backend.commits.lock().unwrap(), vec![10, 10]);

        let summary = writer.write(rows(0)).unwrap();
        assert_eq!(summary, BulkWriteSummary::default());
        assert_eq!(backend.commits.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failure_aborts_and_reports_batch_index() {
        let backend = Arc::new(RecordingBackend {
            fail_on: Some(1),
            ..Default::default()
        });
        let writer = BulkWriter::new(backend.clone(), Table::Validators).with_batch_size(10);

        let err = writer.write(rows(35)).unwrap_err();

        assert!(matches!(err, StoreError::BatchFailed { batch: 1, .. }));
        // Batches after the failing one are never attempted
        assert_eq!(*backend.commits.lock().unwrap(), vec![10]);
    }

    #[test]
    fn test_writes_rows_to_backend() {
        use crate::admin::{SchemaAdmin, core_tables};
        use crate::backend::InMemoryBackend;

        let backend = InMemoryBackend::new();
        SchemaAdmin::new(Arc::new(backend.clone()))
            .create_tables(&core_tables())
            .unwrap();
        let writer =
            BulkWriter::new(Arc::new(backend.clone()), Table::Validators).with_batch_size(2);

        writer.write(rows(5)).unwrap();

        let view = backend.begin_read().unwrap();
        let keys: Vec<String> = view
            .scan(Table::Validators, &crate::api::RowRange::prefix(""), 10)
            .unwrap()
            .map(|row| row.unwrap().key().to_string())
            .collect();
        assert_eq!(keys, vec!["0#1", "1#1", "2#1", "3#1", "4#1"]);
    }
}

use std::path::{Path, PathBuf};

use ethindex_epoch_state::{EpochExporter, EpochStateEngine, EpochStateError};
use ethindex_types::epoch::EpochData;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{path} holds epoch {found}, expected {expected}")]
    WrongEpoch {
        path: PathBuf,
        found: u64,
        expected: u64,
    },
    #[error(transparent)]
    EpochState(#[from] EpochStateError),
}

/// Directory of per-epoch JSON files named `<epoch>.json`.
pub struct EpochFeed {
    dir: PathBuf,
}

impl EpochFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, epoch: u64) -> PathBuf {
        self.dir.join(format!("{epoch}.json"))
    }

    /// The data for `epoch`, or `None` if its file isn't there yet.
    pub fn read(&self, epoch: u64) -> Result<Option<EpochData>, FeedError> {
        let path = self.path(epoch);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(FeedError::Io { path, source }),
        };
        let data: EpochData =
            serde_json::from_str(&json).map_err(|source| FeedError::Parse {
                path: path.clone(),
                source,
            })?;
        if data.epoch != epoch {
            return Err(FeedError::WrongEpoch {
                path,
                found: data.epoch,
                expected: epoch,
            });
        }
        Ok(Some(data))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Advance through every consecutive epoch available in the feed, exporting
/// each finalized one. Returns how many epochs were applied.
///
/// An epoch is exported before the engine advances past it, so a failed
/// export leaves the engine on the previous epoch and a rerun picks the same
/// epoch up again. Exports overwrite their rows, so repeating one is harmless.
pub async fn process_available(
    feed: &EpochFeed,
    engine: &EpochStateEngine,
    exporter: &EpochExporter,
) -> Result<u64, FeedError> {
    let mut applied = 0;
    loop {
        let epoch = engine.current_epoch() + 1;
        let Some(data) = feed.read(epoch)? else {
            info!(%epoch, dir = %feed.dir().display(), "No more epoch data available");
            return Ok(applied);
        };

        if data.participation.finalized {
            exporter.export(&data)?;
        } else {
            warn!(%epoch, "Epoch not finalized, skipping statistics export");
        }

        engine.advance(data).await?;
        applied += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use ethindex_epoch_state::DEFAULT_SLOTS_PER_EPOCH;
    use ethindex_storage::{SchemaAdmin, StorageBackend, Table, backend::InMemoryBackend};
    use ethindex_types::{FAR_FUTURE_EPOCH, epoch::EpochParticipation, validator::ValidatorSnapshot};

    fn write_epoch(dir: &Path, epoch: u64, finalized: bool) {
        let data = EpochData {
            epoch,
            validators: vec![ValidatorSnapshot {
                index: 0,
                balance: 32_000_000_000,
                exit_epoch: FAR_FUTURE_EPOCH,
                withdrawable_epoch: FAR_FUTURE_EPOCH,
                ..Default::default()
            }],
            participation: EpochParticipation {
                finalized,
                ..Default::default()
            },
            ..Default::default()
        };
        std::fs::write(
            dir.join(format!("{epoch}.json")),
            serde_json::to_string(&data).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EpochFeed::new(dir.path()).read(1).unwrap().is_none());
    }

    #[test]
    fn test_mismatched_epoch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_epoch(dir.path(), 3, true);
        std::fs::rename(dir.path().join("3.json"), dir.path().join("4.json")).unwrap();

        let err = EpochFeed::new(dir.path()).read(4).unwrap_err();
        assert!(matches!(err, FeedError::WrongEpoch { found: 3, expected: 4, .. }));
    }

    #[tokio::test]
    async fn test_process_available_stops_at_gap() {
        let dir = tempfile::tempdir().unwrap();
        write_epoch(dir.path(), 1, true);
        write_epoch(dir.path(), 2, false);
        write_epoch(dir.path(), 4, true);

        let backend = InMemoryBackend::new();
        SchemaAdmin::new(Arc::new(backend.clone()))
            .setup_core()
            .unwrap();
        let engine =
            EpochStateEngine::spawn(Arc::new(backend.clone()), DEFAULT_SLOTS_PER_EPOCH).unwrap();
        let exporter = EpochExporter::new(Arc::new(backend.clone()));

        let applied = process_available(&EpochFeed::new(dir.path()), &engine, &exporter)
            .await
            .unwrap();

        assert_eq!(applied, 2);
        assert_eq!(engine.current_epoch(), 2);
        let view = backend.begin_read().unwrap();
        assert!(view.read_row(Table::Epochs, "1").unwrap().is_some());
        assert!(view.read_row(Table::Epochs, "2").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_export_is_retried_on_rerun() {
        let dir = tempfile::tempdir().unwrap();
        write_epoch(dir.path(), 1, true);
        let feed = EpochFeed::new(dir.path());

        let state_backend = InMemoryBackend::new();
        SchemaAdmin::new(Arc::new(state_backend.clone()))
            .setup_core()
            .unwrap();
        let engine =
            EpochStateEngine::spawn(Arc::new(state_backend), DEFAULT_SLOTS_PER_EPOCH).unwrap();

        // Statistics tables don't exist yet, so the export fails
        let stats_backend = InMemoryBackend::new();
        let exporter = EpochExporter::new(Arc::new(stats_backend.clone()));
        let err = process_available(&feed, &engine, &exporter).await.unwrap_err();
        assert!(matches!(err, FeedError::EpochState(_)));
        assert_eq!(engine.current_epoch(), 0);

        SchemaAdmin::new(Arc::new(stats_backend.clone()))
            .setup_core()
            .unwrap();
        let applied = process_available(&feed, &engine, &exporter).await.unwrap();

        assert_eq!(applied, 1);
        assert_eq!(engine.current_epoch(), 1);
        let view = stats_backend.begin_read().unwrap();
        assert!(view.read_row(Table::Epochs, "1").unwrap().is_some());
    }
}

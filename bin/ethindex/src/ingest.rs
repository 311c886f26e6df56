use std::time::{Duration, Instant};

use ethindex_storage::BlockStore;
use tracing::{error, info};

use crate::block_source::{BlockSource, SourceError};

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The head block was fetched and written.
    Saved(u64),
    /// The head block was fetched but writing it failed.
    PersistFailed(u64),
    /// The head has not moved since the last poll.
    Unchanged(u64),
}

/// Follows the chain head and writes each new head block.
///
/// Failing to fetch from the node ends the loop. Failing to write a block is
/// logged and the loop moves on; the same head is fetched and written again on
/// the next poll.
pub struct Ingester<S> {
    source: S,
    store: BlockStore,
    last_seen: Option<u64>,
}

impl<S: BlockSource> Ingester<S> {
    pub fn new(source: S, store: BlockStore) -> Self {
        Self {
            source,
            store,
            last_seen: None,
        }
    }

    pub async fn poll_once(&mut self) -> Result<PollOutcome, SourceError> {
        let head = self.source.latest_block_number().await?;
        if self.last_seen == Some(head) {
            return Ok(PollOutcome::Unchanged(head));
        }

        let start = Instant::now();
        let block = self.source.block(head).await?;
        let fetched_in = start.elapsed();

        let db_start = Instant::now();
        if let Err(err) = self.store.save_block(&block) {
            error!(number = head, %err, "Failed to save block");
            return Ok(PollOutcome::PersistFailed(head));
        }
        self.last_seen = Some(head);
        info!(
            number = head,
            hash = %block.short_hash(),
            fetch_ms = fetched_in.as_millis() as u64,
            db_ms = db_start.elapsed().as_millis() as u64,
            "Retrieved and saved block"
        );
        Ok(PollOutcome::Saved(head))
    }

    /// Poll until fetching from the node fails, sleeping while the head is unchanged.
    pub async fn run(mut self, poll_interval: Duration) -> SourceError {
        loop {
            match self.poll_once().await {
                Ok(PollOutcome::Unchanged(_)) => tokio::time::sleep(poll_interval).await,
                Ok(_) => {}
                Err(err) => return err,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use ethindex_storage::{SchemaAdmin, backend::InMemoryBackend};
    use ethindex_types::block::BlockRecord;

    /// Reports a scripted sequence of heads, then fails.
    struct ScriptedSource {
        heads: Mutex<VecDeque<u64>>,
    }

    impl ScriptedSource {
        fn new(heads: impl IntoIterator<Item = u64>) -> Self {
            Self {
                heads: Mutex::new(heads.into_iter().collect()),
            }
        }
    }

    impl BlockSource for ScriptedSource {
        async fn latest_block_number(&self) -> Result<u64, SourceError> {
            self.heads
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| SourceError::Malformed("node went away".into()))
        }

        async fn block(&self, number: u64) -> Result<BlockRecord, SourceError> {
            if number == 13 {
                return Err(SourceError::MissingBlock(number));
            }
            Ok(BlockRecord {
                number,
                hash: vec![number as u8; 32],
                ..Default::default()
            })
        }
    }

    fn store() -> BlockStore {
        let backend = InMemoryBackend::new();
        SchemaAdmin::new(Arc::new(backend.clone()))
            .setup_core()
            .unwrap();
        BlockStore::new(Arc::new(backend), "1")
    }

    #[tokio::test]
    async fn test_poll_saves_new_heads_only() {
        let store = store();
        let mut ingester = Ingester::new(ScriptedSource::new([10, 10, 11]), store.clone());

        assert_eq!(ingester.poll_once().await.unwrap(), PollOutcome::Saved(10));
        assert_eq!(ingester.poll_once().await.unwrap(), PollOutcome::Unchanged(10));
        assert_eq!(ingester.poll_once().await.unwrap(), PollOutcome::Saved(11));
        assert_eq!(store.get_last_block().unwrap().number, 11);
    }

    #[tokio::test]
    async fn test_persist_failure_continues() {
        // Block 0 can't be keyed, so saving it fails
        let mut ingester = Ingester::new(ScriptedSource::new([0, 1]), store());

        assert_eq!(ingester.poll_once().await.unwrap(), PollOutcome::PersistFailed(0));
        assert_eq!(ingester.poll_once().await.unwrap(), PollOutcome::Saved(1));
    }

    #[tokio::test]
    async fn test_failed_head_is_saved_once_store_recovers() {
        // No tables yet, so the first save fails
        let backend = InMemoryBackend::new();
        let store = BlockStore::new(Arc::new(backend.clone()), "1");
        let mut ingester = Ingester::new(ScriptedSource::new([5, 5, 5]), store.clone());

        assert_eq!(ingester.poll_once().await.unwrap(), PollOutcome::PersistFailed(5));

        SchemaAdmin::new(Arc::new(backend)).setup_core().unwrap();
        assert_eq!(ingester.poll_once().await.unwrap(), PollOutcome::Saved(5));
        assert_eq!(ingester.poll_once().await.unwrap(), PollOutcome::Unchanged(5));
        assert_eq!(store.get_block(5).unwrap().number, 5);
    }

    #[tokio::test]
    async fn test_fetch_failure_ends_run() {
        let ingester = Ingester::new(ScriptedSource::new([12, 13]), store());
        let err = ingester.run(Duration::from_millis(1)).await;
        assert!(matches!(err, SourceError::MissingBlock(13)));

        let ingester = Ingester::new(ScriptedSource::new(Vec::new()), store());
        let err = ingester.run(Duration::from_millis(1)).await;
        assert!(matches!(err, SourceError::Malformed(_)));
    }
}

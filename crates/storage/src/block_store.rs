use std::sync::Arc;

use ethindex_types::{block::BlockRecord, primitives::Message};
use tracing::{debug, warn};

use crate::api::{DATA_COLUMN, DEFAULT_FAMILY, Mutation, Row, RowRange, StorageBackend, Table};
use crate::error::StoreError;
use crate::keys::{BlockKeys, MAX_BLOCK};
use crate::metrics;

/// Every block is written at this timestamp so a save always overwrites the
/// single retained version.
const BLOCK_CELL_TIMESTAMP: u64 = 0;

/// Durable block persistence for one chain, ordered newest first.
///
/// Safe to share between threads; every operation touches the backend
/// directly and relies on its per-row atomicity.
#[derive(Clone)]
pub struct BlockStore {
    backend: Arc<dyn StorageBackend>,
    keys: BlockKeys,
}

impl BlockStore {
    pub fn new(backend: Arc<dyn StorageBackend>, chain_id: impl Into<String>) -> Self {
        Self {
            backend,
            keys: BlockKeys::new(chain_id, MAX_BLOCK),
        }
    }

    /// Override the highest encodable block number.
    pub fn with_max_block(mut self, max_block: u64) -> Self {
        self.keys = BlockKeys::new(self.keys.chain_id().to_string(), max_block);
        self
    }

    pub fn chain_id(&self) -> &str {
        self.keys.chain_id()
    }

    /// Write a block, replacing any block previously stored under its number.
    pub fn save_block(&self, block: &BlockRecord) -> Result<(), StoreError> {
        let _timing = metrics::time_block_save();
        let key = self.keys.encode(block.number)?;
        let mutation = Mutation::new().set(
            DEFAULT_FAMILY,
            DATA_COLUMN,
            BLOCK_CELL_TIMESTAMP,
            block.encode_to_vec(),
        );

        let mut batch = self.backend.begin_write()?;
        batch.apply(Table::Blocks, &key, mutation)?;
        batch.commit()?;

        metrics::inc_blocks_saved();
        debug!(number = block.number, hash = %block.short_hash(), %key, "Saved block");
        Ok(())
    }

    pub fn get_block(&self, number: u64) -> Result<BlockRecord, StoreError> {
        let key = self.keys.encode(number)?;
        let view = self.backend.begin_read()?;
        let row = view
            .read_row(Table::Blocks, &key)?
            .ok_or_else(|| self.not_found(number))?;
        decode_block(&row)?.ok_or_else(|| self.not_found(number))
    }

    /// Up to `count` blocks, newest first, starting at `from`.
    ///
    /// `None` starts at the newest stored block. Numbers above the key
    /// ceiling start at the ceiling.
    pub fn get_blocks(&self, from: Option<u64>, count: usize) -> Result<Vec<BlockRecord>, StoreError> {
        let mut range = RowRange::prefix(&self.keys.prefix());
        match from {
            Some(0) => return Ok(Vec::new()),
            Some(number) => {
                range = range.starting_at(self.keys.encode(number.min(self.keys.max_block()))?);
            }
            None => {}
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let view = self.backend.begin_read()?;
        let mut blocks = Vec::with_capacity(count);
        for row in view.scan(Table::Blocks, &range, count)? {
            let row = row?;
            match decode_block(&row)? {
                Some(block) => blocks.push(block),
                None => warn!(key = row.key(), "Skipping block row without data"),
            }
        }
        Ok(blocks)
    }

    /// The newest stored block, or `NotFound` if the chain has none.
    pub fn get_last_block(&self) -> Result<BlockRecord, StoreError> {
        self.get_blocks(None, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("last block on chain {}", self.chain_id())))
    }

    fn not_found(&self, number: u64) -> StoreError {
        StoreError::NotFound(format!("block {number} on chain {}", self.chain_id()))
    }
}

fn decode_block(row: &Row) -> Result<Option<BlockRecord>, StoreError> {
    let Some(cell) = row.latest(DEFAULT_FAMILY, DATA_COLUMN) else {
        return Ok(None);
    };
    Ok(Some(BlockRecord::decode(cell.value.as_slice())?))
}

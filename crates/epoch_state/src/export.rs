use std::sync::Arc;

use ethindex_storage::{
    BulkWriteSummary, BulkWriter, DEFAULT_BATCH_SIZE, StorageBackend, StoreError, Table,
    api::{DATA_COLUMN, DEFAULT_FAMILY, Mutation},
    keys::{epoch_key, validator_epoch_key},
};
use ethindex_types::{
    epoch::{EpochData, EpochSummary, ValidatorBalanceRecord, ValidatorExportRecord},
    primitives::Message,
};
use tracing::info;

use crate::error::EpochStateError;

/// Compute the aggregate statistics of an epoch.
///
/// Validators count as active when `activation_epoch <= epoch < exit_epoch`.
/// The average balance is 0 when no validator is active.
pub fn summarize(data: &EpochData) -> EpochSummary {
    let mut summary = EpochSummary {
        epoch: data.epoch,
        blocks_count: data.blocks.len() as u64,
        finalized: data.participation.finalized,
        eligible_ether: data.participation.eligible_ether,
        global_participation_rate: data.participation.global_participation_rate,
        voted_ether: data.participation.voted_ether,
        ..Default::default()
    };

    for block in &data.blocks {
        summary.proposer_slashings_count += block.proposer_slashings;
        summary.attester_slashings_count += block.attester_slashings;
        summary.attestations_count += block.attestations.len() as u64;
        summary.deposits_count += block.deposits;
        summary.voluntary_exits_count += block.voluntary_exits;
    }

    let (count, sum) = data
        .validators
        .iter()
        .filter(|v| v.activation_epoch <= data.epoch && data.epoch < v.exit_epoch)
        .fold((0u64, 0u128), |(count, sum), v| (count + 1, sum + v.balance as u128));
    summary.validators_count = count;
    summary.validator_balance_sum = u64::try_from(sum).unwrap_or(u64::MAX);
    summary.validator_balance_average = sum
        .checked_div(count as u128)
        .map(|avg| avg as u64)
        .unwrap_or_default();
    summary
}

/// Rows written by one epoch export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochExport {
    pub balances: BulkWriteSummary,
    pub validators: BulkWriteSummary,
}

/// Writes finalized epochs to the statistics tables.
pub struct EpochExporter {
    backend: Arc<dyn StorageBackend>,
    batch_size: usize,
}

impl EpochExporter {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Export the epoch summary, balance history and validator snapshot.
    ///
    /// Non-finalized epochs are rejected before anything is written.
    pub fn export(&self, data: &EpochData) -> Result<EpochExport, EpochStateError> {
        let epoch = data.epoch;
        if !data.participation.finalized {
            return Err(EpochStateError::NonFinalizedEpoch(epoch));
        }

        let summary = summarize(data);
        info!(
            %epoch,
            validators = summary.validators_count,
            blocks = summary.blocks_count,
            "Exporting epoch statistics"
        );
        let mutation = Mutation::new().set(DEFAULT_FAMILY, DATA_COLUMN, 0, summary.encode_to_vec());
        let mut batch = self.backend.begin_write().map_err(StoreError::from)?;
        batch
            .apply(Table::Epochs, &epoch_key(epoch), mutation)
            .map_err(StoreError::from)?;
        batch.commit().map_err(StoreError::from)?;

        let balances = self.writer(Table::ValidatorBalanceHistory).write(
            data.validators.iter().map(|v| {
                (
                    validator_epoch_key(v.index, epoch),
                    row(ValidatorBalanceRecord::from(v).encode_to_vec()),
                )
            }),
        )?;
        let validators = self.writer(Table::Validators).write(data.validators.iter().map(|v| {
            (
                validator_epoch_key(v.index, epoch),
                row(ValidatorExportRecord::from(v).encode_to_vec()),
            )
        }))?;

        info!(%epoch, balance_rows = balances.rows, validator_rows = validators.rows, "Exported epoch");
        Ok(EpochExport {
            balances,
            validators,
        })
    }

    fn writer(&self, table: Table) -> BulkWriter {
        BulkWriter::new(Arc::clone(&self.backend), table).with_batch_size(self.batch_size)
    }
}

fn row(value: Vec<u8>) -> Mutation {
    Mutation::new().set(DEFAULT_FAMILY, DATA_COLUMN, 0, value)
}

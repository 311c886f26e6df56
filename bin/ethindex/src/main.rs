use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use ethindex_epoch_state::{
    DEFAULT_SLOTS_PER_EPOCH, EpochExporter, EpochStateEngine, EpochStateError,
};
use ethindex_storage::{BlockStore, SchemaAdmin, StoreError, backend::RocksDBBackend};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use crate::block_source::{RpcBlockSource, SourceError};
use crate::epoch_feed::{EpochFeed, FeedError};
use crate::ingest::Ingester;

mod block_source;
mod epoch_feed;
mod ingest;
mod metrics_api;

#[derive(Debug, Parser)]
#[command(version, about = "Indexes chain history and validator state into a wide-column store")]
struct CliOptions {
    /// Directory of the RocksDB database.
    #[arg(long, env = "ETHINDEX_DATA_DIR", default_value = "ethindex-data")]
    data_dir: PathBuf,
    /// Serve prometheus metrics on this address.
    #[arg(long, env = "ETHINDEX_METRICS_ADDRESS")]
    metrics_address: Option<SocketAddr>,
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, env = "ETHINDEX_LOG_LEVEL", default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the core and cache tables.
    SetupSchema {
        /// Also (re)apply the declared GC policies of the core tables.
        #[arg(long)]
        apply_gc_policies: bool,
    },
    /// Drop the cache table.
    TeardownCache,
    /// Follow the chain head and store every new head block.
    Ingest {
        #[arg(long, env = "ETHINDEX_CHAIN_ID")]
        chain_id: String,
        #[arg(long, env = "ETHINDEX_RPC_URL")]
        rpc_url: String,
        #[arg(long, env = "ETHINDEX_POLL_INTERVAL_MS", default_value_t = 1000)]
        poll_interval_ms: u64,
    },
    /// Apply and export every consecutive epoch file available.
    ProcessEpochs {
        #[arg(long, env = "ETHINDEX_EPOCHS_DIR")]
        epochs_dir: PathBuf,
        #[arg(long, env = "ETHINDEX_SLOTS_PER_EPOCH", default_value_t = DEFAULT_SLOTS_PER_EPOCH)]
        slots_per_epoch: u64,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to open database: {0}")]
    Database(ethindex_storage::api::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    EpochState(#[from] EpochStateError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Feed(#[from] FeedError),
}

#[tokio::main]
async fn main() {
    let options = CliOptions::parse();
    init_tracing(&options.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %options.data_dir.display(),
        "Starting ethindex"
    );

    if let Some(address) = options.metrics_address {
        tokio::spawn(async move {
            let _ = metrics_api::start_metrics_server(address)
                .await
                .inspect_err(|err| error!(%err, "Metrics server failed"));
        });
    }

    if let Err(err) = run(options).await {
        error!(%err, "Exiting");
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).init();
}

async fn run(options: CliOptions) -> Result<(), CliError> {
    let backend = Arc::new(RocksDBBackend::open(&options.data_dir).map_err(CliError::Database)?);
    let admin = SchemaAdmin::new(backend.clone());

    match options.command {
        Command::SetupSchema { apply_gc_policies } => {
            admin.setup_core()?;
            if apply_gc_policies {
                admin.apply_core_gc_policies()?;
            }
            admin.setup_cache()?;
            info!("Schema ready");
        }
        Command::TeardownCache => admin.teardown_cache()?,
        Command::Ingest {
            chain_id,
            rpc_url,
            poll_interval_ms,
        } => {
            admin.setup_core()?;
            admin.setup_cache()?;
            let store = BlockStore::new(backend, chain_id);
            let source = RpcBlockSource::new(rpc_url)?;
            info!(chain_id = store.chain_id(), "Following chain head");
            let err = Ingester::new(source, store)
                .run(Duration::from_millis(poll_interval_ms))
                .await;
            return Err(err.into());
        }
        Command::ProcessEpochs {
            epochs_dir,
            slots_per_epoch,
        } => {
            admin.setup_core()?;
            let engine = EpochStateEngine::spawn(backend.clone(), slots_per_epoch)?;
            let exporter = EpochExporter::new(backend);
            let feed = EpochFeed::new(epochs_dir);
            let applied = epoch_feed::process_available(&feed, &engine, &exporter).await?;
            info!(applied, epoch = engine.current_epoch(), "Processed epochs");
        }
    }
    Ok(())
}

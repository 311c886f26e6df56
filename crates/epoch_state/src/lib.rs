use std::sync::{Arc, RwLock};

use ethindex_storage::StorageBackend;
use ethindex_types::{epoch::EpochData, validator::ValidatorRecord};
use spawned_concurrency::tasks::{CallResponse, GenServer, GenServerHandle};
use tracing::{error, info, warn};

pub mod error;
pub mod export;
mod metrics;
pub mod snapshot;
pub mod status;
pub mod transition;

pub use error::EpochStateError;
pub use export::{EpochExport, EpochExporter};
pub use snapshot::ValidatorState;

/// Slots per epoch on mainnet.
pub const DEFAULT_SLOTS_PER_EPOCH: u64 = 32;

type Published = Arc<RwLock<Arc<ValidatorState>>>;

/// Single writer of the validator state.
///
/// Epoch advances are processed one at a time by an actor. Readers get the
/// last committed snapshot and never wait for an advance in progress.
#[derive(Clone)]
pub struct EpochStateEngine {
    handle: GenServerHandle<EpochStateServer>,
    published: Published,
}

impl EpochStateEngine {
    /// Load the stored snapshot (or start empty at epoch 0) and start the actor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        backend: Arc<dyn StorageBackend>,
        slots_per_epoch: u64,
    ) -> Result<EpochStateEngine, EpochStateError> {
        let state = match snapshot::load(backend.as_ref())? {
            Some(state) => {
                info!(epoch = state.epoch, validators = state.validators.len(), "Loaded validator state");
                state
            }
            None => {
                info!("No stored validator state, starting at epoch 0");
                ValidatorState::default()
            }
        };
        metrics::update_current_epoch(state.epoch);
        metrics::update_tracked_validators(state.validators.len());

        let state = Arc::new(state);
        let published = Arc::new(RwLock::new(Arc::clone(&state)));
        let handle = EpochStateServer {
            backend,
            slots_per_epoch,
            state,
            published: Arc::clone(&published),
        }
        .start();
        Ok(EpochStateEngine { handle, published })
    }

    /// Apply the next epoch. Returns the new current epoch.
    ///
    /// On any error the stored and published state stay at the previous epoch.
    pub async fn advance(&self, data: EpochData) -> Result<u64, EpochStateError> {
        let mut handle = self.handle.clone();
        handle
            .call(CallMessage::Advance(Box::new(data)))
            .await
            .map_err(|err| EpochStateError::Unavailable(format!("{err:?}")))?
    }

    /// The last committed state.
    pub fn snapshot(&self) -> Arc<ValidatorState> {
        let guard = self
            .published
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn current_epoch(&self) -> u64 {
        self.snapshot().epoch
    }

    pub fn validator(&self, index: u64) -> Option<ValidatorRecord> {
        self.snapshot().validator(index).cloned()
    }
}

struct EpochStateServer {
    backend: Arc<dyn StorageBackend>,
    slots_per_epoch: u64,
    state: Arc<ValidatorState>,
    published: Published,
}

impl EpochStateServer {
    fn advance(&mut self, data: &EpochData) -> Result<u64, EpochStateError> {
        let _timing = metrics::time_epoch_advance();

        let next = transition::apply_epoch(&self.state, data, self.slots_per_epoch)
            .inspect_err(|err| {
                metrics::inc_rejected_advances();
                warn!(%err, "Rejected epoch advance");
            })?;
        snapshot::persist(self.backend.as_ref(), &next)
            .inspect_err(|err| error!(epoch = next.epoch, %err, "Failed to persist validator state"))?;

        let epoch = next.epoch;
        let validators = next.validators.len();
        self.state = Arc::new(next);
        *self
            .published
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::clone(&self.state);

        metrics::update_current_epoch(epoch);
        metrics::update_tracked_validators(validators);
        info!(%epoch, validators, "Advanced validator state");
        Ok(epoch)
    }
}

#[derive(Clone, Debug)]
enum CallMessage {
    Advance(Box<EpochData>),
}

impl GenServer for EpochStateServer {
    type CallMsg = CallMessage;

    type CastMsg = ();

    type OutMsg = Result<u64, EpochStateError>;

    type Error = ();

    async fn handle_call(
        &mut self,
        message: Self::CallMsg,
        _handle: &GenServerHandle<Self>,
    ) -> CallResponse<Self> {
        match message {
            CallMessage::Advance(data) => CallResponse::Reply(self.advance(&data)),
        }
    }
}

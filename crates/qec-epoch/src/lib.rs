//! Epoch lifecycle manager (spec §2 component D, §4.3).
//!
//! Two cooperating workers share an [`EpochManagerHandle`]: the meta-sync
//! worker keeps `epoch_meta` current from RPC, and the transition validator
//! reconciles end-of-epoch log ranges and finalises stats/emissions exactly
//! once per epoch.

mod emission;
mod error;
mod meta_sync;
mod state;
mod validator;

pub use emission::{capture_emissions, ensure_computors_imported};
pub use error::EpochError;
pub use meta_sync::{sync_epoch_meta, MetaSyncWorker};
pub use state::{EpochManagerHandle, EpochManagerState};
pub use validator::{run_transition_validator, validate_epoch};

use std::sync::Arc;
use std::time::Duration;

use qec_rpc_client::RpcClient;
use qec_store::Store;
use qec_tasks::{run_periodic, TaskManager};

const META_SYNC_PERIOD: Duration = Duration::from_secs(60);
const META_SYNC_INITIAL_DELAY: Duration = Duration::from_secs(10);

/// Spawns both epoch-manager workers onto `manager`, matching the
/// teacher's `spawn_asm_worker`/`spawn_csm_listener` pairing in
/// `services.rs` (spec §9: "independent long-lived tasks supervised by the
/// process entry point").
pub fn spawn_epoch_manager(manager: &mut TaskManager, store: Store, rpc: Arc<RpcClient>) -> EpochManagerHandle {
    let handle = EpochManagerHandle::new();
    let executor = manager.executor();

    let meta_sync_worker = MetaSyncWorker::new(store.clone(), rpc.clone(), handle.clone());
    let meta_sync_shutdown = executor.shutdown_signal();
    manager.spawn_critical("epoch-meta-sync", async move {
        run_periodic(meta_sync_worker, META_SYNC_PERIOD, META_SYNC_INITIAL_DELAY, meta_sync_shutdown).await;
    });

    let validator_shutdown = executor.shutdown_signal();
    let validator_store = store;
    let validator_rpc = rpc;
    let validator_handle = handle.clone();
    manager.spawn_critical("epoch-transition-validator", async move {
        run_transition_validator(validator_store, validator_rpc, validator_handle, validator_shutdown).await;
    });

    handle
}

use std::sync::Arc;

use async_trait::async_trait;
use qec_primitives::{Epoch, EpochMeta, LogId, TickNumber};
use qec_rpc_client::{EpochInfo, RpcClient};
use qec_store::Store;
use qec_tasks::PeriodicWorker;
use tracing::info;

use crate::error::EpochError;
use crate::state::EpochManagerHandle;

fn epoch_info_to_meta(info: EpochInfo) -> EpochMeta {
    let mut meta = EpochMeta {
        epoch: Epoch(info.epoch),
        initial_tick: TickNumber(info.initial_tick),
        end_tick: TickNumber(info.end_tick),
        end_tick_start_log_id: LogId(info.end_tick_start_log_id),
        end_tick_end_log_id: LogId(info.end_tick_end_log_id),
        is_complete: false,
        final_stats: None,
    };
    meta.is_complete = meta.derive_is_complete();
    meta
}

/// Syncs `epoch_meta` from RPC for epoch `E` (spec §4.3 meta-sync worker).
pub async fn sync_epoch_meta(
    store: &Store,
    rpc: &RpcClient,
    epoch: Epoch,
) -> Result<EpochMeta, EpochError> {
    let info = rpc.get_epoch_info(epoch).await?;
    let meta = epoch_info_to_meta(info);
    store.upsert_epoch_meta(&meta).await?;
    Ok(meta)
}

/// Period 60s, initial delay 10s (spec §4.3). On startup syncs the
/// previous and current epoch; thereafter re-syncs both whenever
/// `max(tick.epoch)` advances beyond the last observed value.
pub struct MetaSyncWorker {
    store: Store,
    rpc: Arc<RpcClient>,
    handle: EpochManagerHandle,
}

impl MetaSyncWorker {
    pub fn new(store: Store, rpc: Arc<RpcClient>, handle: EpochManagerHandle) -> Self {
        Self { store, rpc, handle }
    }
}

#[async_trait]
impl PeriodicWorker for MetaSyncWorker {
    type Error = EpochError;

    async fn run_once(&mut self) -> Result<bool, Self::Error> {
        let Some(current) = self.store.max_tick_epoch().await? else {
            return Ok(false);
        };
        let last_observed = self.handle.snapshot().await.last_observed_epoch;

        if last_observed == Some(current) {
            return Ok(false);
        }

        sync_epoch_meta(&self.store, &self.rpc, current).await?;
        if let Some(previous) = current.0.checked_sub(1).map(Epoch) {
            sync_epoch_meta(&self.store, &self.rpc, previous).await?;
            self.handle.queue_validation(previous).await;
            info!(previous = previous.0, current = current.0, "epoch rollover detected");
        }
        self.handle.set_last_observed(current).await;
        Ok(true)
    }

    fn name(&self) -> &str {
        "epoch-meta-sync"
    }
}

use std::sync::Arc;
use std::time::Duration;

use qec_primitives::{Epoch, EpochMeta, LogId, TickNumber};
use qec_rpc_client::RpcClient;
use qec_store::Store;
use qec_tasks::{is_shutting_down, sleep_or_shutdown, ShutdownSignal};
use tracing::{info, warn};

use crate::emission::capture_emissions;
use crate::error::EpochError;
use crate::state::EpochManagerHandle;

const NORMAL_PERIOD: Duration = Duration::from_secs(60);
const CRITICAL_PERIOD: Duration = Duration::from_secs(30 * 60);
const INITIAL_DELAY: Duration = Duration::from_secs(15);

/// Runs the "validate epoch E" algorithm (spec §4.3 steps 1-6). Returns
/// `Ok(())` on success (including the idempotent no-op when the epoch is
/// already marked complete locally) or an [`EpochError`]; critical variants
/// are the caller's cue to latch `hasCriticalError`.
pub async fn validate_epoch(store: &Store, rpc: &Arc<RpcClient>, epoch: Epoch) -> Result<(), EpochError> {
    // Step 1: epoch_meta(E) comes from RPC directly, not the local store —
    // the store's copy is synced by MetaSyncWorker on its own schedule, and
    // reading it here would race that worker's initial delay on a fresh
    // process start.
    let info = rpc.get_epoch_info(epoch).await?;
    if info.end_tick_start_log_id == 0 || info.end_tick_end_log_id == 0 {
        return Err(EpochError::IncompleteEndTickInfo { epoch });
    }
    let start = LogId(info.end_tick_start_log_id);
    let end = LogId(info.end_tick_end_log_id);

    let existing = store.get_epoch_meta(epoch).await?;
    if let Some(existing) = &existing {
        if existing.is_complete && existing.final_stats.is_some() {
            // Final stats and emission capture already ran exactly once.
            return Ok(());
        }
    }

    // Step 2-3.
    let max_log_id = store.max_log_id_for_epoch(epoch).await?.map(|id| id.0).unwrap_or(0);
    if max_log_id < start.0.saturating_sub(1) {
        return Err(EpochError::MissingLogsBeforeEndTick {
            epoch,
            have: max_log_id,
            need: start.0.saturating_sub(1),
        });
    }

    // Step 4.
    if max_log_id < end.0 {
        let logs = rpc.get_end_epoch_logs(epoch).await?;
        store.insert_logs(&logs).await?;
    }

    // Step 5.
    if !store.has_end_epoch_marker(epoch, start, end).await? {
        return Err(EpochError::MissingEndEpochMarker { epoch });
    }

    // Step 6: mark complete, compute final stats exactly once, capture emissions.
    let mut meta = EpochMeta {
        epoch,
        initial_tick: TickNumber(info.initial_tick),
        end_tick: TickNumber(info.end_tick),
        end_tick_start_log_id: start,
        end_tick_end_log_id: end,
        is_complete: true,
        final_stats: existing.and_then(|e| e.final_stats),
    };
    if meta.final_stats.is_none() {
        let aggregates = store
            .network_aggregates(meta.initial_tick, meta.end_tick, &[])
            .await?;
        meta.final_stats = Some(serde_json::json!({
            "tx_count": aggregates.tx_count,
            "total_volume": aggregates.total_volume,
            "unique_senders": aggregates.unique_senders,
            "unique_receivers": aggregates.unique_receivers,
            "sc_call_count": aggregates.sc_call_count,
        }));
    }
    store.upsert_epoch_meta(&meta).await?;
    capture_emissions(store, rpc, epoch, meta.end_tick).await?;

    info!(%epoch, "epoch transition validated and finalised");
    Ok(())
}

async fn run_validation(
    store: &Store,
    rpc: &Arc<RpcClient>,
    handle: &EpochManagerHandle,
    epoch: Epoch,
) {
    match validate_epoch(store, rpc, epoch).await {
        Ok(()) => handle.clear_critical_error().await,
        Err(err) if err.is_critical() => {
            warn!(%epoch, %err, "critical epoch-transition error, backing off to 30min cadence");
            handle.latch_critical_error(epoch).await;
        }
        Err(err) => {
            warn!(%epoch, %err, "transition validation failed, will retry next cycle");
        }
    }
}

/// Drives the transition validator worker forever: 60s cadence normally,
/// 30min while latched in a critical-error state (spec §4.3). On startup,
/// does a one-shot validation of the previous epoch before entering the
/// steady-state loop.
pub async fn run_transition_validator(
    store: Store,
    rpc: Arc<RpcClient>,
    handle: EpochManagerHandle,
    mut shutdown: ShutdownSignal,
) {
    if !sleep_or_shutdown(INITIAL_DELAY, &mut shutdown).await {
        return;
    }

    if let Ok(Some(current)) = store.max_tick_epoch().await {
        if let Some(previous) = current.0.checked_sub(1).map(Epoch) {
            run_validation(&store, &rpc, &handle, previous).await;
        }
    }

    loop {
        if is_shutting_down(&shutdown) {
            return;
        }
        if let Some(epoch) = handle.take_pending_validation().await {
            run_validation(&store, &rpc, &handle, epoch).await;
        }
        let period = if handle.is_critical().await {
            CRITICAL_PERIOD
        } else {
            NORMAL_PERIOD
        };
        if !sleep_or_shutdown(period, &mut shutdown).await {
            return;
        }
    }
}

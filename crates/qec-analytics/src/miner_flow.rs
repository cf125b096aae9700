use std::time::Instant;

use qec_common::metrics::{SNAPSHOTS_EMITTED_TOTAL, SNAPSHOT_EMIT_DURATION_SECONDS};
use qec_primitives::{Address, Epoch};
use qec_store::{schema::MinerFlowStatsRow, SnapshotKind, Store};
use tracing::debug;

use crate::error::AnalyticsError;
use crate::window::{next_window, Window};

/// "Emit next miner-flow row" (spec §4.5): unlike the other three kinds,
/// this one's data comes from the flow tracker's per-emission-epoch state
/// rather than directly from ticks, so its window is anchored to the
/// *emission* epoch = `epoch(tick_end) - 1`. At epoch 0 there is no prior
/// emission epoch yet, so the row is skipped (not emitted, not marked)
/// until the chain has moved past it.
pub async fn emit_next_miner_flow_row(store: &Store) -> Result<bool, AnalyticsError> {
    let Some(window) = next_window(store, SnapshotKind::MinerFlow).await? else {
        return Ok(false);
    };
    let started = Instant::now();
    let Window { tick_start, tick_end, window_start_ms, .. } = window;

    let Some(current_epoch) = store.epoch_of_tick(tick_end).await? else {
        return Ok(false);
    };
    let Some(emission_epoch) = current_epoch.emission_epoch() else {
        return Ok(false);
    };

    let (total_received, total_sent, total_pending) = store.flow_state_totals(emission_epoch).await?;
    let (exchange_terminal_amount, smart_contract_terminal_amount) =
        store.flow_terminal_amounts(emission_epoch, tick_start, tick_end).await?;

    // "Additional inflow" to computors (spec §9) is a separate observational
    // metric from `received`: non-emission transfers landing on computor
    // addresses during this window, net of what they send back out.
    let computors = store.get_computors(emission_epoch).await?;
    let burn_address = Address::burn();
    let miner_net_position = store
        .computor_net_position(&computors, &burn_address, tick_start, tick_end)
        .await?;

    let row = MinerFlowStatsRow {
        epoch: current_epoch.0,
        emission_epoch: emission_epoch.0,
        tick_start: tick_start.0,
        tick_end: tick_end.0,
        snapshot_at_ms: window_start_ms,
        total_received,
        total_sent,
        total_pending,
        exchange_terminal_amount,
        smart_contract_terminal_amount,
        miner_net_position,
    };
    store.insert_miner_flow_snapshot(&row).await?;
    SNAPSHOTS_EMITTED_TOTAL.with_label_values(&["miner_flow"]).inc();
    SNAPSHOT_EMIT_DURATION_SECONDS
        .with_label_values(&["miner_flow"])
        .observe(started.elapsed().as_secs_f64());
    debug!(?tick_start, ?tick_end, %emission_epoch, "emitted miner-flow stats row");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emission_epoch_none_at_genesis() {
        assert_eq!(Epoch(0).emission_epoch(), None);
    }
}

use std::time::Instant;

use qec_common::metrics::{SNAPSHOTS_EMITTED_TOTAL, SNAPSHOT_EMIT_DURATION_SECONDS};
use qec_labels::{LabelKind, LabelRegistry};
use qec_primitives::Epoch;
use qec_store::{schema::NetworkStatsRow, SnapshotKind, Store};
use tracing::debug;

use crate::error::AnalyticsError;
use crate::window::{next_window, Window};

/// "Emit next network row" (spec §4.5 network stats semantics): transaction
/// counts/volume plus exchange net-flow over the window, using the label
/// registry to resolve the current exchange address set.
pub async fn emit_next_network_row(
    store: &Store,
    labels: &LabelRegistry,
) -> Result<bool, AnalyticsError> {
    let Some(window) = next_window(store, SnapshotKind::Network).await? else {
        return Ok(false);
    };
    let started = Instant::now();
    let Window { tick_start, tick_end, window_start_ms, .. } = window;

    let exchange_addresses: Vec<_> = labels
        .by_type(LabelKind::Exchange)
        .into_iter()
        .map(|entry| entry.address)
        .collect();
    let aggregates = store.network_aggregates(tick_start, tick_end, &exchange_addresses).await?;

    let epoch = store.epoch_of_tick(tick_end).await?.unwrap_or(Epoch(0));
    let row = NetworkStatsRow {
        epoch: epoch.0,
        tick_start: tick_start.0,
        tick_end: tick_end.0,
        snapshot_at_ms: window_start_ms,
        tx_count: aggregates.tx_count,
        total_volume: aggregates.total_volume,
        unique_senders: aggregates.unique_senders,
        unique_receivers: aggregates.unique_receivers,
        exchange_net_flow: aggregates.exchange_net_flow,
        sc_call_count: aggregates.sc_call_count,
    };
    store.insert_network_snapshot(&row).await?;
    SNAPSHOTS_EMITTED_TOTAL.with_label_values(&["network"]).inc();
    SNAPSHOT_EMIT_DURATION_SECONDS
        .with_label_values(&["network"])
        .observe(started.elapsed().as_secs_f64());
    debug!(?tick_start, ?tick_end, tx_count = row.tx_count, "emitted network stats row");
    Ok(true)
}

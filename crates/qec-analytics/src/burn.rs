use std::time::Instant;

use qec_common::metrics::{SNAPSHOTS_EMITTED_TOTAL, SNAPSHOT_EMIT_DURATION_SECONDS};
use qec_primitives::{Address, Epoch};
use qec_store::{schema::BurnStatsRow, SnapshotKind, Store};
use tracing::debug;

use crate::error::AnalyticsError;
use crate::window::{next_window, Window};

/// "Emit next burn row" (spec §4.5 burn stats semantics): amount burned in
/// the window plus the running cumulative total since genesis.
pub async fn emit_next_burn_row(store: &Store) -> Result<bool, AnalyticsError> {
    let Some(window) = next_window(store, SnapshotKind::Burn).await? else {
        return Ok(false);
    };
    let started = Instant::now();
    let Window { tick_start, tick_end, window_start_ms, .. } = window;

    let burn_address = Address::burn();
    let aggregates = store.burn_aggregates(tick_start, tick_end, &burn_address).await?;
    let cumulative_before = store.cumulative_burned_before(tick_start).await?;
    let cumulative_total = cumulative_before + aggregates.total_burned;

    let epoch = store.epoch_of_tick(tick_end).await?.unwrap_or(Epoch(0));
    let row = BurnStatsRow {
        epoch: epoch.0,
        tick_start: tick_start.0,
        tick_end: tick_end.0,
        snapshot_at_ms: window_start_ms,
        total_burned: aggregates.total_burned,
        unique_burners: aggregates.unique_burners,
        largest_burn: aggregates.largest_burn,
        cumulative_total,
    };
    store.insert_burn_snapshot(&row).await?;
    SNAPSHOTS_EMITTED_TOTAL.with_label_values(&["burn"]).inc();
    SNAPSHOT_EMIT_DURATION_SECONDS
        .with_label_values(&["burn"])
        .observe(started.elapsed().as_secs_f64());
    debug!(?tick_start, ?tick_end, burned = row.total_burned, "emitted burn stats row");
    Ok(true)
}

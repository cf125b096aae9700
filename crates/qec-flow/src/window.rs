use std::collections::HashMap;

use qec_primitives::{Epoch, TickNumber};
use qec_store::{FlowHopInsert, FlowStateRow, Store};
use tracing::debug;

use crate::process::process_transfer;
use crate::state::{ClassificationSets, PendingEntry};

/// Runs one per-window pass over an emission epoch's pending ledger (spec
/// §4.6 "continuous across windows"): loads whatever state survived the
/// last pass, replays every outbound transfer from a tracked address since
/// the last processed tick, and persists the new state plus every flow-hop
/// row it produced. Returns whether any transfer was processed.
pub async fn run_window_pass(
    store: &Store,
    emission_epoch: Epoch,
    classify: &ClassificationSets,
    latest_tick: TickNumber,
) -> Result<bool, crate::error::FlowError> {
    let pending_rows = store.load_pending_flow_state(emission_epoch).await?;
    if pending_rows.is_empty() {
        return Ok(false);
    }

    let mut ledger: HashMap<_, _> = pending_rows
        .into_iter()
        .map(|row| {
            let entry = PendingEntry::from_row(row);
            ((entry.address, entry.origin), entry)
        })
        .collect();

    let progressed_tick = store.flow_progress_tick(emission_epoch).await?;
    let tick_start = progressed_tick.map(TickNumber::next).unwrap_or(TickNumber(0));
    if tick_start > latest_tick {
        return Ok(false);
    }

    let sources: Vec<_> = ledger.keys().map(|(addr, _)| *addr).collect();
    let sources: Vec<_> = {
        let mut s = sources;
        s.sort();
        s.dedup();
        s
    };

    let multicast_map = store
        .multicast_outputs_in_range(&classify.multicast_contract, tick_start, latest_tick)
        .await?;
    let transfers = store.outbound_transfers_in_range(&sources, tick_start, latest_tick).await?;

    if transfers.is_empty() {
        store.record_flow_progress(emission_epoch, latest_tick).await?;
        return Ok(false);
    }

    let mut all_hops: Vec<FlowHopInsert> = Vec::new();
    for transfer in &transfers {
        if !transfer.log_type.is_transfer_shaped() {
            continue;
        }
        let hops = process_transfer(&mut ledger, &multicast_map, classify, emission_epoch, transfer);
        all_hops.extend(hops);
    }

    let state_rows: Vec<FlowStateRow> = ledger.into_values().map(PendingEntry::into_row).collect();
    store.upsert_flow_state(&state_rows).await?;
    if !all_hops.is_empty() {
        store.bulk_insert_flow_hops(&all_hops).await?;
    }
    store.record_flow_progress(emission_epoch, latest_tick).await?;

    debug!(
        %emission_epoch,
        transfers = transfers.len(),
        hops = all_hops.len(),
        state_rows = state_rows.len(),
        "flow window pass complete"
    );
    Ok(true)
}

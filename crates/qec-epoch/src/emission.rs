use std::sync::Arc;

use qec_primitives::{Address, ComputorList, Epoch};
use qec_rpc_client::RpcClient;
use qec_store::Store;

use crate::error::EpochError;

/// Ensures the computor list for `epoch` is imported, fetching from RPC if
/// necessary (spec §4.3 emission capture: "Ensure computor list for E is
/// imported").
pub async fn ensure_computors_imported(
    store: &Store,
    rpc: &RpcClient,
    epoch: Epoch,
) -> Result<Vec<Address>, EpochError> {
    if store.computors_imported(epoch).await? {
        return Ok(store.get_computors(epoch).await?);
    }
    let addresses = rpc.get_computors(epoch).await?;
    let list = ComputorList { epoch, addresses: addresses.clone() };
    store.insert_computors(&list).await?;
    Ok(addresses)
}

/// Emission capture for epoch `E` (spec §4.3): sums burn-sourced transfers
/// landing on a computor at `end_tick`, persists per-computor rows plus a
/// summary row, guarded by `emission_imports` so it only runs once.
pub async fn capture_emissions(
    store: &Store,
    rpc: &Arc<RpcClient>,
    epoch: Epoch,
    end_tick: qec_primitives::TickNumber,
) -> Result<(), EpochError> {
    if store.emission_import_exists(epoch).await? {
        return Ok(());
    }

    let computors = ensure_computors_imported(store, rpc, epoch).await?;

    let burn_address = Address::burn();
    let emissions = store
        .sum_emission_by_computor(epoch, end_tick, &burn_address, &computors)
        .await?;

    if emissions.is_empty() {
        return Ok(());
    }

    store.insert_computor_emissions(&emissions).await?;

    let total_emission: u64 = emissions.iter().map(|e| e.amount).sum();
    let emission_tick = emissions
        .iter()
        .map(|_| end_tick)
        .next()
        .unwrap_or(end_tick);
    store
        .insert_emission_import_marker(epoch, emissions.len() as u32, total_emission, emission_tick)
        .await?;
    Ok(())
}

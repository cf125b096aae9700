use qec_primitives::Epoch;
use qec_store::{FlowStateRow, Store};
use tracing::info;

use crate::error::FlowError;
use crate::state::AddressType;

/// "Initialisation (per E, once)" (spec §4.6): for every computor address
/// that received emission in epoch `E`, insert an initial pending entry at
/// hop level 1. A no-op if emissions haven't been captured for `E` yet, or
/// if `E` has already been initialised. Returns whether it did the work.
pub async fn initialize_emission_epoch(store: &Store, emission_epoch: Epoch) -> Result<bool, FlowError> {
    if store.flow_state_exists(emission_epoch).await? {
        return Ok(false);
    }
    let emissions = store.get_computor_emissions(emission_epoch).await?;
    if emissions.is_empty() {
        return Ok(false);
    }

    let rows: Vec<FlowStateRow> = emissions
        .into_iter()
        .map(|e| FlowStateRow {
            emission_epoch,
            address: e.address,
            origin_address: e.address,
            address_type: AddressType::Computor.wire_code(),
            received: e.amount,
            sent: 0,
            hop_level: 1,
            is_terminal: false,
            is_complete: false,
        })
        .collect();

    let count = rows.len();
    store.upsert_flow_state(&rows).await?;
    info!(%emission_epoch, computors = count, "initialised flow tracking state for emission epoch");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computor_rows_start_at_hop_one_fully_pending() {
        let row = FlowStateRow {
            emission_epoch: Epoch(5),
            address: qec_primitives::Address::burn(),
            origin_address: qec_primitives::Address::burn(),
            address_type: AddressType::Computor.wire_code(),
            received: 1000,
            sent: 0,
            hop_level: 1,
            is_terminal: false,
            is_complete: false,
        };
        assert_eq!(row.hop_level, 1);
        assert_eq!(row.received, 1000);
        assert!(!row.is_complete);
    }
}

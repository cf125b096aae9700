use serde::{Deserialize, Serialize};

use crate::{Address, Amount, Epoch, TickNumber};

/// A spectrum (balance) entry as published in a snapshot archive, captured
/// at the start of the epoch (spec §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub epoch: Epoch,
    pub address: Address,
    pub incoming_amount: Amount,
    pub outgoing_amount: Amount,
    pub num_incoming: u32,
    pub num_outgoing: u32,
    pub latest_incoming_tick: TickNumber,
    pub latest_outgoing_tick: TickNumber,
}

impl BalanceSnapshot {
    /// `balance = incoming - outgoing` (spec §4.4 spectrum record layout).
    pub fn balance(&self) -> i64 {
        self.incoming_amount as i64 - self.outgoing_amount as i64
    }
}

/// Which facet of an asset record a universe-snapshot row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetRecordKind {
    Issuance,
    Ownership,
    Possession,
}

/// A single resolved asset record from the universe snapshot (spec §3,
/// §4.4). Ownership/possession rows are only constructed once their
/// reference chain (`issuance_idx`, `ownership_idx`) resolves; dangling
/// references are dropped before this type is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub epoch: Epoch,
    pub record_type: AssetRecordKind,
    pub issuer: Address,
    pub asset_name: String,
    pub number_of_decimal_places: i8,
    pub holder: Address,
    pub managing_contract_index: Option<u16>,
    pub number_of_shares: i64,
}

/// Import marker recorded once a spectrum archive has been parsed and
/// bulk-inserted for an epoch (spec §4.4 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumImportMarker {
    pub epoch: Epoch,
    pub tick_number: TickNumber,
    pub record_count: u64,
    pub file_size_bytes: u64,
    pub duration_ms: u64,
}

/// Import marker recorded once a universe archive has been parsed and
/// bulk-inserted for an epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseImportMarker {
    pub epoch: Epoch,
    pub tick_number: TickNumber,
    pub issuance_count: u64,
    pub ownership_count: u64,
    pub possession_count: u64,
    pub file_size_bytes: u64,
    pub duration_ms: u64,
}

/// Idempotency guard row for emission capture: one per epoch, created only
/// on the first successful capture (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionImportMarker {
    pub epoch: Epoch,
    pub computor_count: u32,
    pub total_emission: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_is_incoming_minus_outgoing_and_allows_zero() {
        let snap = BalanceSnapshot {
            epoch: Epoch(1),
            address: Address::burn(),
            incoming_amount: 500,
            outgoing_amount: 500,
            num_incoming: 1,
            num_outgoing: 1,
            latest_incoming_tick: TickNumber(10),
            latest_outgoing_tick: TickNumber(11),
        };
        assert_eq!(snap.balance(), 0);
    }
}

use std::time::Instant;

use qec_primitives::identity::identity;
use qec_primitives::{Address, AssetRecordKind, AssetSnapshot, Epoch, TickNumber, UniverseImportMarker};
use qec_store::Store;
use tracing::info;

use crate::download::{download_archive_entry, ArchiveKind};
use crate::error::SnapshotError;

/// Fixed record width (spec §4.4): discriminated union, 48 bytes total.
const RECORD_LEN: usize = 48;

#[derive(Debug, Clone)]
struct RawIssuance {
    issuer: Address,
    asset_name: String,
    number_of_decimal_places: i8,
}

#[derive(Debug, Clone)]
struct RawOwnership {
    holder: Address,
    managing_contract_index: u16,
    issuance_idx: u32,
    shares: i64,
}

#[derive(Debug, Clone)]
struct RawPossession {
    holder: Address,
    managing_contract_index: u16,
    ownership_idx: u32,
    shares: i64,
}

/// First pass: collects raw records by their position index in the file
/// (spec §4.4: "collect raw issuances/ownerships/possessions by their
/// position index in the file"). Position is the record's slot in the
/// overall union stream — ownership/possession `*_idx` fields reference
/// this same global indexing.
fn collect_raw_records(
    bytes: &[u8],
) -> Result<
    (
        std::collections::HashMap<usize, RawIssuance>,
        std::collections::HashMap<usize, RawOwnership>,
        std::collections::HashMap<usize, RawPossession>,
    ),
    SnapshotError,
> {
    if bytes.len() % RECORD_LEN != 0 {
        return Err(SnapshotError::RecordParse(format!(
            "universe entry length {} is not a multiple of {RECORD_LEN}",
            bytes.len()
        )));
    }

    let mut issuances = std::collections::HashMap::new();
    let mut ownerships = std::collections::HashMap::new();
    let mut possessions = std::collections::HashMap::new();

    for (index, record) in bytes.chunks_exact(RECORD_LEN).enumerate() {
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&record[0..32]);
        if public_key == [0u8; 32] {
            continue;
        }
        let address = identity(&public_key);
        let record_type = record[32];

        match record_type {
            1 => {
                let name_bytes = &record[33..40];
                let name = name_bytes
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect::<String>();
                let decimals = record[40] as i8;
                issuances.insert(
                    index,
                    RawIssuance {
                        issuer: address,
                        asset_name: name,
                        number_of_decimal_places: decimals,
                    },
                );
            }
            2 => {
                // _pad(1) | managing_contract_idx(u16) | issuance_idx(u32) | shares(i64)
                let managing_contract_index = u16::from_le_bytes(record[34..36].try_into().unwrap());
                let issuance_idx = u32::from_le_bytes(record[36..40].try_into().unwrap());
                let shares = i64::from_le_bytes(record[40..48].try_into().unwrap());
                ownerships.insert(
                    index,
                    RawOwnership {
                        holder: address,
                        managing_contract_index,
                        issuance_idx,
                        shares,
                    },
                );
            }
            3 => {
                let managing_contract_index = u16::from_le_bytes(record[34..36].try_into().unwrap());
                let ownership_idx = u32::from_le_bytes(record[36..40].try_into().unwrap());
                let shares = i64::from_le_bytes(record[40..48].try_into().unwrap());
                possessions.insert(
                    index,
                    RawPossession {
                        holder: address,
                        managing_contract_index,
                        ownership_idx,
                        shares,
                    },
                );
            }
            _ => continue,
        }
    }

    Ok((issuances, ownerships, possessions))
}

/// Three-pass resolution (spec §4.4): collect, resolve ownership ->
/// issuance, resolve possession -> ownership -> issuance. Dangling
/// references are silently dropped, not errored.
fn resolve_asset_snapshots(
    epoch: Epoch,
    issuances: std::collections::HashMap<usize, RawIssuance>,
    ownerships: std::collections::HashMap<usize, RawOwnership>,
    possessions: std::collections::HashMap<usize, RawPossession>,
) -> Vec<AssetSnapshot> {
    let mut out = Vec::new();

    for issuance in issuances.values() {
        out.push(AssetSnapshot {
            epoch,
            record_type: AssetRecordKind::Issuance,
            issuer: issuance.issuer,
            asset_name: issuance.asset_name.clone(),
            number_of_decimal_places: issuance.number_of_decimal_places,
            holder: issuance.issuer,
            managing_contract_index: None,
            number_of_shares: 0,
        });
    }

    for ownership in ownerships.values() {
        let Some(issuance) = issuances.get(&(ownership.issuance_idx as usize)) else {
            continue;
        };
        out.push(AssetSnapshot {
            epoch,
            record_type: AssetRecordKind::Ownership,
            issuer: issuance.issuer,
            asset_name: issuance.asset_name.clone(),
            number_of_decimal_places: issuance.number_of_decimal_places,
            holder: ownership.holder,
            managing_contract_index: Some(ownership.managing_contract_index),
            number_of_shares: ownership.shares,
        });
    }

    for possession in possessions.values() {
        let Some(ownership) = ownerships.get(&(possession.ownership_idx as usize)) else {
            continue;
        };
        let Some(issuance) = issuances.get(&(ownership.issuance_idx as usize)) else {
            continue;
        };
        out.push(AssetSnapshot {
            epoch,
            record_type: AssetRecordKind::Possession,
            issuer: issuance.issuer,
            asset_name: issuance.asset_name.clone(),
            number_of_decimal_places: issuance.number_of_decimal_places,
            holder: possession.holder,
            managing_contract_index: Some(possession.managing_contract_index),
            number_of_shares: possession.shares,
        });
    }

    out
}

/// Imports the universe archive for `epoch` (spec §4.4).
pub async fn import_universe(
    store: &Store,
    http: &reqwest::Client,
    scratch_dir: &str,
    epoch: Epoch,
) -> Result<UniverseImportMarker, SnapshotError> {
    let started = Instant::now();
    let (bytes, file_size) =
        download_archive_entry(http, scratch_dir, epoch, ArchiveKind::Universe).await?;

    let records = tokio::task::spawn_blocking(move || -> Result<Vec<AssetSnapshot>, SnapshotError> {
        let (issuances, ownerships, possessions) = collect_raw_records(&bytes)?;
        let issuance_count = issuances.len();
        let ownership_count = ownerships.len();
        let possession_count = possessions.len();
        let _ = (issuance_count, ownership_count, possession_count);
        Ok(resolve_asset_snapshots(epoch, issuances, ownerships, possessions))
    })
    .await??;

    let issuance_count = records
        .iter()
        .filter(|r| r.record_type == AssetRecordKind::Issuance)
        .count() as u64;
    let ownership_count = records
        .iter()
        .filter(|r| r.record_type == AssetRecordKind::Ownership)
        .count() as u64;
    let possession_count = records
        .iter()
        .filter(|r| r.record_type == AssetRecordKind::Possession)
        .count() as u64;

    store.delete_asset_snapshots(epoch).await?;
    store.bulk_insert_asset_snapshots(&records).await?;

    let initial_tick = store
        .epoch_initial_tick(epoch)
        .await?
        .unwrap_or(TickNumber(0));
    let marker = UniverseImportMarker {
        epoch,
        tick_number: initial_tick,
        issuance_count,
        ownership_count,
        possession_count,
        file_size_bytes: file_size,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    store.insert_universe_import_marker(&marker).await?;
    info!(
        %epoch,
        issuances = issuance_count,
        ownerships = ownership_count,
        possessions = possession_count,
        "imported universe snapshot"
    );
    Ok(marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuance_record(pubkey_byte: u8, name: &str) -> [u8; RECORD_LEN] {
        let mut r = [0u8; RECORD_LEN];
        r[0] = pubkey_byte;
        r[32] = 1;
        let name_bytes = name.as_bytes();
        r[33..33 + name_bytes.len()].copy_from_slice(name_bytes);
        r[40] = 4; // decimals
        r
    }

    fn ownership_record(pubkey_byte: u8, issuance_idx: u32, shares: i64) -> [u8; RECORD_LEN] {
        let mut r = [0u8; RECORD_LEN];
        r[0] = pubkey_byte;
        r[32] = 2;
        r[36..40].copy_from_slice(&issuance_idx.to_le_bytes());
        r[40..48].copy_from_slice(&shares.to_le_bytes());
        r
    }

    #[test]
    fn ownership_resolves_through_issuance_index() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&issuance_record(1, "QUBIC"));
        bytes.extend_from_slice(&ownership_record(2, 0, 1000));
        let (issuances, ownerships, possessions) = collect_raw_records(&bytes).unwrap();
        let resolved = resolve_asset_snapshots(Epoch(1), issuances, ownerships, possessions);
        let ownership = resolved
            .iter()
            .find(|r| r.record_type == AssetRecordKind::Ownership)
            .unwrap();
        assert_eq!(ownership.asset_name, "QUBIC");
        assert_eq!(ownership.number_of_shares, 1000);
    }

    #[test]
    fn dangling_issuance_index_is_dropped_not_errored() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&ownership_record(2, 99, 1000));
        let (issuances, ownerships, possessions) = collect_raw_records(&bytes).unwrap();
        let resolved = resolve_asset_snapshots(Epoch(1), issuances, ownerships, possessions);
        assert!(resolved.is_empty());
    }

    #[test]
    fn all_zero_pubkey_record_is_skipped() {
        let bytes = [0u8; RECORD_LEN];
        let (issuances, ownerships, possessions) = collect_raw_records(&bytes).unwrap();
        assert!(issuances.is_empty() && ownerships.is_empty() && possessions.is_empty());
    }
}

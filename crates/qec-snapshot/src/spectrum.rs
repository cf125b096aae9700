use std::time::Instant;

use qec_primitives::identity::identity;
use qec_primitives::{BalanceSnapshot, Epoch, SpectrumImportMarker, TickNumber};
use qec_store::Store;
use tracing::info;

use crate::download::{download_archive_entry, ArchiveKind};
use crate::error::SnapshotError;

/// Fixed record width (spec §4.4): `pubkey(32) | incoming_amt_i64 |
/// outgoing_amt_i64 | n_in_u32 | n_out_u32 | latest_in_u32 | latest_out_u32`.
const RECORD_LEN: usize = 64;

/// Parses the raw spectrum entry bytes into balance snapshots, discarding
/// records whose public key is all-zero (spec §4.4 step 3).
fn parse_spectrum_records(epoch: Epoch, bytes: &[u8]) -> Result<Vec<BalanceSnapshot>, SnapshotError> {
    if bytes.len() % RECORD_LEN != 0 {
        return Err(SnapshotError::RecordParse(format!(
            "spectrum entry length {} is not a multiple of {RECORD_LEN}",
            bytes.len()
        )));
    }

    let mut out = Vec::with_capacity(bytes.len() / RECORD_LEN);
    for record in bytes.chunks_exact(RECORD_LEN) {
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&record[0..32]);
        if public_key == [0u8; 32] {
            continue;
        }

        let incoming_amount = i64::from_le_bytes(record[32..40].try_into().unwrap());
        let outgoing_amount = i64::from_le_bytes(record[40..48].try_into().unwrap());
        let num_incoming = u32::from_le_bytes(record[48..52].try_into().unwrap());
        let num_outgoing = u32::from_le_bytes(record[52..56].try_into().unwrap());
        let latest_incoming_tick = u32::from_le_bytes(record[56..60].try_into().unwrap());
        let latest_outgoing_tick = u32::from_le_bytes(record[60..64].try_into().unwrap());

        out.push(BalanceSnapshot {
            epoch,
            address: identity(&public_key),
            incoming_amount: incoming_amount.max(0) as u64,
            outgoing_amount: outgoing_amount.max(0) as u64,
            num_incoming,
            num_outgoing,
            latest_incoming_tick: TickNumber(latest_incoming_tick as u64),
            latest_outgoing_tick: TickNumber(latest_outgoing_tick as u64),
        });
    }
    Ok(out)
}

/// Imports the spectrum archive for `epoch` (spec §4.4): download, parse,
/// delete-then-bulk-insert, record an import marker.
pub async fn import_spectrum(
    store: &Store,
    http: &reqwest::Client,
    scratch_dir: &str,
    epoch: Epoch,
) -> Result<SpectrumImportMarker, SnapshotError> {
    let started = Instant::now();
    let (bytes, file_size) =
        download_archive_entry(http, scratch_dir, epoch, ArchiveKind::Spectrum).await?;

    let epoch_for_parse = epoch;
    let records = tokio::task::spawn_blocking(move || parse_spectrum_records(epoch_for_parse, &bytes))
        .await??;

    store.delete_balance_snapshots(epoch).await?;
    store.bulk_insert_balance_snapshots(&records).await?;

    let initial_tick = store
        .epoch_initial_tick(epoch)
        .await?
        .unwrap_or(TickNumber(0));
    let marker = SpectrumImportMarker {
        epoch,
        tick_number: initial_tick,
        record_count: records.len() as u64,
        file_size_bytes: file_size,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    store.insert_spectrum_import_marker(&marker).await?;
    info!(%epoch, records = records.len(), "imported spectrum snapshot");
    Ok(marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pubkey_byte: u8, incoming: i64, outgoing: i64) -> [u8; RECORD_LEN] {
        let mut r = [0u8; RECORD_LEN];
        r[0] = pubkey_byte;
        r[32..40].copy_from_slice(&incoming.to_le_bytes());
        r[40..48].copy_from_slice(&outgoing.to_le_bytes());
        r
    }

    #[test]
    fn all_zero_pubkey_is_discarded() {
        let bytes = record(0, 100, 0);
        let parsed = parse_spectrum_records(Epoch(1), &bytes).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn equal_incoming_outgoing_yields_zero_balance_and_is_kept() {
        let bytes = record(1, 500, 500);
        let parsed = parse_spectrum_records(Epoch(1), &bytes).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].balance(), 0);
    }

    #[test]
    fn wrong_length_entry_errors() {
        let bytes = vec![0u8; RECORD_LEN - 1];
        assert!(parse_spectrum_records(Epoch(1), &bytes).is_err());
    }
}

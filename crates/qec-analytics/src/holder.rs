use std::collections::HashMap;
use std::time::Instant;

use qec_common::metrics::{SNAPSHOTS_EMITTED_TOTAL, SNAPSHOT_EMIT_DURATION_SECONDS};
use qec_primitives::{Address, Epoch, TickNumber};
use qec_store::{schema::HolderDistributionRow, SnapshotKind, Store};
use tracing::debug;

use crate::error::AnalyticsError;
use crate::window::{next_window, Window};

const BILLION: i64 = 1_000_000_000;
const WHALE_THRESHOLD: i64 = 100 * BILLION;
const LARGE_THRESHOLD: i64 = 20 * BILLION;
const MEDIUM_THRESHOLD: i64 = 5 * BILLION;
const SMALL_THRESHOLD: i64 = 500_000_000;

/// `holder_distribution_history.data_source` (spec §7: "holder distribution
/// carries a `data_source ∈ {snapshot_delta, transfer_only}` tag so callers
/// can distinguish" partial results).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    SnapshotDelta,
    TransferOnly,
}

impl DataSource {
    fn wire_code(self) -> u8 {
        match self {
            DataSource::SnapshotDelta => 0,
            DataSource::TransferOnly => 1,
        }
    }
}

#[derive(Debug, Default)]
struct Brackets {
    whale: u64,
    large: u64,
    medium: u64,
    small: u64,
    micro: u64,
}

fn bracketize(balances: &HashMap<Address, i64>) -> (Brackets, Vec<i64>) {
    let mut brackets = Brackets::default();
    let mut positive: Vec<i64> = Vec::new();
    for &balance in balances.values() {
        if balance <= 0 {
            continue;
        }
        positive.push(balance);
        if balance >= WHALE_THRESHOLD {
            brackets.whale += 1;
        } else if balance >= LARGE_THRESHOLD {
            brackets.large += 1;
        } else if balance >= MEDIUM_THRESHOLD {
            brackets.medium += 1;
        } else if balance >= SMALL_THRESHOLD {
            brackets.small += 1;
        } else {
            brackets.micro += 1;
        }
    }
    (brackets, positive)
}

/// Basis-point share of the top `n` balances out of the total positive
/// supply, sorted descending.
fn top_n_share_bp(sorted_desc: &[i64], n: usize, total: i64) -> u32 {
    if total <= 0 {
        return 0;
    }
    let top_sum: i64 = sorted_desc.iter().take(n).sum();
    ((top_sum as i128 * 10_000) / total as i128) as u32
}

async fn resolve_balances(
    store: &Store,
    tick_end: TickNumber,
) -> Result<(HashMap<Address, i64>, DataSource), AnalyticsError> {
    if let Some(snapshot_tick) = store.latest_spectrum_snapshot_tick(tick_end).await? {
        let mut balances = store.spectrum_balances_as_of(snapshot_tick).await?;
        let deltas = store.transfer_deltas_in_range(snapshot_tick, tick_end).await?;
        for (address, delta) in deltas {
            *balances.entry(address).or_insert(0) += delta;
        }
        Ok((balances, DataSource::SnapshotDelta))
    } else {
        let balances = store.transfer_deltas_in_range(TickNumber(0), tick_end).await?;
        Ok((balances, DataSource::TransferOnly))
    }
}

/// "Emit next holder row" (spec §4.5 holder distribution semantics).
/// Returns `true` if a row was emitted, `false` if there isn't a full
/// window's worth of data yet.
pub async fn emit_next_holder_row(store: &Store) -> Result<bool, AnalyticsError> {
    let Some(window) = next_window(store, SnapshotKind::Holder).await? else {
        return Ok(false);
    };
    let started = Instant::now();
    let Window { tick_start, tick_end, window_start_ms, .. } = window;

    let (balances, data_source) = resolve_balances(store, tick_end).await?;
    let (brackets, mut positive) = bracketize(&balances);
    positive.sort_unstable_by(|a, b| b.cmp(a));
    let total: i64 = positive.iter().sum();

    let epoch = store.epoch_of_tick(tick_end).await?.unwrap_or(Epoch(0));
    let row = HolderDistributionRow {
        epoch: epoch.0,
        tick_start: tick_start.0,
        tick_end: tick_end.0,
        snapshot_at_ms: window_start_ms,
        whale_count: brackets.whale,
        large_count: brackets.large,
        medium_count: brackets.medium,
        small_count: brackets.small,
        micro_count: brackets.micro,
        top10_share_bp: top_n_share_bp(&positive, 10, total),
        top50_share_bp: top_n_share_bp(&positive, 50, total),
        top100_share_bp: top_n_share_bp(&positive, 100, total),
        data_source: data_source.wire_code(),
    };
    store.insert_holder_snapshot(&row).await?;
    SNAPSHOTS_EMITTED_TOTAL.with_label_values(&["holder"]).inc();
    SNAPSHOT_EMIT_DURATION_SECONDS
        .with_label_values(&["holder"])
        .observe(started.elapsed().as_secs_f64());
    debug!(?tick_start, ?tick_end, holders = positive.len(), "emitted holder distribution row");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets_partition_by_threshold() {
        let mut balances = HashMap::new();
        balances.insert(Address::burn(), 150 * BILLION); // whale
        let (brackets, positive) = bracketize(&balances);
        assert_eq!(brackets.whale, 1);
        assert_eq!(positive.len(), 1);
    }

    #[test]
    fn non_positive_balances_are_excluded() {
        let mut balances = HashMap::new();
        balances.insert(Address::burn(), 0);
        let (brackets, positive) = bracketize(&balances);
        assert_eq!(brackets.whale + brackets.large + brackets.medium + brackets.small + brackets.micro, 0);
        assert!(positive.is_empty());
    }

    #[test]
    fn top_n_share_handles_empty_supply() {
        assert_eq!(top_n_share_bp(&[], 10, 0), 0);
    }

    #[test]
    fn top_n_share_is_basis_points_of_total() {
        let sorted = vec![60, 40];
        assert_eq!(top_n_share_bp(&sorted, 1, 100), 6000);
        assert_eq!(top_n_share_bp(&sorted, 2, 100), 10_000);
    }
}

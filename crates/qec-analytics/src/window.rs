use qec_primitives::TickNumber;
use qec_store::{SnapshotKind, Store};

use crate::error::AnalyticsError;

/// Snapshot windows are fixed at 4 wall-clock hours (spec §4.5).
pub const WINDOW_WIDTH: std::time::Duration = std::time::Duration::from_secs(4 * 60 * 60);

#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub tick_start: TickNumber,
    pub tick_end: TickNumber,
    pub window_start_ms: u64,
    pub window_end_ms: u64,
}

/// "Emit next <kind> row" steps 1-5 (spec §4.5): finds the next tiled
/// 4-hour window for `kind`, or `None` if there isn't enough data yet for a
/// full window ("not this cycle" per spec §7's data-not-ready policy).
pub async fn next_window(store: &Store, kind: SnapshotKind) -> Result<Option<Window>, AnalyticsError> {
    let last_end = store.max_tick_end_for_kind(kind).await?;

    let start_stamp = if last_end.0 == 0 {
        store.first_tick().await?
    } else {
        store.first_tick_after(last_end).await?
    };
    let Some(start_stamp) = start_stamp else {
        return Ok(None);
    };

    let window_start_ms = start_stamp.timestamp_ms;
    let window_end_ms = window_start_ms + WINDOW_WIDTH.as_millis() as u64;

    let Some(latest) = store.latest_tick().await? else {
        return Ok(None);
    };
    if latest.timestamp_ms < window_end_ms {
        return Ok(None);
    }

    let Some(end_stamp) = store.latest_tick_at_or_before(window_end_ms).await? else {
        return Ok(None);
    };
    if end_stamp.tick_number <= start_stamp.tick_number {
        return Ok(None);
    }

    Ok(Some(Window {
        tick_start: start_stamp.tick_number,
        tick_end: end_stamp.tick_number,
        window_start_ms,
        window_end_ms,
    }))
}

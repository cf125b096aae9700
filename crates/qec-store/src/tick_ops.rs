use qec_primitives::{Epoch, Log, TickNumber, Transaction};

use crate::error::StoreError;
use crate::schema::{LogRow, TickRow, TransactionRow};
use crate::store::Store;

/// A tick's identifying number plus its wall-clock timestamp, the minimal
/// shape the analytics snapshotter's windowing algorithm needs (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickStamp {
    pub tick_number: TickNumber,
    pub timestamp_ms: u64,
}

impl Store {
    pub async fn insert_ticks(&self, ticks: &[TickRow]) -> Result<(), StoreError> {
        self.insert_batched("ticks", ticks).await
    }

    pub async fn insert_transactions(&self, txs: &[Transaction]) -> Result<(), StoreError> {
        let rows: Vec<TransactionRow> = txs.iter().map(TransactionRow::from).collect();
        self.insert_batched("transactions", &rows).await
    }

    pub async fn insert_logs(&self, logs: &[Log]) -> Result<(), StoreError> {
        let rows: Vec<LogRow> = logs.iter().map(LogRow::from).collect();
        self.insert_batched("logs", &rows).await
    }

    pub async fn first_tick(&self) -> Result<Option<TickStamp>, StoreError> {
        self.single_tickstamp("SELECT tick_number, timestamp_ms FROM ticks ORDER BY tick_number ASC LIMIT 1")
            .await
    }

    pub async fn first_tick_after(&self, tick: TickNumber) -> Result<Option<TickStamp>, StoreError> {
        let rows: Vec<(u64, u64)> = self
            .client
            .query(
                "SELECT tick_number, timestamp_ms FROM ticks WHERE tick_number > ? \
                 ORDER BY tick_number ASC LIMIT 1",
            )
            .bind(tick.0)
            .fetch_all()
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|(n, ts)| TickStamp { tick_number: TickNumber(n), timestamp_ms: ts }))
    }

    pub async fn latest_tick(&self) -> Result<Option<TickStamp>, StoreError> {
        self.single_tickstamp("SELECT tick_number, timestamp_ms FROM ticks ORDER BY tick_number DESC LIMIT 1")
            .await
    }

    /// Latest tick whose timestamp is `<= at_ms` (spec §4.5 step 5).
    pub async fn latest_tick_at_or_before(&self, at_ms: u64) -> Result<Option<TickStamp>, StoreError> {
        let rows: Vec<(u64, u64)> = self
            .client
            .query(
                "SELECT tick_number, timestamp_ms FROM ticks WHERE timestamp_ms <= ? \
                 ORDER BY tick_number DESC LIMIT 1",
            )
            .bind(at_ms)
            .fetch_all()
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|(n, ts)| TickStamp { tick_number: TickNumber(n), timestamp_ms: ts }))
    }

    async fn single_tickstamp(&self, sql: &str) -> Result<Option<TickStamp>, StoreError> {
        let rows: Vec<(u64, u64)> = self.client.query(sql).fetch_all().await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|(n, ts)| TickStamp { tick_number: TickNumber(n), timestamp_ms: ts }))
    }

    /// The epoch a tick belongs to, used by the miner-flow snapshot kind to
    /// anchor a window's emission epoch to `epoch(tick_end) - 1` (spec §4.5:
    /// "Its window depends on the emission epoch = current_epoch − 1").
    pub async fn epoch_of_tick(&self, tick: TickNumber) -> Result<Option<Epoch>, StoreError> {
        let rows: Vec<u32> = self
            .client
            .query("SELECT epoch FROM ticks WHERE tick_number = ? LIMIT 1")
            .bind(tick.0)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().next().map(Epoch))
    }

    pub async fn logs_in_tick_range(
        &self,
        tick_start: TickNumber,
        tick_end: TickNumber,
    ) -> Result<Vec<Log>, StoreError> {
        let rows: Vec<LogRow> = self
            .client
            .query(
                "SELECT ?fields FROM logs WHERE tick_number BETWEEN ? AND ? \
                 ORDER BY tick_number, log_id",
            )
            .bind(tick_start.0)
            .bind(tick_end.0)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().map(LogRow::into_log).collect())
    }
}

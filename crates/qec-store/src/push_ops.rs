use qec_primitives::{Address, Log, LogType, TickNumber};

use crate::error::StoreError;
use crate::schema::{LogRow, NotificationLogRow, PushSubscriptionRow};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct PushSubscriptionRecord {
    pub id: String,
    pub address: Address,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub watch_incoming: bool,
    pub watch_outgoing: bool,
    pub watch_large_transfer: bool,
    pub large_transfer_threshold: u64,
    pub last_tick: TickNumber,
}

impl Store {
    pub async fn list_subscriptions(&self) -> Result<Vec<PushSubscriptionRecord>, StoreError> {
        let rows: Vec<PushSubscriptionRow> = self
            .client
            .query("SELECT ?fields FROM push_subscriptions")
            .fetch_all()
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                Some(PushSubscriptionRecord {
                    id: r.id,
                    address: r.address.parse().ok()?,
                    endpoint: r.endpoint,
                    p256dh: r.p256dh,
                    auth: r.auth,
                    watch_incoming: r.watch_incoming,
                    watch_outgoing: r.watch_outgoing,
                    watch_large_transfer: r.watch_large_transfer,
                    large_transfer_threshold: r.large_transfer_threshold,
                    last_tick: TickNumber(r.last_tick),
                })
            })
            .collect())
    }

    pub async fn update_subscription_last_tick(
        &self,
        id: &str,
        last_tick: TickNumber,
    ) -> Result<(), StoreError> {
        self.client
            .query("ALTER TABLE push_subscriptions UPDATE last_tick = ? WHERE id = ?")
            .bind(last_tick.0)
            .bind(id)
            .execute()
            .await?;
        Ok(())
    }

    pub async fn remove_subscription(&self, id: &str) -> Result<(), StoreError> {
        self.client
            .query("ALTER TABLE push_subscriptions DELETE WHERE id = ?")
            .bind(id)
            .execute()
            .await?;
        Ok(())
    }

    /// The latest `limit` QU-transfer logs touching `address`, newest
    /// first (spec §4.7 step 2).
    pub async fn latest_transfer_logs_for_address(
        &self,
        address: &Address,
        limit: u32,
    ) -> Result<Vec<Log>, StoreError> {
        let rows: Vec<LogRow> = self
            .client
            .query(
                "SELECT ?fields FROM logs WHERE log_type = 0 AND \
                 ((has_source AND source = ?) OR (has_dest AND dest = ?)) \
                 ORDER BY tick_number DESC, log_id DESC LIMIT ?",
            )
            .bind(address.as_str())
            .bind(address.as_str())
            .bind(limit)
            .fetch_all()
            .await?;
        Ok(rows
            .into_iter()
            .map(LogRow::into_log)
            .filter(|l| matches!(l.log_type, LogType::QuTransfer))
            .collect())
    }

    pub async fn notification_already_sent(
        &self,
        subscription_id: &str,
        address: &Address,
        tick: TickNumber,
    ) -> Result<bool, StoreError> {
        let count: Vec<u64> = self
            .client
            .query(
                "SELECT count() FROM notification_log \
                 WHERE subscription_id = ? AND address = ? AND tick_number = ?",
            )
            .bind(subscription_id)
            .bind(address.as_str())
            .bind(tick.0)
            .fetch_all()
            .await?;
        Ok(count.into_iter().next().unwrap_or(0) > 0)
    }

    pub async fn record_notification_sent(
        &self,
        subscription_id: &str,
        address: &Address,
        tick: TickNumber,
    ) -> Result<(), StoreError> {
        let row = NotificationLogRow {
            subscription_id: subscription_id.to_string(),
            address: address.as_str().to_string(),
            tick_number: tick.0,
        };
        self.insert_batched("notification_log", std::slice::from_ref(&row)).await
    }
}

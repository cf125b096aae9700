use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use qec_primitives::{Address, Log, TickNumber};
use qec_store::{PushSubscriptionRecord, Store};
use qec_tasks::{run_periodic, PeriodicWorker, TaskManager};
use serde::Serialize;
use tracing::warn;
use web_push::{
    ContentEncoding, SubscriptionInfo, SubscriptionKeys, VapidSignatureBuilder, WebPushClient,
    WebPushMessageBuilder,
};

use crate::error::PushError;
use crate::vapid::VapidKeyPair;

const PERIOD: Duration = Duration::from_secs(30);
const INITIAL_DELAY: Duration = Duration::from_secs(20);
/// "the latest 5 QU transfer logs" (spec §4.7 step 2).
const LOGS_PER_ADDRESS: u32 = 5;
/// A subscription's `last_tick` of zero means it has never observed this
/// address before; spec §4.7 step 2 requires that first observation set
/// the high-water mark without notifying.
const UNOBSERVED: TickNumber = TickNumber(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Incoming,
    Outgoing,
    LargeTransfer,
}

impl EventKind {
    fn as_str(self) -> &'static str {
        match self {
            EventKind::Incoming => "incoming",
            EventKind::Outgoing => "outgoing",
            EventKind::LargeTransfer => "large_transfer",
        }
    }
}

#[derive(Serialize)]
struct PushPayload<'a> {
    address: &'a str,
    tick: u64,
    amount: u64,
    event: &'static str,
}

/// Address-watch push notifier (spec §2 component H, §4.7). Polls every
/// subscribed address for new transfers, applies per-subscription event
/// filters, and fans out VAPID-signed web push with `notification_log`
/// dedup.
pub struct AddressMonitorWorker {
    store: Store,
    vapid: VapidKeyPair,
    vapid_subject: String,
    client: WebPushClient,
}

impl AddressMonitorWorker {
    pub fn new(store: Store, vapid: VapidKeyPair, vapid_subject: String) -> Result<Self, PushError> {
        Ok(Self {
            store,
            vapid,
            vapid_subject,
            client: WebPushClient::new()?,
        })
    }

    /// Collects the union of watched addresses and, for each, compares its
    /// latest transfers against every subscription watching it (spec §4.7
    /// steps 1-2).
    async fn poll_once(&self) -> Result<bool, PushError> {
        let subscriptions = self.store.list_subscriptions().await?;
        if subscriptions.is_empty() {
            return Ok(false);
        }

        let mut by_address: HashMap<Address, Vec<PushSubscriptionRecord>> = HashMap::new();
        for sub in subscriptions {
            by_address.entry(sub.address).or_default().push(sub);
        }

        let mut did_work = false;
        for (address, subs) in by_address {
            if self.process_address(address, &subs).await? {
                did_work = true;
            }
        }
        Ok(did_work)
    }

    async fn process_address(
        &self,
        address: Address,
        subs: &[PushSubscriptionRecord],
    ) -> Result<bool, PushError> {
        let mut logs = self
            .store
            .latest_transfer_logs_for_address(&address, LOGS_PER_ADDRESS)
            .await?;
        if logs.is_empty() {
            return Ok(false);
        }
        // `latest_transfer_logs_for_address` returns newest-first; process
        // oldest-first so pushes, if multiple fire, arrive in tick order.
        logs.reverse();
        let max_tick = logs.iter().map(|l| l.tick_number).max().unwrap_or(UNOBSERVED);

        let mut did_work = false;
        for sub in subs {
            if sub.last_tick == UNOBSERVED {
                self.store.update_subscription_last_tick(&sub.id, max_tick).await?;
                continue;
            }
            for log in &logs {
                if log.tick_number <= sub.last_tick {
                    continue;
                }
                let Some(kind) = matching_event_kind(sub, address, log) else {
                    continue;
                };
                if self
                    .store
                    .notification_already_sent(&sub.id, &address, log.tick_number)
                    .await?
                {
                    continue;
                }
                match self.send_push(sub, address, log, kind).await {
                    Ok(()) => {
                        self.store
                            .record_notification_sent(&sub.id, &address, log.tick_number)
                            .await?;
                        did_work = true;
                    }
                    Err(err) if err.is_subscription_gone() => {
                        warn!(subscription = %sub.id, %address, "push subscription gone, removing");
                        self.store.remove_subscription(&sub.id).await?;
                        break;
                    }
                    Err(err) => {
                        warn!(subscription = %sub.id, %address, %err, "push send failed, retaining subscription");
                    }
                }
            }
            self.store.update_subscription_last_tick(&sub.id, max_tick).await?;
        }
        Ok(did_work)
    }

    async fn send_push(
        &self,
        sub: &PushSubscriptionRecord,
        address: Address,
        log: &Log,
        kind: EventKind,
    ) -> Result<(), PushError> {
        let subscription_info = SubscriptionInfo {
            endpoint: sub.endpoint.clone(),
            keys: SubscriptionKeys {
                p256dh: sub.p256dh.clone(),
                auth: sub.auth.clone(),
            },
        };

        let mut sig_builder = VapidSignatureBuilder::from_base64(
            &self.vapid.private_key_b64,
            URL_SAFE_NO_PAD,
            &subscription_info,
        )?;
        sig_builder.add_claim("sub", self.vapid_subject.as_str());
        let signature = sig_builder.build()?;

        let payload = PushPayload {
            address: address.as_str(),
            tick: log.tick_number.0,
            amount: log.amount,
            event: kind.as_str(),
        };
        let body = serde_json::to_vec(&payload)?;

        let mut builder = WebPushMessageBuilder::new(&subscription_info)?;
        builder.set_payload(ContentEncoding::Aes128Gcm, &body);
        builder.set_vapid_signature(signature);
        let message = builder.build()?;

        self.client.send(message).await?;
        Ok(())
    }
}

/// Classifies a transfer against one subscription's enabled event kinds
/// (spec §4.7 step 3). A transfer can only match one kind here even if it
/// would satisfy more than one filter — `large_transfer` only applies when
/// neither `incoming` nor `outgoing` already matched, mirroring the
/// precedence implied by the spec's ordered bullet list.
fn matching_event_kind(sub: &PushSubscriptionRecord, address: Address, log: &Log) -> Option<EventKind> {
    let is_incoming = log.dest == Some(address);
    let is_outgoing = log.source == Some(address);
    if sub.watch_incoming && is_incoming {
        return Some(EventKind::Incoming);
    }
    if sub.watch_outgoing && is_outgoing {
        return Some(EventKind::Outgoing);
    }
    if sub.watch_large_transfer && (is_incoming || is_outgoing) && log.amount >= sub.large_transfer_threshold {
        return Some(EventKind::LargeTransfer);
    }
    None
}

#[async_trait]
impl PeriodicWorker for AddressMonitorWorker {
    type Error = PushError;

    async fn run_once(&mut self) -> Result<bool, Self::Error> {
        self.poll_once().await
    }

    fn name(&self) -> &str {
        "address-monitor"
    }
}

/// Spawns the address-watch push notifier onto `manager` (spec §4.7, §9).
pub fn spawn_address_monitor(
    manager: &mut TaskManager,
    store: Store,
    vapid: VapidKeyPair,
    vapid_subject: String,
) -> Result<(), PushError> {
    let worker = AddressMonitorWorker::new(store, vapid, vapid_subject)?;
    let shutdown = manager.executor().shutdown_signal();
    manager.spawn_critical("address-monitor", async move {
        run_periodic(worker, PERIOD, INITIAL_DELAY, shutdown).await;
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qec_primitives::LogType;

    fn sample_sub(watch_incoming: bool, watch_outgoing: bool, watch_large: bool, threshold: u64) -> PushSubscriptionRecord {
        PushSubscriptionRecord {
            id: "sub-1".to_string(),
            address: "A".repeat(60).parse().unwrap(),
            endpoint: "https://push.example/ep".to_string(),
            p256dh: "p256dh".to_string(),
            auth: "auth".to_string(),
            watch_incoming,
            watch_outgoing,
            watch_large_transfer: watch_large,
            large_transfer_threshold: threshold,
            last_tick: TickNumber(100),
        }
    }

    fn sample_log(addr: Address, dest: bool, amount: u64) -> Log {
        Log {
            epoch: qec_primitives::Epoch(1),
            log_id: qec_primitives::LogId(1),
            tick_number: TickNumber(101),
            log_type: LogType::QuTransfer,
            tx_hash: None,
            source: if dest { None } else { Some(addr) },
            dest: if dest { Some(addr) } else { None },
            amount,
            asset_name: None,
            raw_data: serde_json::Value::Null,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn incoming_filter_matches_only_destination_logs() {
        let sub = sample_sub(true, false, false, 0);
        let addr = sub.address;
        let log = sample_log(addr, true, 10);
        assert_eq!(matching_event_kind(&sub, addr, &log), Some(EventKind::Incoming));

        let outgoing_log = sample_log(addr, false, 10);
        assert_eq!(matching_event_kind(&sub, addr, &outgoing_log), None);
    }

    #[test]
    fn large_transfer_requires_threshold_and_direction() {
        let sub = sample_sub(false, false, true, 1_000);
        let addr = sub.address;
        let below = sample_log(addr, true, 999);
        assert_eq!(matching_event_kind(&sub, addr, &below), None);

        let at_threshold = sample_log(addr, true, 1_000);
        assert_eq!(matching_event_kind(&sub, addr, &at_threshold), Some(EventKind::LargeTransfer));
    }

    #[test]
    fn incoming_takes_precedence_over_large_transfer() {
        let sub = sample_sub(true, false, true, 1);
        let addr = sub.address;
        let log = sample_log(addr, true, 1_000_000);
        assert_eq!(matching_event_kind(&sub, addr, &log), Some(EventKind::Incoming));
    }

    #[test]
    fn unrelated_address_never_matches() {
        let sub = sample_sub(true, true, true, 0);
        let other: Address = "B".repeat(60).parse().unwrap();
        let log = sample_log(other, true, 500);
        assert_eq!(matching_event_kind(&sub, sub.address, &log), None);
    }
}

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::client::{ClientT, SubscriptionClientT};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use qec_common::TtlCache;
use qec_primitives::{Address, Epoch, Log, LogId};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::RpcError;
use crate::types::{BalanceInfo, BobLog, ComputorsResponse, EpochInfo, NewTickEvent};

const BALANCE_CACHE_TTL: Duration = Duration::from_secs(10);
const COMPUTOR_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const REVENUE_DONATION_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Single multiplexed connection to the upstream node, with automatic
/// reconnect/backoff and read-mostly caching (spec §4.2).
pub struct RpcClient {
    url: String,
    inner: Mutex<Option<WsClient>>,
    connected: AtomicBool,
    reconnect_count: AtomicU64,
    balance_cache: Mutex<TtlCache<Address, BalanceInfo>>,
    computor_cache: Mutex<TtlCache<Epoch, Vec<Address>>>,
    revenue_donation_cache: Mutex<TtlCache<(Address, String, String), String>>,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            url: url.into(),
            inner: Mutex::new(None),
            connected: AtomicBool::new(false),
            reconnect_count: AtomicU64::new(0),
            balance_cache: Mutex::new(TtlCache::new(4096, BALANCE_CACHE_TTL)),
            computor_cache: Mutex::new(TtlCache::new(16, COMPUTOR_CACHE_TTL)),
            revenue_donation_cache: Mutex::new(TtlCache::new(256, REVENUE_DONATION_CACHE_TTL)),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    /// Ensures a live connection exists, reconnecting with a fixed 5s
    /// backoff on failure (spec §4.2: "automatic reconnect/backoff (5s)").
    async fn ensure_connected(&self) -> Result<(), RpcError> {
        let mut guard = self.inner.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        loop {
            match WsClientBuilder::default().build(&self.url).await {
                Ok(client) => {
                    let was_connected = self.connected.swap(true, Ordering::Relaxed);
                    if was_connected {
                        let count = self.reconnect_count.fetch_add(1, Ordering::Relaxed) + 1;
                        info!(attempt = count, "rpc reconnect");
                    }
                    *guard = Some(client);
                    return Ok(());
                }
                Err(err) => {
                    self.connected.store(false, Ordering::Relaxed);
                    warn!(%err, "failed to connect to upstream RPC, retrying in 5s");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: jsonrpsee::core::params::ArrayParams,
    ) -> Result<T, RpcError> {
        self.ensure_connected().await?;
        let guard = self.inner.lock().await;
        let client = guard.as_ref().ok_or(RpcError::NotConnected)?;
        match client.request(method, params).await {
            Ok(value) => Ok(value),
            Err(err) => {
                drop(guard);
                self.connected.store(false, Ordering::Relaxed);
                *self.inner.lock().await = None;
                Err(RpcError::Call(err))
            }
        }
    }

    pub async fn get_balance(&self, address: &Address) -> Result<BalanceInfo, RpcError> {
        if let Some(cached) = self.balance_cache.lock().await.get(address) {
            return Ok(cached);
        }
        match self
            .call::<BalanceInfo>("qubic_getBalance", rpc_params![address.as_str()])
            .await
        {
            Ok(info) => {
                self.balance_cache.lock().await.put(*address, info.clone());
                Ok(info)
            }
            Err(err) => {
                if let Some(stale) = self.balance_cache.lock().await.get_stale(address) {
                    warn!(%err, address = %address, "balance RPC failed, serving stale cache");
                    return Ok(stale);
                }
                Err(err)
            }
        }
    }

    pub async fn get_epoch_info(&self, epoch: Epoch) -> Result<EpochInfo, RpcError> {
        self.call("qubic_getEpochInfo", rpc_params![epoch.0]).await
    }

    pub async fn get_end_epoch_logs(&self, epoch: Epoch) -> Result<Vec<Log>, RpcError> {
        let raw: Vec<BobLog> = self
            .call("qubic_getEndEpochLogs", rpc_params![epoch.0])
            .await?;
        Ok(raw.into_iter().map(BobLog::into_log).collect())
    }

    pub async fn get_logs_by_id_range(
        &self,
        epoch: Epoch,
        start: LogId,
        end: LogId,
    ) -> Result<Vec<Log>, RpcError> {
        let raw: Vec<BobLog> = self
            .call(
                "qubic_getLogsByIdRange",
                rpc_params![epoch.0, start.0, end.0],
            )
            .await?;
        Ok(raw.into_iter().map(BobLog::into_log).collect())
    }

    pub async fn get_computors(&self, epoch: Epoch) -> Result<Vec<Address>, RpcError> {
        if let Some(cached) = self.computor_cache.lock().await.get(&epoch) {
            return Ok(cached);
        }
        let result = self
            .call::<ComputorsResponse>("qubic_getComputors", rpc_params![epoch.0])
            .await;
        match result {
            Ok(response) => {
                let addresses: Vec<Address> = response
                    .computors
                    .iter()
                    .filter_map(|raw| qec_primitives::identity::sanitize_identity_chars(raw))
                    .collect();
                self.computor_cache.lock().await.put(epoch, addresses.clone());
                Ok(addresses)
            }
            Err(err) => {
                if let Some(stale) = self.computor_cache.lock().await.get_stale(&epoch) {
                    warn!(%err, %epoch, "computor list RPC failed, serving stale cache");
                    return Ok(stale);
                }
                Err(err)
            }
        }
    }

    pub async fn query_smart_contract(
        &self,
        contract: &Address,
        func: &str,
        input_hex: &str,
    ) -> Result<String, RpcError> {
        self.call(
            "qubic_querySmartContract",
            rpc_params![contract.as_str(), func, input_hex],
        )
        .await
    }

    /// The revenue-donation query specifically is cached for 10 minutes
    /// (spec §4.2), distinct from ad-hoc `querySmartContract` calls.
    pub async fn query_revenue_donation(
        &self,
        contract: &Address,
        func: &str,
        input_hex: &str,
    ) -> Result<String, RpcError> {
        let key = (*contract, func.to_string(), input_hex.to_string());
        if let Some(cached) = self.revenue_donation_cache.lock().await.get(&key) {
            return Ok(cached);
        }
        match self.query_smart_contract(contract, func, input_hex).await {
            Ok(value) => {
                self.revenue_donation_cache.lock().await.put(key, value.clone());
                Ok(value)
            }
            Err(err) => {
                if let Some(stale) = self.revenue_donation_cache.lock().await.get_stale(&key) {
                    warn!(%err, "revenue-donation RPC failed, serving stale cache");
                    return Ok(stale);
                }
                Err(err)
            }
        }
    }

    /// Subscribes to `newTicks`, reconnecting on disconnect. The returned
    /// subscription is restartable by the caller; dedup against a
    /// high-water mark is the caller's responsibility (spec §4.2: "the
    /// consumer is expected to deduplicate against a high-water-mark").
    pub async fn subscribe_new_ticks(
        &self,
    ) -> Result<jsonrpsee::core::client::Subscription<NewTickEvent>, RpcError> {
        self.ensure_connected().await?;
        let guard = self.inner.lock().await;
        let client = guard.as_ref().ok_or(RpcError::NotConnected)?;
        let sub = client
            .subscribe("subscribe_newTicks", rpc_params![], "unsubscribe_newTicks")
            .await?;
        Ok(sub)
    }
}

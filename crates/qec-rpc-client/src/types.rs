use qec_primitives::{Epoch, Log, LogId, LogType, TickNumber};
use serde::Deserialize;

/// `qubic_getBalance` response shape (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceInfo {
    pub balance: u64,
    #[serde(rename = "currentTick")]
    pub current_tick: u64,
    pub identity: String,
    #[serde(rename = "incomingAmount")]
    pub incoming_amount: u64,
    #[serde(rename = "outgoingAmount")]
    pub outgoing_amount: u64,
}

/// `qubic_getEpochInfo` response shape (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub struct EpochInfo {
    pub epoch: u32,
    #[serde(rename = "initialTick")]
    pub initial_tick: u64,
    #[serde(rename = "endTick")]
    pub end_tick: u64,
    #[serde(rename = "finalTick")]
    pub final_tick: u64,
    #[serde(rename = "endTickStartLogId")]
    pub end_tick_start_log_id: u64,
    #[serde(rename = "endTickEndLogId")]
    pub end_tick_end_log_id: u64,
    #[serde(rename = "numberOfTransactions")]
    pub number_of_transactions: u64,
}

/// `qubic_getComputors` response shape. Addresses "may carry trailing
/// non-ASCII garbage; caller must strip to `[A-Z]*`" (spec §6) — handled
/// by the caller via `qec_primitives::identity::sanitize_identity_chars`.
#[derive(Debug, Clone, Deserialize)]
pub struct ComputorsResponse {
    pub computors: Vec<String>,
}

/// Raw wire log as returned by `getEndEpochLogs`/`getLogsByIdRange`, before
/// it's decoded into the workspace's [`Log`] domain type.
#[derive(Debug, Clone, Deserialize)]
pub struct BobLog {
    pub epoch: u32,
    #[serde(rename = "logId")]
    pub log_id: u64,
    #[serde(rename = "tickNumber")]
    pub tick_number: u64,
    #[serde(rename = "logType")]
    pub log_type: u8,
    #[serde(rename = "txHash")]
    pub tx_hash: Option<String>,
    pub source: Option<String>,
    pub dest: Option<String>,
    pub amount: Option<u64>,
    #[serde(rename = "assetName")]
    pub asset_name: Option<String>,
    #[serde(rename = "rawData", default)]
    pub raw_data: serde_json::Value,
    pub timestamp: u64,
}

impl BobLog {
    pub fn into_log(self) -> Log {
        let custom_message_opcode = if self.log_type == 255 {
            self.raw_data
                .get("customMessage")
                .and_then(|v| v.as_u64())
                .map(|v| v as u8)
        } else {
            None
        };
        Log {
            epoch: Epoch(self.epoch),
            log_id: LogId(self.log_id),
            tick_number: TickNumber(self.tick_number),
            log_type: LogType::from_wire(self.log_type, custom_message_opcode),
            tx_hash: self.tx_hash,
            source: self.source.and_then(|s| s.parse().ok()),
            dest: self.dest.and_then(|s| s.parse().ok()),
            amount: self.amount.unwrap_or(0),
            asset_name: self.asset_name,
            raw_data: self.raw_data,
            timestamp_ms: self.timestamp,
        }
    }
}

/// `newTicks` subscription payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTickEvent {
    #[serde(rename = "tickNumber")]
    pub tick_number: u64,
    pub epoch: u32,
    #[serde(rename = "transactionCount")]
    pub transaction_count: u32,
}

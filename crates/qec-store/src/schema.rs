//! Row types mirroring the logical columns of each store table (spec §6).
//! These are the wire shape clickhouse inserts/selects against; the rest of
//! the workspace only ever sees the richer [`qec_primitives`] types and
//! converts at the `Store` boundary.

use qec_primitives::{
    Address, AssetRecordKind, CustomMessageOpcode, Epoch, Log, LogType, TickNumber, Transaction,
};
use serde::{Deserialize, Serialize};

fn addr_str(a: &Address) -> String {
    a.as_str().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct TickRow {
    pub tick_number: u64,
    pub epoch: u32,
    pub timestamp_ms: u64,
    pub tx_count: u32,
    pub log_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct TransactionRow {
    pub hash: String,
    pub tick_number: u64,
    pub epoch: u32,
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub input_type: u16,
    pub input_data: String,
    pub executed: bool,
    pub log_id_from: u64,
    pub log_id_length: u32,
    pub timestamp_ms: u64,
}

impl From<&Transaction> for TransactionRow {
    fn from(t: &Transaction) -> Self {
        Self {
            hash: t.hash.clone(),
            tick_number: t.tick_number.0,
            epoch: t.epoch.0,
            from: addr_str(&t.from),
            to: addr_str(&t.to),
            amount: t.amount,
            input_type: t.input_type,
            input_data: t.input_data.clone(),
            executed: t.executed,
            log_id_from: t.log_id_from.0,
            log_id_length: t.log_id_length,
            timestamp_ms: t.timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct LogRow {
    pub epoch: u32,
    pub log_id: u64,
    pub tick_number: u64,
    pub log_type: u8,
    pub custom_message_opcode: u8,
    pub has_custom_message_opcode: bool,
    pub tx_hash: String,
    pub has_tx_hash: bool,
    pub source: String,
    pub has_source: bool,
    pub dest: String,
    pub has_dest: bool,
    pub amount: u64,
    pub asset_name: String,
    pub raw_data: String,
    pub timestamp_ms: u64,
}

impl From<&Log> for LogRow {
    fn from(l: &Log) -> Self {
        let (custom_message_opcode, has_custom_message_opcode) = match l.log_type {
            LogType::CustomMessage(op) => (
                match op {
                    CustomMessageOpcode::EndEpoch => 1,
                    CustomMessageOpcode::StartDistributeRewards => 2,
                    CustomMessageOpcode::EndDistributeRewards => 3,
                    CustomMessageOpcode::Other(code) => code,
                },
                true,
            ),
            _ => (0, false),
        };
        Self {
            epoch: l.epoch.0,
            log_id: l.log_id.0,
            tick_number: l.tick_number.0,
            log_type: l.log_type.wire_code(),
            custom_message_opcode,
            has_custom_message_opcode,
            tx_hash: l.tx_hash.clone().unwrap_or_default(),
            has_tx_hash: l.tx_hash.is_some(),
            source: l.source.map(|a| addr_str(&a)).unwrap_or_default(),
            has_source: l.source.is_some(),
            dest: l.dest.map(|a| addr_str(&a)).unwrap_or_default(),
            has_dest: l.dest.is_some(),
            amount: l.amount,
            asset_name: l.asset_name.clone().unwrap_or_default(),
            raw_data: l.raw_data.to_string(),
            timestamp_ms: l.timestamp_ms,
        }
    }
}

impl LogRow {
    pub fn into_log(self) -> Log {
        let log_type = LogType::from_wire(
            self.log_type,
            self.has_custom_message_opcode
                .then_some(self.custom_message_opcode),
        );
        Log {
            epoch: Epoch(self.epoch),
            log_id: qec_primitives::LogId(self.log_id),
            tick_number: TickNumber(self.tick_number),
            log_type,
            tx_hash: self.has_tx_hash.then_some(self.tx_hash),
            source: self.has_source.then(|| self.source.parse().unwrap_or(Address::burn())),
            dest: self.has_dest.then(|| self.dest.parse().unwrap_or(Address::burn())),
            amount: self.amount,
            asset_name: if self.asset_name.is_empty() {
                None
            } else {
                Some(self.asset_name)
            },
            raw_data: serde_json::from_str(&self.raw_data).unwrap_or(serde_json::Value::Null),
            timestamp_ms: self.timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct EpochMetaRow {
    pub epoch: u32,
    pub initial_tick: u64,
    pub end_tick: u64,
    pub end_tick_start_log_id: u64,
    pub end_tick_end_log_id: u64,
    pub is_complete: bool,
    pub final_stats: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct ComputorRow {
    pub epoch: u32,
    pub index: u16,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct ComputorEmissionRow {
    pub epoch: u32,
    pub address: String,
    pub amount: u64,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct EmissionSummaryRow {
    pub epoch: u32,
    pub computor_count: u32,
    pub total_emission: u64,
    pub emission_tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct BalanceSnapshotRow {
    pub epoch: u32,
    pub address: String,
    pub incoming_amount: u64,
    pub outgoing_amount: u64,
    pub num_incoming: u32,
    pub num_outgoing: u32,
    pub latest_incoming_tick: u64,
    pub latest_outgoing_tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct AssetSnapshotRow {
    pub epoch: u32,
    pub record_type: u8,
    pub issuer: String,
    pub asset_name: String,
    pub number_of_decimal_places: i8,
    pub holder: String,
    pub managing_contract_index: u16,
    pub has_managing_contract_index: bool,
    pub number_of_shares: i64,
}

pub fn record_type_code(kind: AssetRecordKind) -> u8 {
    match kind {
        AssetRecordKind::Issuance => 1,
        AssetRecordKind::Ownership => 2,
        AssetRecordKind::Possession => 3,
    }
}

/// One append written every time a `(address, origin_address)` pair's
/// pending state changes. The table carries many historical rows per key;
/// `updated_at_ms` is a ClickHouse-style version column so readers resolve
/// the *latest* row per key via `argMax(..., updated_at_ms)` rather than
/// the store performing in-place mutation (spec §5: "mutation via append or
/// idempotent upsert").
#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct FlowTrackingStateRow {
    pub emission_epoch: u32,
    pub address: String,
    pub origin_address: String,
    pub address_type: u8,
    pub received: u64,
    pub sent: u64,
    pub hop_level: u32,
    pub is_terminal: bool,
    pub is_complete: bool,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct FlowHopRow {
    pub emission_epoch: u32,
    pub current_epoch: u32,
    pub tick_number: u64,
    pub log_id: u64,
    pub tx_hash: String,
    pub source: String,
    pub dest: String,
    pub amount: u64,
    pub origin_address: String,
    pub hop_level: u32,
    pub dest_type: u8,
    pub dest_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct PushSubscriptionRow {
    pub id: String,
    pub address: String,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub watch_incoming: bool,
    pub watch_outgoing: bool,
    pub watch_large_transfer: bool,
    pub large_transfer_threshold: u64,
    pub last_tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct NotificationLogRow {
    pub subscription_id: String,
    pub address: String,
    pub tick_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct HolderDistributionRow {
    pub epoch: u32,
    pub tick_start: u64,
    pub tick_end: u64,
    pub snapshot_at_ms: u64,
    pub whale_count: u64,
    pub large_count: u64,
    pub medium_count: u64,
    pub small_count: u64,
    pub micro_count: u64,
    pub top10_share_bp: u32,
    pub top50_share_bp: u32,
    pub top100_share_bp: u32,
    pub data_source: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct NetworkStatsRow {
    pub epoch: u32,
    pub tick_start: u64,
    pub tick_end: u64,
    pub snapshot_at_ms: u64,
    pub tx_count: u64,
    pub total_volume: u64,
    pub unique_senders: u64,
    pub unique_receivers: u64,
    pub exchange_net_flow: i64,
    pub sc_call_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct BurnStatsRow {
    pub epoch: u32,
    pub tick_start: u64,
    pub tick_end: u64,
    pub snapshot_at_ms: u64,
    pub total_burned: u64,
    pub unique_burners: u64,
    pub largest_burn: u64,
    pub cumulative_total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, clickhouse::Row)]
pub struct MinerFlowStatsRow {
    pub epoch: u32,
    pub emission_epoch: u32,
    pub tick_start: u64,
    pub tick_end: u64,
    pub snapshot_at_ms: u64,
    pub total_received: u64,
    pub total_sent: u64,
    pub total_pending: u64,
    pub exchange_terminal_amount: u64,
    pub smart_contract_terminal_amount: u64,
    pub miner_net_position: i64,
}

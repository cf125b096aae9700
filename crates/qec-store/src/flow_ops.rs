use std::collections::HashMap;

use qec_primitives::{Address, Epoch, Log, LogType, TickNumber};

use crate::error::StoreError;
use crate::schema::{FlowHopRow, FlowTrackingStateRow};
use crate::store::Store;

/// In-memory shape of one `(address, origin)` state row, store-crate local
/// so `qec-flow` doesn't need to depend on clickhouse row encoding — the
/// richer semantic type (with `address_type`/`is_terminal` as enums) lives
/// in `qec-flow` and converts at this boundary.
#[derive(Debug, Clone)]
pub struct FlowStateRow {
    pub emission_epoch: Epoch,
    pub address: Address,
    pub origin_address: Address,
    pub address_type: u8,
    pub received: u64,
    pub sent: u64,
    pub hop_level: u32,
    pub is_terminal: bool,
    pub is_complete: bool,
}

#[derive(Debug, Clone)]
pub struct FlowHopInsert {
    pub emission_epoch: Epoch,
    pub current_epoch: Epoch,
    pub tick_number: TickNumber,
    pub log_id: u64,
    pub tx_hash: String,
    pub source: Address,
    pub dest: Address,
    pub amount: u64,
    pub origin_address: Address,
    pub hop_level: u32,
    pub dest_type: u8,
    pub dest_label: String,
}

/// Selects the latest row per `(address, origin_address)` key within an
/// emission epoch, resolving `flow_tracking_state`'s append-only history to
/// current state (see the `updated_at_ms` doc comment on
/// [`crate::schema::FlowTrackingStateRow`]).
const LATEST_STATE_PER_KEY: &str = "\
    SELECT address, origin_address, \
       argMax(address_type, updated_at_ms) AS address_type, \
       argMax(received, updated_at_ms) AS received, \
       argMax(sent, updated_at_ms) AS sent, \
       argMax(hop_level, updated_at_ms) AS hop_level, \
       argMax(is_terminal, updated_at_ms) AS is_terminal, \
       argMax(is_complete, updated_at_ms) AS is_complete \
    FROM flow_tracking_state WHERE emission_epoch = ? \
    GROUP BY address, origin_address";

#[derive(Debug, clickhouse::Row, serde::Deserialize)]
struct LatestStateRow {
    address: String,
    origin_address: String,
    address_type: u8,
    received: u64,
    sent: u64,
    hop_level: u32,
    is_terminal: bool,
    is_complete: bool,
}

impl Store {
    /// All not-yet-complete flow state rows for an emission epoch (spec
    /// §4.6 per-window pass step 1).
    pub async fn load_pending_flow_state(
        &self,
        emission_epoch: Epoch,
    ) -> Result<Vec<FlowStateRow>, StoreError> {
        let sql = format!("{LATEST_STATE_PER_KEY} HAVING NOT argMax(is_complete, updated_at_ms)");
        let rows: Vec<LatestStateRow> = self.client.query(&sql).bind(emission_epoch.0).fetch_all().await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                Some(FlowStateRow {
                    emission_epoch,
                    address: r.address.parse().ok()?,
                    origin_address: r.origin_address.parse().ok()?,
                    address_type: r.address_type,
                    received: r.received,
                    sent: r.sent,
                    hop_level: r.hop_level,
                    is_terminal: r.is_terminal,
                    is_complete: r.is_complete,
                })
            })
            .collect())
    }

    /// Appends one new version row per updated state entry. Never mutates
    /// existing rows in place — reads resolve the latest version via
    /// [`Self::load_pending_flow_state`]'s `argMax` query.
    pub async fn upsert_flow_state(&self, rows: &[FlowStateRow]) -> Result<(), StoreError> {
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let encoded: Vec<FlowTrackingStateRow> = rows
            .iter()
            .map(|r| FlowTrackingStateRow {
                emission_epoch: r.emission_epoch.0,
                address: r.address.as_str().to_string(),
                origin_address: r.origin_address.as_str().to_string(),
                address_type: r.address_type,
                received: r.received,
                sent: r.sent,
                hop_level: r.hop_level,
                is_terminal: r.is_terminal,
                is_complete: r.is_complete,
                updated_at_ms: now_ms,
            })
            .collect();
        self.insert_batched("flow_tracking_state", &encoded).await
    }

    /// Whether any state row has ever been written for this emission epoch
    /// (spec §4.6 "Initialisation (per E, once)").
    pub async fn flow_state_exists(&self, emission_epoch: Epoch) -> Result<bool, StoreError> {
        let count: Vec<u64> = self
            .client
            .query("SELECT count() FROM flow_tracking_state WHERE emission_epoch = ?")
            .bind(emission_epoch.0)
            .fetch_all()
            .await?;
        Ok(count.into_iter().next().unwrap_or(0) > 0)
    }

    /// Every emission epoch with at least one not-yet-complete state row,
    /// i.e. still being actively tracked across windows.
    pub async fn emission_epochs_with_pending_state(&self) -> Result<Vec<Epoch>, StoreError> {
        let sql = "\
            SELECT DISTINCT emission_epoch FROM ( \
              SELECT emission_epoch, address, origin_address, \
                 argMax(is_complete, updated_at_ms) AS is_complete \
              FROM flow_tracking_state \
              GROUP BY emission_epoch, address, origin_address \
            ) WHERE NOT is_complete";
        let rows: Vec<u32> = self.client.query(sql).fetch_all().await?;
        Ok(rows.into_iter().map(Epoch).collect())
    }

    /// High-water mark of ticks already processed for an emission epoch's
    /// per-window pass (spec §4.6 "continuous across windows").
    pub async fn flow_progress_tick(&self, emission_epoch: Epoch) -> Result<Option<TickNumber>, StoreError> {
        let rows: Vec<u64> = self
            .client
            .query("SELECT max(last_tick) FROM flow_progress WHERE emission_epoch = ?")
            .bind(emission_epoch.0)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().next().filter(|t| *t > 0).map(TickNumber))
    }

    pub async fn record_flow_progress(
        &self,
        emission_epoch: Epoch,
        last_tick: TickNumber,
    ) -> Result<(), StoreError> {
        #[derive(serde::Serialize, clickhouse::Row)]
        struct Row {
            emission_epoch: u32,
            last_tick: u64,
        }
        let row = Row {
            emission_epoch: emission_epoch.0,
            last_tick: last_tick.0,
        };
        self.insert_batched("flow_progress", std::slice::from_ref(&row)).await
    }

    pub async fn bulk_insert_flow_hops(&self, hops: &[FlowHopInsert]) -> Result<(), StoreError> {
        let rows: Vec<FlowHopRow> = hops
            .iter()
            .map(|h| FlowHopRow {
                emission_epoch: h.emission_epoch.0,
                current_epoch: h.current_epoch.0,
                tick_number: h.tick_number.0,
                log_id: h.log_id,
                tx_hash: h.tx_hash.clone(),
                source: h.source.as_str().to_string(),
                dest: h.dest.as_str().to_string(),
                amount: h.amount,
                origin_address: h.origin_address.as_str().to_string(),
                hop_level: h.hop_level,
                dest_type: h.dest_type,
                dest_label: h.dest_label.clone(),
            })
            .collect();
        self.insert_batched("flow_hops", &rows).await
    }

    /// All outbound QU-transfer-shaped logs from any address in `sources`
    /// within `[tick_start, tick_end]`, sorted strictly by `(tick, log_id)`
    /// (spec §4.6 per-window pass step 3). `sources` is expected to be
    /// small enough (the current pending set) to pass as a literal `IN`
    /// list.
    pub async fn outbound_transfers_in_range(
        &self,
        sources: &[Address],
        tick_start: TickNumber,
        tick_end: TickNumber,
    ) -> Result<Vec<Log>, StoreError> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        let addr_list: Vec<String> = sources.iter().map(|a| a.as_str().to_string()).collect();
        let rows: Vec<crate::schema::LogRow> = self
            .client
            .query(
                "SELECT ?fields FROM logs WHERE tick_number BETWEEN ? AND ? \
                 AND has_source AND source IN ? AND log_type IN (0, 8, 9) \
                 ORDER BY tick_number, log_id",
            )
            .bind(tick_start.0)
            .bind(tick_end.0)
            .bind(addr_list)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().map(crate::schema::LogRow::into_log).collect())
    }

    /// Builds the multicast output map `tick -> [(dest, amount)]` for the
    /// pass-through contract `Q` (spec §4.6 per-window pass step 2).
    pub async fn multicast_outputs_in_range(
        &self,
        multicast_contract: &Address,
        tick_start: TickNumber,
        tick_end: TickNumber,
    ) -> Result<HashMap<TickNumber, Vec<(Address, u64)>>, StoreError> {
        let logs = self
            .outbound_transfers_in_range(std::slice::from_ref(multicast_contract), tick_start, tick_end)
            .await?;
        let mut map: HashMap<TickNumber, Vec<(Address, u64)>> = HashMap::new();
        for log in logs {
            if !matches!(log.log_type, LogType::QuTransfer) {
                continue;
            }
            if let Some(dest) = log.dest {
                map.entry(log.tick_number).or_default().push((dest, log.amount));
            }
        }
        Ok(map)
    }

    /// Every flow-hop row ever written for an emission epoch, across all
    /// windows (spec §4.6 "Visualisation build": "Given flow-hop rows for
    /// an emission epoch (all windows)").
    pub async fn all_flow_hops(&self, emission_epoch: Epoch) -> Result<Vec<FlowHopInsert>, StoreError> {
        let rows: Vec<FlowHopRow> = self
            .client
            .query("SELECT ?fields FROM flow_hops WHERE emission_epoch = ? ORDER BY tick_number, log_id")
            .bind(emission_epoch.0)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().filter_map(flow_hop_row_into_insert).collect())
    }

    /// `sum(received)` across only the computor-typed state entries for an
    /// emission epoch — i.e. `Σ state(computor, E).received`, checked
    /// against the captured emission summary by the conservation validator
    /// (spec §4.6 invariants, §8 "Flow conservation").
    pub async fn computor_received_total(&self, emission_epoch: Epoch) -> Result<u64, StoreError> {
        let sql = "\
            SELECT sum(received) FROM ( \
              SELECT address, origin_address, argMax(received, updated_at_ms) AS received, \
                 argMax(address_type, updated_at_ms) AS address_type \
              FROM flow_tracking_state WHERE emission_epoch = ? \
              GROUP BY address, origin_address \
            ) WHERE address_type = 0";
        let rows: Vec<u64> = self.client.query(sql).bind(emission_epoch.0).fetch_all().await?;
        Ok(rows.into_iter().next().unwrap_or(0))
    }

    /// `(received, sent)` totals grouped by `hop_level`, resolved to the
    /// latest version per `(address, origin_address)` key — used by the
    /// conservation validator's per-level check (spec §4.6 invariants:
    /// "For any level ℓ: Σ received = Σ sent + Σ pending").
    pub async fn hop_level_totals(&self, emission_epoch: Epoch) -> Result<Vec<(u32, u64, u64)>, StoreError> {
        let sql = "\
            SELECT hop_level, sum(received), sum(sent) FROM ( \
              SELECT address, origin_address, \
                 argMax(hop_level, updated_at_ms) AS hop_level, \
                 argMax(received, updated_at_ms) AS received, \
                 argMax(sent, updated_at_ms) AS sent \
              FROM flow_tracking_state WHERE emission_epoch = ? \
              GROUP BY address, origin_address \
            ) GROUP BY hop_level ORDER BY hop_level";
        self.client.query(sql).bind(emission_epoch.0).fetch_all().await.map_err(StoreError::from)
    }

    /// Count of flow-hop rows that reference `address` as either source or
    /// destination — used to check pass-through invisibility for the
    /// multicast contract (spec §8: "No flow-hop row has source = Q or
    /// dest = Q").
    pub async fn flow_hops_touching(&self, emission_epoch: Epoch, address: &Address) -> Result<u64, StoreError> {
        let rows: Vec<u64> = self
            .client
            .query(
                "SELECT count() FROM flow_hops WHERE emission_epoch = ? \
                 AND (source = ? OR dest = ?)",
            )
            .bind(emission_epoch.0)
            .bind(address.as_str())
            .bind(address.as_str())
            .fetch_all()
            .await?;
        Ok(rows.into_iter().next().unwrap_or(0))
    }
}

fn flow_hop_row_into_insert(row: FlowHopRow) -> Option<FlowHopInsert> {
    Some(FlowHopInsert {
        emission_epoch: Epoch(row.emission_epoch),
        current_epoch: Epoch(row.current_epoch),
        tick_number: TickNumber(row.tick_number),
        log_id: row.log_id,
        tx_hash: row.tx_hash,
        source: row.source.parse().ok()?,
        dest: row.dest.parse().ok()?,
        amount: row.amount,
        origin_address: row.origin_address.parse().ok()?,
        hop_level: row.hop_level,
        dest_type: row.dest_type,
        dest_label: row.dest_label,
    })
}

use std::collections::HashMap;

use qec_primitives::{Address, Epoch, TickNumber};

use crate::error::StoreError;
use crate::schema::{BurnStatsRow, HolderDistributionRow, MinerFlowStatsRow, NetworkStatsRow};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Holder,
    Network,
    Burn,
    MinerFlow,
}

impl SnapshotKind {
    fn table(self) -> &'static str {
        match self {
            SnapshotKind::Holder => "holder_distribution_history",
            SnapshotKind::Network => "network_stats_history",
            SnapshotKind::Burn => "burn_stats_history",
            SnapshotKind::MinerFlow => "miner_flow_stats",
        }
    }
}

/// Raw aggregates backing the network-stats row; `exchange_addresses` comes
/// from the label registry (external to the store), so the net-flow sum is
/// computed here given that address list rather than via a store-side join
/// against label data the store doesn't own.
#[derive(Debug, Clone, Default)]
pub struct NetworkAggregates {
    pub tx_count: u64,
    pub total_volume: u64,
    pub unique_senders: u64,
    pub unique_receivers: u64,
    pub sc_call_count: u64,
    pub exchange_net_flow: i64,
}

#[derive(Debug, Clone, Default)]
pub struct BurnAggregates {
    pub total_burned: u64,
    pub unique_burners: u64,
    pub largest_burn: u64,
}

impl Store {
    /// `max(tick_end)` across snapshot rows for `kind` (spec §4.5 step 1).
    pub async fn max_tick_end_for_kind(&self, kind: SnapshotKind) -> Result<TickNumber, StoreError> {
        let sql = format!("SELECT max(tick_end) FROM {}", kind.table());
        let rows: Vec<u64> = self.client.query(&sql).fetch_all().await?;
        Ok(TickNumber(rows.into_iter().next().unwrap_or(0)))
    }

    /// Base balance from the most recent spectrum snapshot at or before
    /// `tick_end`, if one exists (spec §4.5 holder distribution semantics).
    pub async fn latest_spectrum_snapshot_tick(
        &self,
        tick_end: TickNumber,
    ) -> Result<Option<TickNumber>, StoreError> {
        let rows: Vec<u64> = self
            .client
            .query(
                "SELECT tick_number FROM spectrum_imports WHERE tick_number <= ? \
                 ORDER BY tick_number DESC LIMIT 1",
            )
            .bind(tick_end.0)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().next().map(TickNumber))
    }

    pub async fn spectrum_balances_as_of(
        &self,
        snapshot_tick: TickNumber,
    ) -> Result<HashMap<Address, i64>, StoreError> {
        let rows: Vec<(String, i64)> = self
            .client
            .query(
                "SELECT address, sum(incoming_amount) - sum(outgoing_amount) AS balance \
                 FROM balance_snapshots bs JOIN epoch_meta em USING epoch \
                 WHERE em.initial_tick = ? GROUP BY address",
            )
            .bind(snapshot_tick.0)
            .fetch_all()
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(addr, bal)| addr.parse().ok().map(|a| (a, bal)))
            .collect())
    }

    /// Transfer deltas (`log_type = 0`) applied on top of a base balance
    /// map, for ticks strictly after `since` up to and including `tick_end`.
    pub async fn transfer_deltas_in_range(
        &self,
        since: TickNumber,
        tick_end: TickNumber,
    ) -> Result<HashMap<Address, i64>, StoreError> {
        let incoming: Vec<(String, i64)> = self
            .client
            .query(
                "SELECT dest, sum(amount) FROM logs WHERE log_type = 0 AND has_dest \
                 AND tick_number > ? AND tick_number <= ? GROUP BY dest",
            )
            .bind(since.0)
            .bind(tick_end.0)
            .fetch_all()
            .await?;
        let outgoing: Vec<(String, i64)> = self
            .client
            .query(
                "SELECT source, sum(amount) FROM logs WHERE log_type = 0 AND has_source \
                 AND tick_number > ? AND tick_number <= ? GROUP BY source",
            )
            .bind(since.0)
            .bind(tick_end.0)
            .fetch_all()
            .await?;

        let mut deltas: HashMap<Address, i64> = HashMap::new();
        for (addr, amount) in incoming {
            if let Ok(a) = addr.parse() {
                *deltas.entry(a).or_insert(0) += amount;
            }
        }
        for (addr, amount) in outgoing {
            if let Ok(a) = addr.parse() {
                *deltas.entry(a).or_insert(0) -= amount;
            }
        }
        Ok(deltas)
    }

    pub async fn insert_holder_snapshot(&self, row: &HolderDistributionRow) -> Result<(), StoreError> {
        self.insert_batched("holder_distribution_history", std::slice::from_ref(row)).await
    }

    pub async fn insert_network_snapshot(&self, row: &NetworkStatsRow) -> Result<(), StoreError> {
        self.insert_batched("network_stats_history", std::slice::from_ref(row)).await
    }

    pub async fn insert_burn_snapshot(&self, row: &BurnStatsRow) -> Result<(), StoreError> {
        self.insert_batched("burn_stats_history", std::slice::from_ref(row)).await
    }

    pub async fn insert_miner_flow_snapshot(&self, row: &MinerFlowStatsRow) -> Result<(), StoreError> {
        self.insert_batched("miner_flow_stats", std::slice::from_ref(row)).await
    }

    pub async fn network_aggregates(
        &self,
        tick_start: TickNumber,
        tick_end: TickNumber,
        exchange_addresses: &[Address],
    ) -> Result<NetworkAggregates, StoreError> {
        let rows: Vec<(u64, u64, u64, u64)> = self
            .client
            .query(
                "SELECT count(), sum(amount), uniqExact(from), uniqExact(to) \
                 FROM transactions WHERE tick_number BETWEEN ? AND ?",
            )
            .bind(tick_start.0)
            .bind(tick_end.0)
            .fetch_all()
            .await?;
        let (tx_count, total_volume, unique_senders, unique_receivers) =
            rows.into_iter().next().unwrap_or((0, 0, 0, 0));

        let sc_call_count: Vec<u64> = self
            .client
            .query(
                "SELECT count() FROM logs WHERE tick_number BETWEEN ? AND ? \
                 AND log_type = 255",
            )
            .bind(tick_start.0)
            .bind(tick_end.0)
            .fetch_all()
            .await?;

        let mut exchange_net_flow: i64 = 0;
        if !exchange_addresses.is_empty() {
            let addr_list: Vec<String> =
                exchange_addresses.iter().map(|a| a.as_str().to_string()).collect();
            let inflow: Vec<i64> = self
                .client
                .query(
                    "SELECT sum(amount) FROM logs WHERE log_type = 0 AND has_dest AND dest IN ? \
                     AND tick_number BETWEEN ? AND ?",
                )
                .bind(&addr_list)
                .bind(tick_start.0)
                .bind(tick_end.0)
                .fetch_all()
                .await?;
            let outflow: Vec<i64> = self
                .client
                .query(
                    "SELECT sum(amount) FROM logs WHERE log_type = 0 AND has_source AND source IN ? \
                     AND tick_number BETWEEN ? AND ?",
                )
                .bind(addr_list)
                .bind(tick_start.0)
                .bind(tick_end.0)
                .fetch_all()
                .await?;
            exchange_net_flow = inflow.into_iter().next().unwrap_or(0)
                - outflow.into_iter().next().unwrap_or(0);
        }

        Ok(NetworkAggregates {
            tx_count,
            total_volume,
            unique_senders,
            unique_receivers,
            sc_call_count: sc_call_count.into_iter().next().unwrap_or(0),
            exchange_net_flow,
        })
    }

    pub async fn burn_aggregates(
        &self,
        tick_start: TickNumber,
        tick_end: TickNumber,
        burn_address: &Address,
    ) -> Result<BurnAggregates, StoreError> {
        let rows: Vec<(u64, u64, u64)> = self
            .client
            .query(
                "SELECT sum(amount), uniqExact(source), max(amount) FROM logs \
                 WHERE tick_number BETWEEN ? AND ? \
                 AND (log_type IN (8, 9) OR (log_type = 0 AND has_dest AND dest = ?))",
            )
            .bind(tick_start.0)
            .bind(tick_end.0)
            .bind(burn_address.as_str())
            .fetch_all()
            .await?;
        let (total_burned, unique_burners, largest_burn) = rows.into_iter().next().unwrap_or((0, 0, 0));
        Ok(BurnAggregates {
            total_burned,
            unique_burners,
            largest_burn,
        })
    }

    pub async fn cumulative_burned_before(&self, tick_end: TickNumber) -> Result<u64, StoreError> {
        let rows: Vec<u64> = self
            .client
            .query("SELECT max(cumulative_total) FROM burn_stats_history WHERE tick_end <= ?")
            .bind(tick_end.0)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().next().unwrap_or(0))
    }

    /// Aggregate snapshot of flow-tracking state for an emission epoch, as
    /// of whatever point the flow tracker has processed up to — used by
    /// the miner-flow-stats snapshot kind (spec §4.5).
    /// Totals across the *latest* version of every `(address,
    /// origin_address)` key (the table is append-only history, see
    /// [`crate::schema::FlowTrackingStateRow`]'s `updated_at_ms` doc).
    pub async fn flow_state_totals(
        &self,
        emission_epoch: Epoch,
    ) -> Result<(u64, u64, u64), StoreError> {
        let sql = "\
            SELECT sum(received), sum(sent), sum(received) - sum(sent) FROM ( \
              SELECT address, origin_address, \
                 argMax(received, updated_at_ms) AS received, \
                 argMax(sent, updated_at_ms) AS sent \
              FROM flow_tracking_state WHERE emission_epoch = ? \
              GROUP BY address, origin_address \
            )";
        let rows: Vec<(u64, u64, u64)> = self.client.query(sql).bind(emission_epoch.0).fetch_all().await?;
        Ok(rows.into_iter().next().unwrap_or((0, 0, 0)))
    }

    pub async fn flow_terminal_amounts(
        &self,
        emission_epoch: Epoch,
        tick_start: TickNumber,
        tick_end: TickNumber,
    ) -> Result<(u64, u64), StoreError> {
        let rows: Vec<(u64, u64)> = self
            .client
            .query(
                "SELECT sumIf(amount, dest_type = 2), sumIf(amount, dest_type = 3) \
                 FROM flow_hops WHERE emission_epoch = ? AND tick_number BETWEEN ? AND ?",
            )
            .bind(emission_epoch.0)
            .bind(tick_start.0)
            .bind(tick_end.0)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().next().unwrap_or((0, 0)))
    }

    /// "Additional inflow" to computors (spec §9): the net of non-emission
    /// QU transfers landing on and leaving computor addresses during the
    /// window, as distinct from the emission-origin amounts `flow_state_totals`
    /// already tracks. `burn_address` is excluded from inflow so a computor's
    /// own emission capture (sourced from the burn address, in the prior
    /// epoch's tick range) is never double-counted here.
    pub async fn computor_net_position(
        &self,
        computors: &[Address],
        burn_address: &Address,
        tick_start: TickNumber,
        tick_end: TickNumber,
    ) -> Result<i64, StoreError> {
        if computors.is_empty() {
            return Ok(0);
        }
        let computor_list: Vec<String> = computors.iter().map(|a| a.as_str().to_string()).collect();
        let rows: Vec<(u64, u64)> = self
            .client
            .query(
                "SELECT \
                   sumIf(amount, has_dest AND dest IN ? AND NOT (has_source AND source = ?)), \
                   sumIf(amount, has_source AND source IN ?) \
                 FROM logs \
                 WHERE log_type = 0 AND tick_number BETWEEN ? AND ?",
            )
            .bind(computor_list.clone())
            .bind(burn_address.as_str())
            .bind(computor_list)
            .bind(tick_start.0)
            .bind(tick_end.0)
            .fetch_all()
            .await?;
        let (inflow, outflow) = rows.into_iter().next().unwrap_or((0, 0));
        Ok(inflow as i64 - outflow as i64)
    }
}

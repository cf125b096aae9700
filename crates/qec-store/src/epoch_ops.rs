use qec_primitives::{
    Address, ComputorEmission, ComputorList, Epoch, EmissionSummary, EpochMeta, LogId, TickNumber,
};

use crate::error::StoreError;
use crate::schema::{ComputorEmissionRow, ComputorRow, EmissionSummaryRow, EpochMetaRow};
use crate::store::Store;

impl Store {
    /// `max(tick.epoch)` across the ticks table (spec §4.3 meta sync
    /// worker trigger condition).
    pub async fn max_tick_epoch(&self) -> Result<Option<Epoch>, StoreError> {
        let rows: Vec<u32> = self
            .client
            .query("SELECT max(epoch) FROM ticks")
            .fetch_all()
            .await?;
        Ok(rows.into_iter().next().filter(|e| *e > 0).map(Epoch))
    }

    pub async fn get_epoch_meta(&self, epoch: Epoch) -> Result<Option<EpochMeta>, StoreError> {
        let rows: Vec<EpochMetaRow> = self
            .client
            .query("SELECT ?fields FROM epoch_meta WHERE epoch = ? LIMIT 1")
            .bind(epoch.0)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().next().map(row_to_epoch_meta))
    }

    /// Upserts `epoch_meta`, deriving `is_complete` the way the meta-sync
    /// worker does (spec §4.3: `is_complete = (end_tick > initial_tick &&
    /// end_tick > 0)`).
    pub async fn upsert_epoch_meta(&self, meta: &EpochMeta) -> Result<(), StoreError> {
        let row = EpochMetaRow {
            epoch: meta.epoch.0,
            initial_tick: meta.initial_tick.0,
            end_tick: meta.end_tick.0,
            end_tick_start_log_id: meta.end_tick_start_log_id.0,
            end_tick_end_log_id: meta.end_tick_end_log_id.0,
            is_complete: meta.derive_is_complete(),
            final_stats: meta
                .final_stats
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default(),
        };
        self.insert_batched("epoch_meta", std::slice::from_ref(&row)).await
    }

    /// `max(log_id) WHERE epoch = E` (spec §4.3 step 2).
    pub async fn max_log_id_for_epoch(&self, epoch: Epoch) -> Result<Option<LogId>, StoreError> {
        let rows: Vec<u64> = self
            .client
            .query("SELECT max(log_id) FROM logs WHERE epoch = ?")
            .bind(epoch.0)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().next().map(LogId))
    }

    /// Whether any log in `[start, end]` is an END_EPOCH marker (spec §4.3
    /// step 5).
    pub async fn has_end_epoch_marker(
        &self,
        epoch: Epoch,
        start: LogId,
        end: LogId,
    ) -> Result<bool, StoreError> {
        let count: Vec<u64> = self
            .client
            .query(
                "SELECT count() FROM logs WHERE epoch = ? AND log_id BETWEEN ? AND ? \
                 AND log_type = 255 AND custom_message_opcode = 1 AND has_custom_message_opcode",
            )
            .bind(epoch.0)
            .bind(start.0)
            .bind(end.0)
            .fetch_all()
            .await?;
        Ok(count.into_iter().next().unwrap_or(0) > 0)
    }

    pub async fn insert_computors(&self, list: &ComputorList) -> Result<(), StoreError> {
        let rows: Vec<ComputorRow> = list
            .addresses
            .iter()
            .enumerate()
            .map(|(index, addr)| ComputorRow {
                epoch: list.epoch.0,
                index: index as u16,
                address: addr.as_str().to_string(),
            })
            .collect();
        self.insert_batched("computors", &rows).await
    }

    pub async fn computors_imported(&self, epoch: Epoch) -> Result<bool, StoreError> {
        let count: Vec<u64> = self
            .client
            .query("SELECT count() FROM computors WHERE epoch = ?")
            .bind(epoch.0)
            .fetch_all()
            .await?;
        Ok(count.into_iter().next().unwrap_or(0) > 0)
    }

    pub async fn get_computors(&self, epoch: Epoch) -> Result<Vec<Address>, StoreError> {
        let rows: Vec<ComputorRow> = self
            .client
            .query("SELECT ?fields FROM computors WHERE epoch = ? ORDER BY index")
            .bind(epoch.0)
            .fetch_all()
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.address.parse().ok())
            .collect())
    }

    /// Emission capture aggregation (spec §4.3): `sum(amount)` grouped by
    /// `dest` for burn-sourced transfers landing on a computor at
    /// `end_tick`. `computors` restricts `dest` to epoch `E`'s 676
    /// addresses (spec: "`dest ∈ computors(E)`") so a burn-sourced transfer
    /// to some other address at `end_tick` is never miscounted as emission.
    pub async fn sum_emission_by_computor(
        &self,
        epoch: Epoch,
        end_tick: TickNumber,
        burn_address: &Address,
        computors: &[Address],
    ) -> Result<Vec<ComputorEmission>, StoreError> {
        if computors.is_empty() {
            return Ok(Vec::new());
        }
        let computor_list: Vec<String> = computors.iter().map(|a| a.as_str().to_string()).collect();
        let rows: Vec<ComputorEmissionRow> = self
            .client
            .query(
                "SELECT epoch, dest AS address, sum(amount) AS amount, max(timestamp_ms) AS timestamp_ms \
                 FROM logs \
                 WHERE epoch = ? AND log_type = 0 AND tick_number = ? AND source = ? \
                 AND has_dest AND dest IN ? \
                 GROUP BY epoch, dest",
            )
            .bind(epoch.0)
            .bind(end_tick.0)
            .bind(burn_address.as_str())
            .bind(computor_list)
            .fetch_all()
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                r.address.parse().ok().map(|address| ComputorEmission {
                    epoch: Epoch(r.epoch),
                    address,
                    amount: r.amount,
                    timestamp_ms: r.timestamp_ms,
                })
            })
            .collect())
    }

    /// Per-computor emission amounts captured for an epoch (spec §4.6
    /// "Initialisation (per E, once)"). Drives the flow tracker's initial
    /// state rows.
    pub async fn get_computor_emissions(&self, epoch: Epoch) -> Result<Vec<ComputorEmission>, StoreError> {
        let rows: Vec<ComputorEmissionRow> = self
            .client
            .query("SELECT ?fields FROM computor_emissions WHERE epoch = ?")
            .bind(epoch.0)
            .fetch_all()
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                r.address.parse().ok().map(|address| ComputorEmission {
                    epoch: Epoch(r.epoch),
                    address,
                    amount: r.amount,
                    timestamp_ms: r.timestamp_ms,
                })
            })
            .collect())
    }

    pub async fn insert_computor_emissions(
        &self,
        emissions: &[ComputorEmission],
    ) -> Result<(), StoreError> {
        let rows: Vec<ComputorEmissionRow> = emissions
            .iter()
            .map(|e| ComputorEmissionRow {
                epoch: e.epoch.0,
                address: e.address.as_str().to_string(),
                amount: e.amount,
                timestamp_ms: e.timestamp_ms,
            })
            .collect();
        self.insert_batched("computor_emissions", &rows).await
    }

    /// Idempotency guard: `emission_imports` row existing means capture
    /// already ran for this epoch (spec §4.3: "idempotent-guarded").
    pub async fn emission_import_exists(&self, epoch: Epoch) -> Result<bool, StoreError> {
        let count: Vec<u64> = self
            .client
            .query("SELECT count() FROM emission_imports WHERE epoch = ?")
            .bind(epoch.0)
            .fetch_all()
            .await?;
        Ok(count.into_iter().next().unwrap_or(0) > 0)
    }

    pub async fn insert_emission_import_marker(
        &self,
        epoch: Epoch,
        computor_count: u32,
        total_emission: u64,
        emission_tick: TickNumber,
    ) -> Result<(), StoreError> {
        let row = EmissionSummaryRow {
            epoch: epoch.0,
            computor_count,
            total_emission,
            emission_tick: emission_tick.0,
        };
        self.insert_batched("emission_imports", std::slice::from_ref(&row)).await
    }

    /// The summary row captured for an epoch's emission, if any — the
    /// conservation validator's source of truth for `total_emission(E)`
    /// (spec §4.6 invariants, §8 "Flow conservation").
    pub async fn get_emission_summary(&self, epoch: Epoch) -> Result<Option<EmissionSummary>, StoreError> {
        let rows: Vec<EmissionSummaryRow> = self
            .client
            .query("SELECT ?fields FROM emission_imports WHERE epoch = ? LIMIT 1")
            .bind(epoch.0)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().next().map(|r| EmissionSummary {
            epoch: Epoch(r.epoch),
            computor_count: r.computor_count,
            total_emission: r.total_emission,
            emission_tick: TickNumber(r.emission_tick),
        }))
    }
}

fn row_to_epoch_meta(row: EpochMetaRow) -> EpochMeta {
    EpochMeta {
        epoch: Epoch(row.epoch),
        initial_tick: TickNumber(row.initial_tick),
        end_tick: TickNumber(row.end_tick),
        end_tick_start_log_id: LogId(row.end_tick_start_log_id),
        end_tick_end_log_id: LogId(row.end_tick_end_log_id),
        is_complete: row.is_complete,
        final_stats: if row.final_stats.is_empty() {
            None
        } else {
            serde_json::from_str(&row.final_stats).ok()
        },
    }
}

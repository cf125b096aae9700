use qec_primitives::{
    AssetSnapshot, BalanceSnapshot, Epoch, SpectrumImportMarker, TickNumber, UniverseImportMarker,
};

use crate::error::StoreError;
use crate::schema::{record_type_code, AssetSnapshotRow, BalanceSnapshotRow};
use crate::store::Store;

impl Store {
    pub async fn delete_balance_snapshots(&self, epoch: Epoch) -> Result<(), StoreError> {
        self.client
            .query("ALTER TABLE balance_snapshots DELETE WHERE epoch = ?")
            .bind(epoch.0)
            .execute()
            .await?;
        Ok(())
    }

    pub async fn bulk_insert_balance_snapshots(
        &self,
        snapshots: &[BalanceSnapshot],
    ) -> Result<(), StoreError> {
        let rows: Vec<BalanceSnapshotRow> = snapshots
            .iter()
            .map(|s| BalanceSnapshotRow {
                epoch: s.epoch.0,
                address: s.address.as_str().to_string(),
                incoming_amount: s.incoming_amount,
                outgoing_amount: s.outgoing_amount,
                num_incoming: s.num_incoming,
                num_outgoing: s.num_outgoing,
                latest_incoming_tick: s.latest_incoming_tick.0,
                latest_outgoing_tick: s.latest_outgoing_tick.0,
            })
            .collect();
        self.insert_batched("balance_snapshots", &rows).await
    }

    pub async fn insert_spectrum_import_marker(
        &self,
        marker: &SpectrumImportMarker,
    ) -> Result<(), StoreError> {
        #[derive(serde::Serialize, clickhouse::Row)]
        struct Row {
            epoch: u32,
            tick_number: u64,
            record_count: u64,
            file_size_bytes: u64,
            duration_ms: u64,
        }
        let row = Row {
            epoch: marker.epoch.0,
            tick_number: marker.tick_number.0,
            record_count: marker.record_count,
            file_size_bytes: marker.file_size_bytes,
            duration_ms: marker.duration_ms,
        };
        self.insert_batched("spectrum_imports", std::slice::from_ref(&row)).await
    }

    pub async fn spectrum_imported(&self, epoch: Epoch) -> Result<bool, StoreError> {
        self.table_has_epoch("spectrum_imports", epoch).await
    }

    pub async fn delete_asset_snapshots(&self, epoch: Epoch) -> Result<(), StoreError> {
        self.client
            .query("ALTER TABLE asset_snapshots DELETE WHERE epoch = ?")
            .bind(epoch.0)
            .execute()
            .await?;
        Ok(())
    }

    pub async fn bulk_insert_asset_snapshots(
        &self,
        snapshots: &[AssetSnapshot],
    ) -> Result<(), StoreError> {
        let rows: Vec<AssetSnapshotRow> = snapshots
            .iter()
            .map(|s| AssetSnapshotRow {
                epoch: s.epoch.0,
                record_type: record_type_code(s.record_type),
                issuer: s.issuer.as_str().to_string(),
                asset_name: s.asset_name.clone(),
                number_of_decimal_places: s.number_of_decimal_places,
                holder: s.holder.as_str().to_string(),
                managing_contract_index: s.managing_contract_index.unwrap_or(0),
                has_managing_contract_index: s.managing_contract_index.is_some(),
                number_of_shares: s.number_of_shares,
            })
            .collect();
        self.insert_batched("asset_snapshots", &rows).await
    }

    pub async fn insert_universe_import_marker(
        &self,
        marker: &UniverseImportMarker,
    ) -> Result<(), StoreError> {
        #[derive(serde::Serialize, clickhouse::Row)]
        struct Row {
            epoch: u32,
            tick_number: u64,
            issuance_count: u64,
            ownership_count: u64,
            possession_count: u64,
            file_size_bytes: u64,
            duration_ms: u64,
        }
        let row = Row {
            epoch: marker.epoch.0,
            tick_number: marker.tick_number.0,
            issuance_count: marker.issuance_count,
            ownership_count: marker.ownership_count,
            possession_count: marker.possession_count,
            file_size_bytes: marker.file_size_bytes,
            duration_ms: marker.duration_ms,
        };
        self.insert_batched("universe_imports", std::slice::from_ref(&row)).await
    }

    pub async fn universe_imported(&self, epoch: Epoch) -> Result<bool, StoreError> {
        self.table_has_epoch("universe_imports", epoch).await
    }

    /// The last `limit` completed epochs, used by the auto-import driver
    /// (spec §4.4: "looks at the last 10 completed epochs").
    pub async fn recently_completed_epochs(&self, limit: u32) -> Result<Vec<Epoch>, StoreError> {
        let rows: Vec<u32> = self
            .client
            .query(
                "SELECT epoch FROM epoch_meta WHERE is_complete ORDER BY epoch DESC LIMIT ?",
            )
            .bind(limit)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().map(Epoch).collect())
    }

    async fn table_has_epoch(&self, table: &str, epoch: Epoch) -> Result<bool, StoreError> {
        let sql = format!("SELECT count() FROM {table} WHERE epoch = ?");
        let count: Vec<u64> = self.client.query(&sql).bind(epoch.0).fetch_all().await?;
        Ok(count.into_iter().next().unwrap_or(0) > 0)
    }

    /// Start-of-epoch tick, used to anchor the spectrum snapshot's
    /// `tick_number = initial_tick` import marker (spec §4.4 step 5).
    pub async fn epoch_initial_tick(&self, epoch: Epoch) -> Result<Option<TickNumber>, StoreError> {
        let rows: Vec<u64> = self
            .client
            .query("SELECT initial_tick FROM epoch_meta WHERE epoch = ? LIMIT 1")
            .bind(epoch.0)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().next().map(TickNumber))
    }
}

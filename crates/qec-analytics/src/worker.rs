use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qec_labels::LabelRegistry;
use qec_store::Store;
use qec_tasks::{run_periodic, PeriodicWorker, TaskManager};

use crate::burn::emit_next_burn_row;
use crate::error::AnalyticsError;
use crate::holder::emit_next_holder_row;
use crate::miner_flow::emit_next_miner_flow_row;
use crate::network::emit_next_network_row;

const PERIOD: Duration = Duration::from_secs(5 * 60);
const INITIAL_DELAY: Duration = Duration::from_secs(30);

/// Drives all four snapshot kinds every 5 minutes (spec §4.5). Each kind
/// keeps emitting rows in a tight loop until its window doesn't fit yet, so
/// a worker that's behind (first run after a long downtime) catches up in
/// one cycle instead of crawling forward one window per tick.
pub struct SnapshotterWorker {
    store: Store,
    labels: Arc<LabelRegistry>,
}

impl SnapshotterWorker {
    pub fn new(store: Store, labels: Arc<LabelRegistry>) -> Self {
        Self { store, labels }
    }

    async fn drain_holder(&self) -> Result<bool, AnalyticsError> {
        let mut did_work = false;
        while emit_next_holder_row(&self.store).await? {
            did_work = true;
        }
        Ok(did_work)
    }

    async fn drain_network(&self) -> Result<bool, AnalyticsError> {
        let mut did_work = false;
        while emit_next_network_row(&self.store, &self.labels).await? {
            did_work = true;
        }
        Ok(did_work)
    }

    async fn drain_burn(&self) -> Result<bool, AnalyticsError> {
        let mut did_work = false;
        while emit_next_burn_row(&self.store).await? {
            did_work = true;
        }
        Ok(did_work)
    }

    async fn drain_miner_flow(&self) -> Result<bool, AnalyticsError> {
        let mut did_work = false;
        while emit_next_miner_flow_row(&self.store).await? {
            did_work = true;
        }
        Ok(did_work)
    }
}

#[async_trait]
impl PeriodicWorker for SnapshotterWorker {
    type Error = AnalyticsError;

    async fn run_once(&mut self) -> Result<bool, Self::Error> {
        let holder = self.drain_holder().await?;
        let network = self.drain_network().await?;
        let burn = self.drain_burn().await?;
        let miner_flow = self.drain_miner_flow().await?;
        Ok(holder || network || burn || miner_flow)
    }

    fn name(&self) -> &str {
        "analytics-snapshotter"
    }
}

/// Spawns the analytics snapshotter onto `manager` (spec §4.5, §9).
pub fn spawn_analytics_snapshotter(manager: &mut TaskManager, store: Store, labels: Arc<LabelRegistry>) {
    let worker = SnapshotterWorker::new(store, labels);
    let shutdown = manager.executor().shutdown_signal();
    manager.spawn_critical("analytics-snapshotter", async move {
        run_periodic(worker, PERIOD, INITIAL_DELAY, shutdown).await;
    });
}

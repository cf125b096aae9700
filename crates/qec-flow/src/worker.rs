use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qec_labels::{LabelKind, LabelRegistry};
use qec_primitives::{Address, Epoch};
use qec_store::Store;
use qec_tasks::{run_periodic, PeriodicWorker, TaskManager};

use crate::error::FlowError;
use crate::init::initialize_emission_epoch;
use crate::state::ClassificationSets;
use crate::window::run_window_pass;

const PERIOD: Duration = Duration::from_secs(60);
const INITIAL_DELAY: Duration = Duration::from_secs(20);

/// Drives the continuous multi-hop flow tracker (spec §2 component G,
/// §4.6). Not given an explicit cadence by spec.md — unlike the other four
/// workers, §4.6 specifies only the per-window-pass algorithm, not a
/// scheduling period, so this mirrors the snapshotter's "wake up, do what's
/// newly possible, go back to sleep" shape at a tighter interval matching
/// the spec's emphasis on continuous, near-real-time propagation (see
/// `DESIGN.md`).
pub struct FlowTrackerWorker {
    store: Store,
    labels: Arc<LabelRegistry>,
    multicast_contract: Address,
}

impl FlowTrackerWorker {
    pub fn new(store: Store, labels: Arc<LabelRegistry>, multicast_contract: Address) -> Self {
        Self { store, labels, multicast_contract }
    }

    async fn classification_sets(&self, emission_epoch: Epoch) -> Result<ClassificationSets, FlowError> {
        let computors = self.store.get_computors(emission_epoch).await?.into_iter().collect();
        let exchanges = self.labels.by_type(LabelKind::Exchange).into_iter().map(|e| e.address).collect();
        let smart_contracts =
            self.labels.by_type(LabelKind::SmartContract).into_iter().map(|e| e.address).collect();
        Ok(ClassificationSets {
            computors,
            exchanges,
            smart_contracts,
            multicast_contract: self.multicast_contract,
        })
    }

    /// One cycle: initialise the current emission epoch if its emissions
    /// just landed, then advance every emission epoch that still has
    /// pending (not-yet-complete) state — including the current one and
    /// any older ones still being worked through (spec §4.6: "Tracking
    /// must be continuous across windows").
    async fn advance(&self) -> Result<bool, FlowError> {
        let Some(current_epoch) = self.store.max_tick_epoch().await? else {
            return Ok(false);
        };
        let mut did_work = false;

        if let Some(emission_epoch) = current_epoch.emission_epoch() {
            did_work |= initialize_emission_epoch(&self.store, emission_epoch).await?;
        }

        let Some(latest) = self.store.latest_tick().await? else {
            return Ok(did_work);
        };

        let mut epochs = self.store.emission_epochs_with_pending_state().await?;
        if let Some(emission_epoch) = current_epoch.emission_epoch() {
            if !epochs.contains(&emission_epoch) {
                epochs.push(emission_epoch);
            }
        }

        for epoch in epochs {
            let classify = self.classification_sets(epoch).await?;
            if run_window_pass(&self.store, epoch, &classify, latest.tick_number).await? {
                did_work = true;
            }
        }

        Ok(did_work)
    }
}

#[async_trait]
impl PeriodicWorker for FlowTrackerWorker {
    type Error = FlowError;

    async fn run_once(&mut self) -> Result<bool, Self::Error> {
        self.advance().await
    }

    fn name(&self) -> &str {
        "flow-tracker"
    }
}

/// Spawns the flow tracker onto `manager` (spec §4.6, §9).
pub fn spawn_flow_tracker(
    manager: &mut TaskManager,
    store: Store,
    labels: Arc<LabelRegistry>,
    multicast_contract: Address,
) {
    let worker = FlowTrackerWorker::new(store, labels, multicast_contract);
    let shutdown = manager.executor().shutdown_signal();
    manager.spawn_critical("flow-tracker", async move {
        run_periodic(worker, PERIOD, INITIAL_DELAY, shutdown).await;
    });
}

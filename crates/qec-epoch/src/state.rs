use std::sync::Arc;

use qec_primitives::Epoch;
use tokio::sync::Mutex;

/// Shared state between the meta-sync and transition-validator workers
/// (spec §4.3, §9: "shared process state ... re-architect as explicitly
/// passed dependencies"). Small enough that a plain `Mutex` (rather than
/// `arc_swap`) fits: both fields change together and are read rarely
/// relative to the label registry's per-request reads.
#[derive(Debug, Default)]
pub struct EpochManagerState {
    /// `max(tick.epoch)` as last observed by the meta-sync worker.
    pub last_observed_epoch: Option<Epoch>,
    /// Set by the meta-sync worker when it detects a rollover; the
    /// transition validator claims and clears it on its next cycle.
    pub pending_validation: Option<Epoch>,
    pub has_critical_error: bool,
    pub critical_epoch: Option<Epoch>,
}

/// Cheaply-cloneable handle shared by both workers.
#[derive(Clone)]
pub struct EpochManagerHandle {
    inner: Arc<Mutex<EpochManagerState>>,
}

impl EpochManagerHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EpochManagerState::default())),
        }
    }

    pub async fn snapshot(&self) -> EpochManagerState {
        let state = self.inner.lock().await;
        EpochManagerState {
            last_observed_epoch: state.last_observed_epoch,
            pending_validation: state.pending_validation,
            has_critical_error: state.has_critical_error,
            critical_epoch: state.critical_epoch,
        }
    }

    pub async fn set_last_observed(&self, epoch: Epoch) {
        self.inner.lock().await.last_observed_epoch = Some(epoch);
    }

    pub async fn queue_validation(&self, epoch: Epoch) {
        self.inner.lock().await.pending_validation = Some(epoch);
    }

    /// Claims and clears the pending validation target, if any.
    pub async fn take_pending_validation(&self) -> Option<Epoch> {
        self.inner.lock().await.pending_validation.take()
    }

    pub async fn latch_critical_error(&self, epoch: Epoch) {
        let mut state = self.inner.lock().await;
        state.has_critical_error = true;
        state.critical_epoch = Some(epoch);
    }

    pub async fn clear_critical_error(&self) {
        let mut state = self.inner.lock().await;
        state.has_critical_error = false;
        state.critical_epoch = None;
    }

    pub async fn is_critical(&self) -> bool {
        self.inner.lock().await.has_critical_error
    }
}

impl Default for EpochManagerHandle {
    fn default() -> Self {
        Self::new()
    }
}

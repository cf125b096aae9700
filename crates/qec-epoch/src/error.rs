use qec_primitives::Epoch;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EpochError {
    #[error("store error: {0}")]
    Store(#[from] qec_store::StoreError),
    #[error("rpc error: {0}")]
    Rpc(#[from] qec_rpc_client::RpcError),
    #[error("epoch {epoch}: end-tick log range incomplete (start or end log id is zero)")]
    IncompleteEndTickInfo { epoch: Epoch },
    #[error("epoch {epoch}: store is missing logs before end tick (have up to {have}, need at least {need})")]
    MissingLogsBeforeEndTick { epoch: Epoch, have: u64, need: u64 },
    #[error("epoch {epoch}: no END_EPOCH marker found in end-tick log range")]
    MissingEndEpochMarker { epoch: Epoch },
}

impl EpochError {
    /// Transient upstream (RPC/store) errors retry on the next cycle.
    /// The three domain variants are the "critical epoch-transition" class
    /// (spec §7): they latch `hasCriticalError` rather than being retried
    /// blindly.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            EpochError::IncompleteEndTickInfo { .. }
                | EpochError::MissingLogsBeforeEndTick { .. }
                | EpochError::MissingEndEpochMarker { .. }
        )
    }

    pub fn is_recoverable(&self) -> bool {
        !self.is_critical()
    }

    pub fn is_fatal(&self) -> bool {
        false
    }
}

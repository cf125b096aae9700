use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("store error: {0}")]
    Store(#[from] qec_store::StoreError),
}

impl FlowError {
    /// Every error here bubbles up from the store, the same transient-
    /// upstream class as the other window-tiled workers (spec §7).
    pub fn is_recoverable(&self) -> bool {
        true
    }

    pub fn is_fatal(&self) -> bool {
        false
    }
}

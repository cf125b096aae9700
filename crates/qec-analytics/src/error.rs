use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("store error: {0}")]
    Store(#[from] qec_store::StoreError),
}

impl AnalyticsError {
    /// Every error this crate can produce bubbles up from the store, a
    /// transient-upstream class (spec §7) — retried next cycle.
    pub fn is_recoverable(&self) -> bool {
        true
    }

    pub fn is_fatal(&self) -> bool {
        false
    }
}

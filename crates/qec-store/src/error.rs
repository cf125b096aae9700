use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(#[from] clickhouse::error::Error),
    #[error("row decode failed: {0}")]
    Decode(String),
}

impl StoreError {
    /// Query timeouts and connection resets are transient upstream issues
    /// (spec §7); malformed row shapes are a programmer bug and should not
    /// be retried blindly.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::Query(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Decode(_))
    }
}

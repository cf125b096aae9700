use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelsError {
    #[error("failed to download label bundle: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("failed to parse label bundle: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LabelsError {
    /// Bundle refresh failures are transient upstream (spec §7): the
    /// caller keeps serving the existing snapshot and retries next hour.
    pub fn is_recoverable(&self) -> bool {
        true
    }

    pub fn is_fatal(&self) -> bool {
        false
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("store error: {0}")]
    Store(#[from] qec_store::StoreError),
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),
    #[error("download timed out after {0:?}")]
    DownloadTimeout(std::time::Duration),
    #[error("archive has no entry named `{0}`")]
    EntryNotFound(String),
    #[error("zip archive could not be read: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("record parse failed: {0}")]
    RecordParse(String),
    #[error("blocking task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("scratch directory error: {0}")]
    Io(#[from] std::io::Error),
}

impl SnapshotError {
    /// Download timeouts and transport errors are transient upstream (spec
    /// §7); malformed archives/records are not retried blindly.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SnapshotError::Download(_) | SnapshotError::DownloadTimeout(_) | SnapshotError::Store(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SnapshotError::EntryNotFound(_) | SnapshotError::RecordParse(_) | SnapshotError::Zip(_)
        )
    }
}

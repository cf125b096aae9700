use std::io::{Read, Write};
use std::time::Duration;

use qec_primitives::Epoch;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::SnapshotError;

/// Which archive entry an importer is after (spec §4.4: "spectrum.*" or
/// "universe.*").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Spectrum,
    Universe,
}

impl ArchiveKind {
    fn entry_prefix(self) -> &'static str {
        match self {
            ArchiveKind::Spectrum => "spectrum.",
            ArchiveKind::Universe => "universe.",
        }
    }

    /// Download timeout (spec §4.4: "10 min for spectrum, 15 min for
    /// universe").
    fn timeout(self) -> Duration {
        match self {
            ArchiveKind::Spectrum => Duration::from_secs(10 * 60),
            ArchiveKind::Universe => Duration::from_secs(15 * 60),
        }
    }
}

fn archive_url(epoch: Epoch) -> String {
    format!("https://storage.qubic.li/network/{epoch}/ep{epoch}-bob.zip")
}

/// Downloads `ep{epoch}-bob.zip`, locates the `spectrum.*`/`universe.*`
/// entry inside it, and returns its raw bytes plus the archive's total file
/// size (spec §4.4 steps 1-2). The download streams to a scratch temp file
/// under the kind's dedicated timeout; the (sync) `zip` crate then reads
/// the selected entry inside `spawn_blocking`, off the async executor.
pub async fn download_archive_entry(
    http: &reqwest::Client,
    scratch_dir: &str,
    epoch: Epoch,
    kind: ArchiveKind,
) -> Result<(Vec<u8>, u64), SnapshotError> {
    std::fs::create_dir_all(scratch_dir)?;
    let url = archive_url(epoch);
    debug!(%url, ?kind, "downloading snapshot archive");

    let timeout = kind.timeout();
    let response = tokio::time::timeout(timeout, http.get(&url).send())
        .await
        .map_err(|_| SnapshotError::DownloadTimeout(timeout))??
        .error_for_status()?;

    let mut temp_file = NamedTempFile::new_in(scratch_dir)?;
    let mut body = response.bytes_stream();
    use futures::StreamExt;
    let mut file_size: u64 = 0;
    while let Some(chunk) = tokio::time::timeout(timeout, body.next())
        .await
        .map_err(|_| SnapshotError::DownloadTimeout(timeout))?
    {
        let chunk = chunk?;
        file_size += chunk.len() as u64;
        temp_file.write_all(&chunk)?;
    }
    temp_file.flush()?;

    let entry_prefix = kind.entry_prefix();
    let entry_bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, SnapshotError> {
        let file = temp_file.reopen()?;
        let mut archive = zip::ZipArchive::new(file)?;
        let name = (0..archive.len())
            .map(|i| archive.by_index(i).map(|f| f.name().to_string()))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .find(|name| name.starts_with(entry_prefix))
            .ok_or_else(|| SnapshotError::EntryNotFound(entry_prefix.to_string()))?;
        let mut entry = archive.by_name(&name)?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        Ok(buf)
    })
    .await??;

    Ok((entry_bytes, file_size))
}

use std::fs;
use std::path::Path;

use tracing::{debug, info};
use upkeep_core::{Transport, TransportError, UpdateError};

use crate::fs_utils::remove_file_if_exists;
use crate::layout::part_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// The archive was already on disk from an earlier, interrupted run.
    CacheHit,
    Downloaded { bytes: u64 },
}

/// Fetches `url` into `archive_path` through a `.part` sibling so a crash
/// mid-transfer never leaves a truncated archive under the final name.
pub fn download_archive(
    transport: &dyn Transport,
    url: &str,
    archive_path: &Path,
) -> Result<DownloadStatus, UpdateError> {
    if archive_path.exists() {
        debug!(path = %archive_path.display(), "archive already present, skipping download");
        return Ok(DownloadStatus::CacheHit);
    }

    let part = part_path(archive_path);
    let bytes = match transport.download_to(url, &part) {
        Ok(bytes) => bytes,
        Err(err) => {
            let _ = remove_file_if_exists(&part);
            return Err(UpdateError::download(err));
        }
    };

    fs::rename(&part, archive_path).map_err(|source| {
        let _ = remove_file_if_exists(&part);
        UpdateError::download(TransportError::Io {
            path: archive_path.to_path_buf(),
            source,
        })
    })?;

    info!(url, bytes, path = %archive_path.display(), "downloaded update archive");
    Ok(DownloadStatus::Downloaded { bytes })
}

//! Download capture and persistence.
//!
//! The portal's download event can fire arbitrarily soon after the trigger
//! returns, so the capture must be armed before the trigger runs — this is
//! the one sanctioned concurrency point in an otherwise strictly sequential
//! flow, and it is not generalized elsewhere.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::error::{Error, Result};
use crate::portal::PortalPage;

/// How long the armed capture waits for the download-ready signal. The
/// signal is file-completed, not download-started, so the bound covers the
/// whole transfer.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(60);

/// A portal export persisted to its final location.
#[derive(Debug, Clone)]
pub struct DownloadArtifact {
    /// Filename the environment suggested. Untrusted.
    pub suggested_filename: String,
    /// Where the artifact was written.
    pub path: PathBuf,
}

/// Races a triggering UI action against the download-ready signal.
pub struct DownloadSynchronizer {
    download_dir: PathBuf,
    timeout: Duration,
}

impl DownloadSynchronizer {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            timeout: CAPTURE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arm the download signal, perform the trigger, and await the armed
    /// signal under one shared timeout.
    ///
    /// There is exactly one trigger attempt; a failed race is surfaced, not
    /// masked. On success the artifact is written exactly once, to the join
    /// of the configured directory and the suggested filename.
    pub async fn trigger_and_capture<P, F>(&self, page: &P, trigger: F) -> Result<DownloadArtifact>
    where
        P: PortalPage + ?Sized,
        F: Future<Output = Result<()>>,
    {
        // join! polls in order, so the capture (and the observing state it
        // takes on first poll) is armed before the trigger ever runs.
        let capture = tokio::time::timeout(self.timeout, page.next_download());
        let (captured, triggered) = tokio::join!(capture, trigger);

        triggered?;
        let captured = captured
            .map_err(|_| Error::timeout("download-ready signal", self.timeout))??;

        let destination = self.download_dir.join(&captured.suggested_filename);
        persist(&captured.staged_path, &destination)?;
        info!(artifact = %destination.display(), "download captured");

        Ok(DownloadArtifact {
            suggested_filename: captured.suggested_filename,
            path: destination,
        })
    }
}

/// Move the staged file to its destination. Staging sits next to the
/// download directory, so a rename normally suffices; the copy fallback
/// covers staging on another filesystem.
fn persist(staged: &Path, destination: &Path) -> Result<()> {
    if std::fs::rename(staged, destination).is_ok() {
        return Ok(());
    }

    std::fs::copy(staged, destination).map_err(|source| Error::Filesystem {
        path: destination.to_path_buf(),
        source,
    })?;
    std::fs::remove_file(staged).map_err(|source| Error::Filesystem {
        path: staged.to_path_buf(),
        source,
    })?;
    Ok(())
}

//! Per-video processing steps.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::{Artifact, CleanupError, ProcessError};
use super::tools::ToolRunner;
use crate::job::{PersistenceError, Video, VideoRepository};
use crate::storage::{StorageGateway, TransferError};
use crate::workspace::WorkingSet;

/// Default time allowed for fetching the source.
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(1800);

/// Runs the fetch, fragment, encode and finish steps for one video.
///
/// Owns nothing but paths: every on-disk artifact lives in the [`WorkingSet`]
/// keyed by the video id.
pub struct VideoProcessor<S: ?Sized, T: ?Sized> {
    video: Video,
    workspace: WorkingSet,
    storage: Arc<S>,
    tools: Arc<T>,
    download_timeout: Duration,
}

impl<S, T> VideoProcessor<S, T>
where
    S: StorageGateway + ?Sized,
    T: ToolRunner + ?Sized,
{
    pub fn new(video: Video, work_root: &Path, storage: Arc<S>, tools: Arc<T>) -> Self {
        let workspace = WorkingSet::new(work_root, &video.id);
        Self {
            video,
            workspace,
            storage,
            tools,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn video(&self) -> &Video {
        &self.video
    }

    pub fn workspace(&self) -> &WorkingSet {
        &self.workspace
    }

    /// Downloads the source into `<work root>/<id>.mp4`.
    ///
    /// On timeout the partial source is removed. A blocking copy the backend
    /// already started is not cancelled and may still write the file.
    pub async fn fetch(&self) -> Result<(), TransferError> {
        info!(
            "Fetching {} for video {}",
            self.video.file_path, self.video.id
        );
        let download = self.storage.download(&self.video.id, &self.video.file_path);
        match tokio::time::timeout(self.download_timeout, download).await {
            Ok(result) => result,
            Err(_) => {
                let source = self.workspace.source_file();
                match tokio::fs::remove_file(&source).await {
                    Ok(()) => debug!("Removed partial download {}", source.display()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!(
                        "Could not remove partial download {}: {}",
                        source.display(),
                        e
                    ),
                }
                Err(TransferError::Timeout {
                    operation: "download",
                    timeout_secs: self.download_timeout.as_secs(),
                })
            }
        }
    }

    /// Creates the working directory and writes `<id>.frag`.
    pub async fn fragment(&self) -> Result<(), ProcessError> {
        let output_dir = self.workspace.output_dir();
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| ProcessError::WorkingDirectory {
                path: output_dir.clone(),
                source: e,
            })?;

        let result = self
            .tools
            .fragment(
                &self.workspace.source_file(),
                &self.workspace.fragment_file(),
            )
            .await?;
        debug!("Fragment output for {}: {}", self.video.id, result.output.trim());
        info!(
            "Fragmented video {} in {}ms",
            self.video.id, result.duration_ms
        );
        Ok(())
    }

    /// Packages the fragmented file into DASH segments under `<id>/`.
    pub async fn encode(&self) -> Result<(), ProcessError> {
        let result = self
            .tools
            .package(
                &self.workspace.fragment_file(),
                &self.workspace.output_dir(),
            )
            .await?;
        debug!("Package output for {}: {}", self.video.id, result.output.trim());
        info!(
            "Packaged video {} in {}ms",
            self.video.id, result.duration_ms
        );
        Ok(())
    }

    /// Removes the source file, the fragmented file and the working directory, in that order.
    ///
    /// Stops at the first removal that fails. On an already clean working set the
    /// source removal fails, so repeated calls return the same error.
    pub async fn finish(&self) -> Result<(), CleanupError> {
        let source = self.workspace.source_file();
        remove(Artifact::SourceFile, &source, tokio::fs::remove_file(&source).await)?;

        let fragment = self.workspace.fragment_file();
        remove(
            Artifact::FragmentFile,
            &fragment,
            tokio::fs::remove_file(&fragment).await,
        )?;

        let output_dir = self.workspace.output_dir();
        remove(
            Artifact::OutputDirectory,
            &output_dir,
            tokio::fs::remove_dir_all(&output_dir).await,
        )?;

        info!("Cleaned up working set for video {}", self.video.id);
        Ok(())
    }

    /// Validates and persists the video record.
    pub fn insert_video(&self, repository: &dyn VideoRepository) -> Result<Video, PersistenceError> {
        self.video.validate()?;
        repository.insert(self.video.clone())
    }
}

fn remove(artifact: Artifact, path: &Path, result: io::Result<()>) -> Result<(), CleanupError> {
    result.map_err(|source| CleanupError {
        artifact,
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Removed {} {}", artifact, path.display());
    Ok(())
}

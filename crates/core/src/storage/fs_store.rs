//! Local filesystem storage backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use super::error::{SchedulingError, TransferError};
use super::signal::CompletionSignal;
use super::traits::{FileSink, StorageGateway};
use super::upload::UploadCoordinator;
use crate::workspace::WorkingSet;

/// Storage backed by directories on a local or mounted filesystem.
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    input_root: PathBuf,
    work_root: PathBuf,
}

impl FilesystemBackend {
    /// `input_root` is where source paths are resolved; `work_root` receives downloads.
    pub fn new(input_root: impl Into<PathBuf>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            work_root: work_root.into(),
        }
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }
}

#[async_trait]
impl StorageGateway for FilesystemBackend {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn download(&self, video_id: &str, source_path: &str) -> Result<(), TransferError> {
        let source = self.input_root.join(source_path.trim_start_matches('/'));
        let target = WorkingSet::new(&self.work_root, video_id).source_file();

        fs::create_dir_all(&self.work_root)
            .await
            .map_err(|e| TransferError::DirectoryCreationFailed {
                path: self.work_root.clone(),
                source: e,
            })?;

        let bytes = fs::copy(&source, &target).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TransferError::SourceNotFound {
                    location: source.display().to_string(),
                }
            } else {
                TransferError::copy_failed(source.clone(), target.clone(), e)
            }
        })?;

        info!(
            "Copied {} to {} ({} bytes)",
            source.display(),
            target.display(),
            bytes
        );
        Ok(())
    }

    async fn upload(
        &self,
        local_dir: &Path,
        destination: &str,
        concurrency: usize,
    ) -> Result<CompletionSignal, SchedulingError> {
        if !fs::metadata(local_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(SchedulingError::SourceNotDirectory {
                path: local_dir.to_path_buf(),
            });
        }

        if destination.trim().is_empty() {
            return Err(SchedulingError::invalid_destination(
                destination,
                "destination directory must not be empty",
            ));
        }

        let sink = Arc::new(DirectorySink {
            root: PathBuf::from(destination),
        });
        let coordinator = UploadCoordinator::new(concurrency);
        debug!(
            "Scheduling upload {} -> {} with {} concurrent transfers",
            local_dir.display(),
            destination,
            coordinator.concurrency()
        );
        Ok(coordinator.spawn(local_dir.to_path_buf(), sink))
    }
}

/// Copies files into a destination directory.
struct DirectorySink {
    root: PathBuf,
}

#[async_trait]
impl FileSink for DirectorySink {
    async fn create_dir(&self, relative: &Path) -> Result<(), TransferError> {
        let path = self.root.join(relative);
        fs::create_dir_all(&path)
            .await
            .map_err(|e| TransferError::DirectoryCreationFailed { path, source: e })
    }

    async fn put_file(&self, local: &Path, relative: &Path) -> Result<u64, TransferError> {
        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        fs::copy(local, &target)
            .await
            .map_err(|e| TransferError::copy_failed(local.to_path_buf(), target.clone(), e))
    }
}

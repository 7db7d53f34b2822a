//! Mock storage gateway for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::storage::{
    CompletionSignal, SchedulingError, StorageGateway, TransferError, UploadOutcome,
};
use crate::workspace::WorkingSet;

/// A recorded upload request for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub local_dir: PathBuf,
    pub destination: String,
    pub concurrency: usize,
}

/// How the mock settles upload signals.
#[derive(Debug, Clone)]
enum UploadBehavior {
    Settle(UploadOutcome),
    Hang,
}

/// Mock implementation of the StorageGateway trait.
///
/// Provides controllable behavior for testing:
/// - Track download and upload requests
/// - Simulate download failures, stalled downloads and scheduling rejections
/// - Choose the outcome an upload signal reports, or never report one
///
/// When built with [`MockStorage::with_work_root`], downloads write a small
/// source file into the working set like a real backend would.
#[derive(Debug)]
pub struct MockStorage {
    work_root: Option<PathBuf>,
    downloads: Arc<RwLock<Vec<(String, String)>>>,
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    download_error: Arc<RwLock<Option<String>>>,
    download_hangs: Arc<RwLock<bool>>,
    scheduling_error: Arc<RwLock<Option<String>>>,
    upload_behavior: Arc<RwLock<UploadBehavior>>,
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            work_root: None,
            downloads: Arc::new(RwLock::new(Vec::new())),
            uploads: Arc::new(RwLock::new(Vec::new())),
            download_error: Arc::new(RwLock::new(None)),
            download_hangs: Arc::new(RwLock::new(false)),
            scheduling_error: Arc::new(RwLock::new(None)),
            upload_behavior: Arc::new(RwLock::new(UploadBehavior::Settle(
                UploadOutcome::Completed,
            ))),
        }
    }

    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(work_root.into());
        self
    }

    /// Get all recorded downloads as `(video_id, source_path)`.
    pub async fn recorded_downloads(&self) -> Vec<(String, String)> {
        self.downloads.read().await.clone()
    }

    /// Get all recorded upload requests.
    pub async fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    /// Make downloads fail with the given reason.
    pub async fn fail_download_with(&self, reason: impl Into<String>) {
        *self.download_error.write().await = Some(reason.into());
    }

    /// Make downloads write part of the source file and then stall.
    pub async fn hang_downloads(&self) {
        *self.download_hangs.write().await = true;
    }

    /// Make uploads be rejected before scheduling.
    pub async fn reject_upload_with(&self, reason: impl Into<String>) {
        *self.scheduling_error.write().await = Some(reason.into());
    }

    /// Set the outcome every upload signal reports.
    pub async fn set_upload_outcome(&self, outcome: UploadOutcome) {
        *self.upload_behavior.write().await = UploadBehavior::Settle(outcome);
    }

    /// Make upload signals never settle.
    pub async fn hang_uploads(&self) {
        *self.upload_behavior.write().await = UploadBehavior::Hang;
    }
}

#[async_trait]
impl StorageGateway for MockStorage {
    fn name(&self) -> &str {
        "mock"
    }

    async fn download(&self, video_id: &str, source_path: &str) -> Result<(), TransferError> {
        self.downloads
            .write()
            .await
            .push((video_id.to_string(), source_path.to_string()));

        if let Some(reason) = self.download_error.read().await.clone() {
            return Err(TransferError::object_storage(
                "download",
                "mock",
                source_path,
                reason,
            ));
        }

        let hangs = *self.download_hangs.read().await;
        if let Some(root) = &self.work_root {
            tokio::fs::create_dir_all(root).await?;
            let body: &[u8] = if hangs { b"ftyp" } else { b"ftypisom" };
            tokio::fs::write(WorkingSet::new(root, video_id).source_file(), body).await?;
        }
        if hangs {
            tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        }
        Ok(())
    }

    async fn upload(
        &self,
        local_dir: &Path,
        destination: &str,
        concurrency: usize,
    ) -> Result<CompletionSignal, SchedulingError> {
        self.uploads.write().await.push(RecordedUpload {
            local_dir: local_dir.to_path_buf(),
            destination: destination.to_string(),
            concurrency,
        });

        if let Some(reason) = self.scheduling_error.read().await.clone() {
            return Err(SchedulingError::invalid_destination(destination, reason));
        }

        match self.upload_behavior.read().await.clone() {
            UploadBehavior::Settle(outcome) => Ok(CompletionSignal::ready(outcome)),
            UploadBehavior::Hang => {
                let (sender, signal) = CompletionSignal::channel();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                    sender.send(UploadOutcome::Completed);
                });
                Ok(signal.with_task(task))
            }
        }
    }
}

//! Storage gateway: moving videos into the working area and segments out of it.
//!
//! Two backends are available behind [`StorageGateway`]:
//! - [`ObjectStorageBackend`]: S3-compatible buckets
//! - [`FilesystemBackend`]: local or mounted directories
//!
//! Uploads are driven by the [`UploadCoordinator`], which walks the working
//! directory and transfers files with bounded concurrency, reporting through a
//! one-shot [`CompletionSignal`].

mod error;
mod fs_store;
mod object_store;
mod signal;
mod traits;
mod upload;

pub use error::{SchedulingError, TransferError};
pub use fs_store::FilesystemBackend;
pub use object_store::{content_type_for, object_key, parse_destination, ObjectStorageBackend};
pub use signal::{CompletionSender, CompletionSignal, UploadOutcome, UPLOAD_COMPLETED};
pub use traits::{FileSink, StorageGateway};
pub use upload::{resolve_concurrency, UploadCoordinator, UploadPlan, UploadSummary};

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Config, StorageBackendKind};

/// The configured storage backend, selected once at startup.
#[derive(Clone)]
pub enum StorageBackend {
    ObjectStorage(ObjectStorageBackend),
    Filesystem(FilesystemBackend),
}

impl StorageBackend {
    /// Build the backend named by `config.storage.backend`.
    pub async fn from_config(config: &Config) -> Self {
        let work_root = config.workspace.local_storage_path.clone();
        let backend = match config.storage.backend {
            StorageBackendKind::ObjectStorage => StorageBackend::ObjectStorage(
                ObjectStorageBackend::from_config(
                    &config.storage.object_storage,
                    &config.storage.input,
                    work_root,
                )
                .await,
            ),
            StorageBackendKind::Filesystem => StorageBackend::Filesystem(FilesystemBackend::new(
                &config.storage.input,
                work_root,
            )),
        };
        info!("Using {} storage backend", backend.name());
        backend
    }

    fn gateway(&self) -> &dyn StorageGateway {
        match self {
            StorageBackend::ObjectStorage(backend) => backend,
            StorageBackend::Filesystem(backend) => backend,
        }
    }
}

#[async_trait]
impl StorageGateway for StorageBackend {
    fn name(&self) -> &str {
        self.gateway().name()
    }

    async fn download(&self, video_id: &str, source_path: &str) -> Result<(), TransferError> {
        self.gateway().download(video_id, source_path).await
    }

    async fn upload(
        &self,
        local_dir: &Path,
        destination: &str,
        concurrency: usize,
    ) -> Result<CompletionSignal, SchedulingError> {
        self.gateway()
            .upload(local_dir, destination, concurrency)
            .await
    }
}

//! Trait definitions for the storage module.

use std::path::Path;

use async_trait::async_trait;

use super::error::{SchedulingError, TransferError};
use super::signal::CompletionSignal;

/// Moves videos into the working area and finished output back out.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Returns the name of this backend.
    fn name(&self) -> &str;

    /// Fetches `source_path` from input storage into `<work root>/<video_id>.mp4`.
    ///
    /// Returns once the file is fully written.
    async fn download(&self, video_id: &str, source_path: &str) -> Result<(), TransferError>;

    /// Schedules a recursive upload of `local_dir` to `destination` and returns immediately.
    ///
    /// At most `concurrency` files are in flight; 0 means one per available CPU.
    /// The returned signal settles exactly once with the upload's outcome.
    async fn upload(
        &self,
        local_dir: &Path,
        destination: &str,
        concurrency: usize,
    ) -> Result<CompletionSignal, SchedulingError>;
}

/// Backend-specific writes performed by the upload coordinator.
///
/// Paths are relative to the upload root and never contain `..`.
#[async_trait]
pub trait FileSink: Send + Sync + 'static {
    /// Recreates a directory at the destination.
    async fn create_dir(&self, relative: &Path) -> Result<(), TransferError>;

    /// Transfers one file, returning the number of bytes written.
    async fn put_file(&self, local: &Path, relative: &Path) -> Result<u64, TransferError>;
}

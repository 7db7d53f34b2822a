//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the storage, tool and
//! repository traits, allowing job runs to be tested without object storage,
//! Bento4 binaries or a database.
//!
//! # Example
//!
//! ```rust,ignore
//! use encoder_core::testing::{MockJobRepository, MockStorage, MockTools};
//!
//! let storage = MockStorage::new().with_work_root(work_dir.path());
//! let tools = MockTools::new();
//! let jobs = MockJobRepository::new();
//!
//! // Configure failures
//! storage.set_upload_outcome(UploadOutcome::failed("disk full")).await;
//! jobs.fail_on_status(JobStatus::Completed);
//!
//! // Build a JobOrchestrator...
//! ```

mod mock_repository;
mod mock_storage;
mod mock_tools;

pub use mock_repository::{MockJobRepository, MockVideoRepository};
pub use mock_storage::{MockStorage, RecordedUpload};
pub use mock_tools::{MockTools, RecordedToolCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::job::Video;

    /// Create a video with a fixed id and the given source path.
    pub fn video(id: &str, file_path: &str) -> Video {
        let mut video = Video::new(file_path, format!("resource-{}", id));
        video.id = id.to_string();
        video
    }
}

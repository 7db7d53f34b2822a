//! Error types for the storage module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while moving bytes to or from storage.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Source object or file does not exist.
    #[error("Source not found: {location}")]
    SourceNotFound { location: String },

    /// Failed to create a directory.
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to copy a file.
    #[error("Failed to copy {from} to {to}: {error}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Object storage request failed.
    #[error("Object storage {operation} failed for {bucket}/{key}: {reason}")]
    ObjectStorage {
        operation: &'static str,
        bucket: String,
        key: String,
        reason: String,
    },

    /// Transfer did not finish in time.
    #[error("{operation} timed out after {timeout_secs} seconds")]
    Timeout {
        operation: &'static str,
        timeout_secs: u64,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Creates a copy failed error.
    pub fn copy_failed(from: PathBuf, to: PathBuf, error: std::io::Error) -> Self {
        Self::CopyFailed { from, to, error }
    }

    /// Creates an object storage error.
    pub fn object_storage(
        operation: &'static str,
        bucket: impl Into<String>,
        key: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::ObjectStorage {
            operation,
            bucket: bucket.into(),
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised before an upload is scheduled.
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// Upload source is missing or not a directory.
    #[error("Upload source is not a directory: {path}")]
    SourceNotDirectory { path: PathBuf },

    /// Destination cannot be used by this backend.
    #[error("Invalid upload destination {destination:?}: {reason}")]
    InvalidDestination { destination: String, reason: String },
}

impl SchedulingError {
    pub fn invalid_destination(destination: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDestination {
            destination: destination.into(),
            reason: reason.into(),
        }
    }
}

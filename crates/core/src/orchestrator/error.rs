//! Error type for job runs.

use thiserror::Error;

use crate::job::{JobStatus, PersistenceError, TransitionError, ValidationError};
use crate::processor::{CleanupError, ProcessError};
use crate::storage::{SchedulingError, TransferError};

/// Why a job run stopped.
///
/// The display text of the error that failed a job is what gets recorded as the job's error.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The upload reported an error through its completion signal.
    #[error("{0}")]
    UploadFailed(String),

    /// The upload did not report in time and was aborted.
    #[error("Upload did not complete within {timeout_secs} seconds")]
    UploadTimeout { timeout_secs: u64 },

    /// Only CREATED jobs can be started.
    #[error("Job {job_id} cannot be started from status {status}")]
    NotStartable { job_id: String, status: JobStatus },

    #[error("Job {job_id} belongs to video {expected}, not {actual}")]
    VideoMismatch {
        job_id: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    InvalidRecord(ValidationError),

    /// The job failed and persisting the FAILED status failed too.
    #[error("{cause}; recording the failure also failed: {persistence}")]
    FailureNotRecorded {
        #[source]
        cause: Box<JobError>,
        persistence: PersistenceError,
    },
}

impl JobError {
    /// The error that stopped the run, looking through a failed failure record.
    pub fn cause(&self) -> &JobError {
        match self {
            Self::FailureNotRecorded { cause, .. } => cause.cause(),
            other => other,
        }
    }

    /// Whether the run stopped because a status could not be persisted.
    pub fn is_persistence(&self) -> bool {
        matches!(self.cause(), Self::Persistence(_))
    }

    /// Whether the job's FAILED status reached the repository.
    pub fn failure_recorded(&self) -> bool {
        !matches!(self, Self::FailureNotRecorded { .. })
    }

    /// Whether the job was rejected before any status was persisted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotStartable { .. } | Self::VideoMismatch { .. } | Self::InvalidRecord(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_failed_displays_message_verbatim() {
        let err = JobError::UploadFailed("disk full".to_string());
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_failure_not_recorded_surfaces_both() {
        let err = JobError::FailureNotRecorded {
            cause: Box::new(JobError::Persistence(PersistenceError::database(
                "connection reset",
            ))),
            persistence: PersistenceError::database("connection refused"),
        };
        let text = err.to_string();
        assert!(text.contains("connection reset"));
        assert!(text.contains("connection refused"));
        assert!(err.is_persistence());
        assert!(!err.failure_recorded());
    }

    #[test]
    fn test_stage_error_is_not_persistence() {
        let err = JobError::UploadTimeout { timeout_secs: 5 };
        assert!(!err.is_persistence());
        assert!(err.failure_recorded());
        assert!(!err.is_precondition());
    }
}

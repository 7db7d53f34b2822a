//! Job and video records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error text recorded when a failure is reported without a message.
const FALLBACK_FAILURE_MESSAGE: &str = "job failed without an error message";

/// Lifecycle status of a transcoding job.
///
/// ```text
/// CREATED -> DOWNLOADING -> FRAGMENTING -> ENCODING -> UPLOADING -> FINISHING -> COMPLETED
///     \___________\______________\____________\____________\___________\
///                                                                        -> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    Downloading,
    Fragmenting,
    Encoding,
    Uploading,
    Finishing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Statuses a successful run persists, in order.
    pub const PIPELINE: [JobStatus; 6] = [
        JobStatus::Downloading,
        JobStatus::Fragmenting,
        JobStatus::Encoding,
        JobStatus::Uploading,
        JobStatus::Finishing,
        JobStatus::Completed,
    ];

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// The status that follows this one on the success path.
    pub fn next(&self) -> Option<JobStatus> {
        match self {
            JobStatus::Created => Some(JobStatus::Downloading),
            JobStatus::Downloading => Some(JobStatus::Fragmenting),
            JobStatus::Fragmenting => Some(JobStatus::Encoding),
            JobStatus::Encoding => Some(JobStatus::Uploading),
            JobStatus::Uploading => Some(JobStatus::Finishing),
            JobStatus::Finishing => Some(JobStatus::Completed),
            JobStatus::Completed | JobStatus::Failed => None,
        }
    }

    /// Whether a job in this status may move to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == JobStatus::Failed || self.next() == Some(next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "CREATED",
            JobStatus::Downloading => "DOWNLOADING",
            JobStatus::Fragmenting => "FRAGMENTING",
            JobStatus::Encoding => "ENCODING",
            JobStatus::Uploading => "UPLOADING",
            JobStatus::Finishing => "FINISHING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Lower-case name used as a metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Downloading => "downloading",
            JobStatus::Fragmenting => "fragmenting",
            JobStatus::Encoding => "encoding",
            JobStatus::Uploading => "uploading",
            JobStatus::Finishing => "finishing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(JobStatus::Created),
            "DOWNLOADING" => Ok(JobStatus::Downloading),
            "FRAGMENTING" => Ok(JobStatus::Fragmenting),
            "ENCODING" => Ok(JobStatus::Encoding),
            "UPLOADING" => Ok(JobStatus::Uploading),
            "FINISHING" => Ok(JobStatus::Finishing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(ValidationError::new(
                "status",
                format!("unknown job status {:?}", other),
            )),
        }
    }
}

/// A status change that the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {job_id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub job_id: String,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A record field that violates its constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// A unit of work that carries one video through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// Diagnostic text. Non-empty exactly when `status` is FAILED.
    pub error: String,
    pub video_id: String,
    /// Output location segments are uploaded under (`<output_path>/<video_id>`).
    pub output_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in CREATED status for the given video.
    pub fn new(video_id: impl Into<String>, output_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Created,
            error: String::new(),
            video_id: video_id.into(),
            output_path: output_path.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns a copy of this job moved to `next` on the success path.
    ///
    /// FAILED is reached through [`Job::fail`] so an error message is always attached.
    pub fn transition(&self, next: JobStatus) -> Result<Job, TransitionError> {
        if next == JobStatus::Failed || !self.status.can_transition_to(next) {
            return Err(self.transition_error(next));
        }
        Ok(Job {
            status: next,
            error: String::new(),
            updated_at: Utc::now(),
            ..self.clone()
        })
    }

    /// Returns a copy of this job moved to FAILED with `message` recorded.
    pub fn fail(&self, message: impl Into<String>) -> Result<Job, TransitionError> {
        if !self.status.can_transition_to(JobStatus::Failed) {
            return Err(self.transition_error(JobStatus::Failed));
        }
        let message = message.into();
        let error = if message.trim().is_empty() {
            FALLBACK_FAILURE_MESSAGE.to_string()
        } else {
            message
        };
        Ok(Job {
            status: JobStatus::Failed,
            error,
            updated_at: Utc::now(),
            ..self.clone()
        })
    }

    /// Checks the record-level invariants.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::new("job.id", "must not be empty"));
        }
        if self.video_id.trim().is_empty() {
            return Err(ValidationError::new("job.video_id", "must not be empty"));
        }
        match (self.status == JobStatus::Failed, self.error.is_empty()) {
            (true, true) => Err(ValidationError::new(
                "job.error",
                "a FAILED job must carry an error message",
            )),
            (false, false) => Err(ValidationError::new(
                "job.error",
                format!("a {} job must not carry an error message", self.status),
            )),
            _ => Ok(()),
        }
    }

    fn transition_error(&self, to: JobStatus) -> TransitionError {
        TransitionError {
            job_id: self.id.clone(),
            from: self.status,
            to,
        }
    }
}

/// The input video a job transcodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    /// Also the working directory name and artifact stem, so it must be filesystem-safe.
    pub id: String,
    /// External reference supplied by the caller (may be empty).
    pub resource_id: String,
    /// Location of the source within the input storage medium.
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

impl Video {
    /// Create a video record with a generated id.
    pub fn new(file_path: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            resource_id: resource_id.into(),
            file_path: file_path.into(),
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let id = self.id.as_str();
        if id.is_empty() {
            return Err(ValidationError::new("video.id", "must not be empty"));
        }
        if id.starts_with('.') {
            return Err(ValidationError::new(
                "video.id",
                format!("{:?} must not start with a dot", id),
            ));
        }
        if id.chars().any(|c| c == '/' || c == '\\' || c == '\0') {
            return Err(ValidationError::new(
                "video.id",
                format!("{:?} must not contain path separators", id),
            ));
        }
        if self.file_path.trim().is_empty() {
            return Err(ValidationError::new("video.file_path", "must not be empty"));
        }
        Ok(())
    }
}

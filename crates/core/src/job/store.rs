//! Job and video persistence traits.

use thiserror::Error;

use super::{Job, TransitionError, ValidationError, Video};

/// Error type for repository operations.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Record not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Record already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// The update would break the job state machine.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// The record violates its own invariants.
    #[error(transparent)]
    InvalidRecord(#[from] ValidationError),

    /// Backend failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl PersistenceError {
    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "job",
            id: id.into(),
        }
    }

    pub fn video_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "video",
            id: id.into(),
        }
    }

    pub fn database(reason: impl std::fmt::Display) -> Self {
        Self::Database(reason.to_string())
    }
}

/// Durable storage for jobs.
///
/// `update` returns the persisted representation, which callers use from then on.
pub trait JobRepository: Send + Sync {
    /// Store a new job.
    fn insert(&self, job: Job) -> Result<Job, PersistenceError>;

    /// Get a job by id.
    fn find(&self, id: &str) -> Result<Option<Job>, PersistenceError>;

    /// Persist a job's status and error. Rejects transitions the state machine forbids.
    fn update(&self, job: Job) -> Result<Job, PersistenceError>;
}

/// Durable storage for videos.
pub trait VideoRepository: Send + Sync {
    /// Store a new video.
    fn insert(&self, video: Video) -> Result<Video, PersistenceError>;

    /// Get a video by id.
    fn find(&self, id: &str) -> Result<Option<Video>, PersistenceError>;
}

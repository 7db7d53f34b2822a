//! In-memory repositories with failure injection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::job::{
    Job, JobRepository, JobStatus, PersistenceError, TransitionError, Video, VideoRepository,
};

#[derive(Debug, Default)]
struct JobState {
    jobs: HashMap<String, Job>,
    updates: Vec<JobStatus>,
    fail_on_status: Option<JobStatus>,
    fail_from_update: Option<usize>,
}

/// Mock implementation of the JobRepository trait.
///
/// Enforces the same transition rules as the SQLite store. Every update
/// attempt is recorded by status, including rejected ones, so tests can assert
/// the exact sequence of writes.
#[derive(Debug, Clone, Default)]
pub struct MockJobRepository {
    state: Arc<Mutex<JobState>>,
}

impl MockJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, JobState>, PersistenceError> {
        self.state
            .lock()
            .map_err(|_| PersistenceError::database("mock repository lock poisoned"))
    }

    /// Statuses of every update attempt, in order.
    pub fn recorded_updates(&self) -> Vec<JobStatus> {
        self.state
            .lock()
            .map(|state| state.updates.clone())
            .unwrap_or_default()
    }

    /// Reject any update that writes `status`.
    pub fn fail_on_status(&self, status: JobStatus) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_on_status = Some(status);
        }
    }

    /// Reject the `n`th update attempt (1-based) and every one after it.
    pub fn fail_from_update(&self, n: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_from_update = Some(n);
        }
    }
}

impl JobRepository for MockJobRepository {
    fn insert(&self, job: Job) -> Result<Job, PersistenceError> {
        job.check_invariants()?;
        let mut state = self.lock()?;
        if state.jobs.contains_key(&job.id) {
            return Err(PersistenceError::AlreadyExists {
                kind: "job",
                id: job.id,
            });
        }
        state.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn find(&self, id: &str) -> Result<Option<Job>, PersistenceError> {
        Ok(self.lock()?.jobs.get(id).cloned())
    }

    fn update(&self, job: Job) -> Result<Job, PersistenceError> {
        let mut state = self.lock()?;
        state.updates.push(job.status);
        let attempt = state.updates.len();

        if state.fail_on_status == Some(job.status)
            || state.fail_from_update.is_some_and(|n| attempt >= n)
        {
            return Err(PersistenceError::database(format!(
                "injected failure writing {}",
                job.status
            )));
        }

        job.check_invariants()?;
        let current = state
            .jobs
            .get(&job.id)
            .ok_or_else(|| PersistenceError::job_not_found(&job.id))?;
        let rewrite = current.status == job.status && !current.status.is_terminal();
        if !rewrite && !current.status.can_transition_to(job.status) {
            return Err(PersistenceError::InvalidTransition(TransitionError {
                job_id: job.id,
                from: current.status,
                to: job.status,
            }));
        }

        state.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }
}

/// Mock implementation of the VideoRepository trait.
#[derive(Debug, Clone, Default)]
pub struct MockVideoRepository {
    videos: Arc<Mutex<HashMap<String, Video>>>,
}

impl MockVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoRepository for MockVideoRepository {
    fn insert(&self, video: Video) -> Result<Video, PersistenceError> {
        video.validate()?;
        let mut videos = self
            .videos
            .lock()
            .map_err(|_| PersistenceError::database("mock repository lock poisoned"))?;
        if videos.contains_key(&video.id) {
            return Err(PersistenceError::AlreadyExists {
                kind: "video",
                id: video.id,
            });
        }
        videos.insert(video.id.clone(), video.clone());
        Ok(video)
    }

    fn find(&self, id: &str) -> Result<Option<Video>, PersistenceError> {
        let videos = self
            .videos
            .lock()
            .map_err(|_| PersistenceError::database("mock repository lock poisoned"))?;
        Ok(videos.get(id).cloned())
    }
}

//! Job orchestrator implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use super::config::OrchestratorConfig;
use super::error::JobError;
use crate::job::{Job, JobRepository, JobStatus, ValidationError, Video, VideoRepository};
use crate::metrics;
use crate::processor::{ToolRunner, VideoProcessor};
use crate::storage::{StorageGateway, UploadOutcome};

/// Drives a job through download, fragment, encode, upload and finish.
///
/// Every status change is persisted before the stage it names runs. The first
/// failure ends the run and is recorded as the job's single FAILED update.
pub struct JobOrchestrator<S: ?Sized, T: ?Sized> {
    config: OrchestratorConfig,
    storage: Arc<S>,
    tools: Arc<T>,
    jobs: Arc<dyn JobRepository>,
    videos: Arc<dyn VideoRepository>,
}

impl<S, T> JobOrchestrator<S, T>
where
    S: StorageGateway + ?Sized,
    T: ToolRunner + ?Sized,
{
    pub fn new(
        config: OrchestratorConfig,
        storage: Arc<S>,
        tools: Arc<T>,
        jobs: Arc<dyn JobRepository>,
        videos: Arc<dyn VideoRepository>,
    ) -> Self {
        Self {
            config,
            storage,
            tools,
            jobs,
            videos,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn processor(&self, video: &Video) -> VideoProcessor<S, T> {
        VideoProcessor::new(
            video.clone(),
            &self.config.work_dir,
            Arc::clone(&self.storage),
            Arc::clone(&self.tools),
        )
        .with_download_timeout(self.config.download_timeout())
    }

    /// Persists `video` and a new CREATED job that uploads to `output_path`.
    pub fn create_job(&self, video: Video, output_path: &str) -> Result<(Job, Video), JobError> {
        if output_path.trim().is_empty() {
            return Err(JobError::InvalidRecord(ValidationError::new(
                "job.output_path",
                "must not be empty",
            )));
        }

        let video = self.processor(&video).insert_video(self.videos.as_ref())?;
        let job = self.jobs.insert(Job::new(&video.id, output_path))?;
        info!("Created job {} for video {}", job.id, video.id);
        Ok((job, video))
    }

    /// Runs `job` to a terminal status and returns the final persisted record.
    ///
    /// Jobs that are not CREATED, or that do not belong to `video`, are rejected
    /// without touching the repository.
    pub async fn start(&self, job: Job, video: &Video) -> Result<Job, JobError> {
        if job.status != JobStatus::Created {
            return Err(JobError::NotStartable {
                job_id: job.id,
                status: job.status,
            });
        }
        if job.video_id != video.id {
            return Err(JobError::VideoMismatch {
                job_id: job.id,
                expected: job.video_id,
                actual: video.id.clone(),
            });
        }
        video.validate().map_err(JobError::InvalidRecord)?;
        if job.output_path.trim().is_empty() {
            return Err(JobError::InvalidRecord(ValidationError::new(
                "job.output_path",
                "must not be empty",
            )));
        }

        info!("Starting job {} for video {}", job.id, video.id);
        metrics::JOBS_STARTED.inc();
        let started = Instant::now();
        let processor = self.processor(video);
        let mut job = job;

        match self.run_stages(&mut job, &processor).await {
            Ok(()) => {
                metrics::JOBS_FINISHED.with_label_values(&["completed"]).inc();
                metrics::JOB_DURATION
                    .with_label_values(&["completed"])
                    .observe(started.elapsed().as_secs_f64());
                info!(
                    "Job {} completed in {:?}",
                    job.id,
                    started.elapsed()
                );
                Ok(job)
            }
            Err(cause) => {
                metrics::JOBS_FINISHED.with_label_values(&["failed"]).inc();
                metrics::JOB_DURATION
                    .with_label_values(&["failed"])
                    .observe(started.elapsed().as_secs_f64());
                Err(self.record_failure(job, cause))
            }
        }
    }

    async fn run_stages(
        &self,
        job: &mut Job,
        processor: &VideoProcessor<S, T>,
    ) -> Result<(), JobError> {
        self.advance(job, JobStatus::Downloading)?;
        Self::stage(JobStatus::Downloading, processor.fetch()).await?;

        self.advance(job, JobStatus::Fragmenting)?;
        Self::stage(JobStatus::Fragmenting, processor.fragment()).await?;

        self.advance(job, JobStatus::Encoding)?;
        Self::stage(JobStatus::Encoding, processor.encode()).await?;

        let destination = upload_destination(job, processor.video());
        self.advance(job, JobStatus::Uploading)?;
        Self::stage(JobStatus::Uploading, self.upload(processor, &destination)).await?;

        self.advance(job, JobStatus::Finishing)?;
        Self::stage(JobStatus::Finishing, processor.finish()).await?;

        self.advance(job, JobStatus::Completed)
    }

    /// Persists the next status. The in-memory job only moves once the repository accepts it.
    fn advance(&self, job: &mut Job, next: JobStatus) -> Result<(), JobError> {
        let candidate = job.transition(next)?;
        *job = self.jobs.update(candidate)?;
        metrics::STATUS_TRANSITIONS
            .with_label_values(&[next.label()])
            .inc();
        info!("Job {} is now {}", job.id, job.status);
        Ok(())
    }

    async fn stage<F, E>(status: JobStatus, work: F) -> Result<(), JobError>
    where
        F: Future<Output = Result<(), E>>,
        E: Into<JobError>,
    {
        let start = Instant::now();
        let result = work.await.map_err(Into::into);
        let outcome = if result.is_ok() { "success" } else { "failed" };
        metrics::STAGE_DURATION
            .with_label_values(&[status.label(), outcome])
            .observe(start.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::STAGE_FAILURES
                .with_label_values(&[status.label()])
                .inc();
        }
        result
    }

    async fn upload(
        &self,
        processor: &VideoProcessor<S, T>,
        destination: &str,
    ) -> Result<(), JobError> {
        let local_dir = processor.workspace().output_dir();
        let signal = self
            .storage
            .upload(&local_dir, destination, self.config.upload_concurrency)
            .await?;

        match signal.wait_timeout(self.config.upload_timeout()).await {
            Ok(UploadOutcome::Completed) => {
                info!("Uploaded {} to {}", local_dir.display(), destination);
                Ok(())
            }
            Ok(UploadOutcome::Failed(message)) => Err(JobError::UploadFailed(message)),
            Err(_) => {
                warn!(
                    "Upload of {} to {} timed out; aborting transfer",
                    local_dir.display(),
                    destination
                );
                Err(JobError::UploadTimeout {
                    timeout_secs: self.config.upload_timeout_secs,
                })
            }
        }
    }

    /// Records FAILED with the cause's text. Returns the cause, or both errors if the
    /// record could not be written.
    fn record_failure(&self, job: Job, cause: JobError) -> JobError {
        error!("Job {} failed during {}: {}", job.id, job.status, cause);

        let failed = match job.fail(cause.to_string()) {
            Ok(failed) => failed,
            Err(transition) => {
                return JobError::FailureNotRecorded {
                    cause: Box::new(cause),
                    persistence: transition.into(),
                }
            }
        };

        match self.jobs.update(failed) {
            Ok(recorded) => {
                metrics::STATUS_TRANSITIONS
                    .with_label_values(&[JobStatus::Failed.label()])
                    .inc();
                info!("Job {} is now {}", recorded.id, recorded.status);
                cause
            }
            Err(persistence) => {
                error!(
                    "Could not record failure of job {}: {}",
                    job.id, persistence
                );
                JobError::FailureNotRecorded {
                    cause: Box::new(cause),
                    persistence,
                }
            }
        }
    }
}

/// Segments for a video land under `<output_path>/<video id>`.
fn upload_destination(job: &Job, video: &Video) -> String {
    format!("{}/{}", job.output_path.trim_end_matches('/'), video.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_destination() {
        let mut video = Video::new("in.mp4", "");
        video.id = "vid-9".to_string();
        let job = Job::new(&video.id, "dash-bucket/encoded/");
        assert_eq!(upload_destination(&job, &video), "dash-bucket/encoded/vid-9");
    }
}

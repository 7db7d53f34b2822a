//! Job lifecycle integration tests.
//!
//! These tests drive jobs through the orchestrator end to end:
//! created -> downloading -> fragmenting -> encoding -> uploading -> finishing -> completed

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use encoder_core::{
    job::{JobRepository, JobStatus, SqliteStore, VideoRepository},
    processor::ProcessError,
    storage::{FilesystemBackend, TransferError, UploadOutcome},
    testing::{fixtures, MockJobRepository, MockStorage, MockTools, MockVideoRepository},
    JobError, JobOrchestrator, OrchestratorConfig,
};

/// Filesystem backend, mock Bento4 tools and a SQLite store.
struct TestHarness {
    input: TempDir,
    work: TempDir,
    output: TempDir,
    store: SqliteStore,
    tools: Arc<MockTools>,
}

impl TestHarness {
    fn new() -> Self {
        let input = TempDir::new().expect("Failed to create input dir");
        std::fs::create_dir_all(input.path().join("uploads")).unwrap();
        std::fs::write(input.path().join("uploads/clip.mp4"), b"ftypisom").unwrap();

        Self {
            input,
            work: TempDir::new().expect("Failed to create work dir"),
            output: TempDir::new().expect("Failed to create output dir"),
            store: SqliteStore::in_memory().expect("Failed to create store"),
            tools: Arc::new(MockTools::new()),
        }
    }

    fn orchestrator(&self, concurrency: usize) -> JobOrchestrator<FilesystemBackend, MockTools> {
        let config = OrchestratorConfig::default()
            .with_work_dir(self.work.path().to_path_buf())
            .with_upload_concurrency(concurrency);
        JobOrchestrator::new(
            config,
            Arc::new(FilesystemBackend::new(self.input.path(), self.work.path())),
            Arc::clone(&self.tools),
            Arc::new(self.store.jobs()),
            Arc::new(self.store.videos()),
        )
    }

    fn destination(&self) -> String {
        self.output.path().display().to_string()
    }
}

/// Mock storage and tools with an in-memory repository that records every update.
struct MockHarness {
    work: TempDir,
    storage: Arc<MockStorage>,
    tools: Arc<MockTools>,
    jobs: MockJobRepository,
    videos: MockVideoRepository,
}

impl MockHarness {
    fn new() -> Self {
        let work = TempDir::new().expect("Failed to create work dir");
        let storage = Arc::new(MockStorage::new().with_work_root(work.path()));
        Self {
            work,
            storage,
            tools: Arc::new(MockTools::new()),
            jobs: MockJobRepository::new(),
            videos: MockVideoRepository::new(),
        }
    }

    fn orchestrator(&self, config: OrchestratorConfig) -> JobOrchestrator<MockStorage, MockTools> {
        JobOrchestrator::new(
            config.with_work_dir(self.work.path().to_path_buf()),
            Arc::clone(&self.storage),
            Arc::clone(&self.tools),
            Arc::new(self.jobs.clone()),
            Arc::new(self.videos.clone()),
        )
    }
}

fn assert_clean(work: &Path, video_id: &str) {
    assert!(!work.join(format!("{}.mp4", video_id)).exists());
    assert!(!work.join(format!("{}.frag", video_id)).exists());
    assert!(!work.join(video_id).exists());
}

#[tokio::test]
async fn test_successful_job_completes_and_cleans_up() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(2);

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-a", "uploads/clip.mp4"), &harness.destination())
        .unwrap();
    assert_eq!(job.status, JobStatus::Created);

    let finished = orchestrator.start(job, &video).await.unwrap();

    assert_eq!(finished.status, JobStatus::Completed);
    assert!(finished.error.is_empty());

    let stored = harness.store.jobs().find(&finished.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(harness.store.videos().find("vid-a").unwrap().is_some());

    let uploaded = harness.output.path().join("vid-a");
    assert!(uploaded.join("stream.mpd").exists());
    assert!(uploaded.join("video/avc1/seg-1.m4s").exists());
    assert_clean(harness.work.path(), "vid-a");

    let calls = harness.tools.recorded_calls().await;
    assert_eq!(calls.len(), 2);
}

#[tokio::test]
async fn test_successful_job_persists_each_status_in_order() {
    let harness = MockHarness::new();
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-order", "in/clip.mp4"), "bucket/encoded")
        .unwrap();
    orchestrator.start(job, &video).await.unwrap();

    assert_eq!(harness.jobs.recorded_updates(), JobStatus::PIPELINE.to_vec());

    let uploads = harness.storage.recorded_uploads().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].destination, "bucket/encoded/vid-order");
    assert_eq!(uploads[0].local_dir, harness.work.path().join("vid-order"));
}

#[tokio::test]
async fn test_fragment_failure_stops_the_job() {
    let harness = TestHarness::new();
    harness.tools.fail_fragment_with(1, "bad header").await;
    let orchestrator = harness.orchestrator(1);

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-b", "uploads/clip.mp4"), &harness.destination())
        .unwrap();
    let job_id = job.id.clone();

    let err = orchestrator.start(job, &video).await.unwrap_err();
    assert!(matches!(err, JobError::Process(ProcessError::ToolFailed { .. })));
    assert!(err.failure_recorded());

    let stored = harness.store.jobs().find(&job_id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.error.contains("bad header"));

    // Packaging and upload never ran.
    let calls = harness.tools.recorded_calls().await;
    assert_eq!(calls.len(), 1);
    assert!(!harness.output.path().join("vid-b").exists());
}

#[tokio::test]
async fn test_fragment_failure_records_expected_statuses() {
    let harness = MockHarness::new();
    harness.tools.fail_fragment_with(1, "bad header").await;
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-b2", "in/clip.mp4"), "bucket/out")
        .unwrap();
    orchestrator.start(job, &video).await.unwrap_err();

    assert_eq!(
        harness.jobs.recorded_updates(),
        vec![JobStatus::Downloading, JobStatus::Fragmenting, JobStatus::Failed]
    );
    assert!(harness.storage.recorded_uploads().await.is_empty());
}

#[tokio::test]
async fn test_package_failure_stops_before_upload() {
    let harness = MockHarness::new();
    harness.tools.fail_package_with(2, "no tracks").await;
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-p", "in/clip.mp4"), "bucket/out")
        .unwrap();
    let job_id = job.id.clone();

    let err = orchestrator.start(job, &video).await.unwrap_err();
    assert!(matches!(err, JobError::Process(ProcessError::ToolFailed { .. })));
    assert!(err.failure_recorded());

    assert_eq!(
        harness.jobs.recorded_updates(),
        vec![
            JobStatus::Downloading,
            JobStatus::Fragmenting,
            JobStatus::Encoding,
            JobStatus::Failed
        ]
    );
    assert!(harness.storage.recorded_uploads().await.is_empty());

    let stored = harness.jobs.find(&job_id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.error.contains("no tracks"));
}

#[tokio::test]
async fn test_cleanup_failure_fails_job() {
    let harness = MockHarness::new();
    harness.tools.consume_input_on_package().await;
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-f", "in/clip.mp4"), "bucket/out")
        .unwrap();
    let job_id = job.id.clone();

    let err = orchestrator.start(job, &video).await.unwrap_err();
    assert!(matches!(err, JobError::Cleanup(_)));
    assert!(err.failure_recorded());

    let updates = harness.jobs.recorded_updates();
    assert_eq!(
        &updates[updates.len() - 3..],
        &[JobStatus::Uploading, JobStatus::Finishing, JobStatus::Failed]
    );
    assert!(!updates.contains(&JobStatus::Completed));

    let stored = harness.jobs.find(&job_id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.error.contains("Failed to remove fragmented file"));
}

#[tokio::test]
async fn test_upload_failure_message_becomes_job_error() {
    let harness = MockHarness::new();
    harness
        .storage
        .set_upload_outcome(UploadOutcome::failed("disk full"))
        .await;
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-c", "in/clip.mp4"), "bucket/out")
        .unwrap();
    let job_id = job.id.clone();

    let err = orchestrator.start(job, &video).await.unwrap_err();
    assert!(matches!(err, JobError::UploadFailed(_)));

    let stored = harness.jobs.find(&job_id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error, "disk full");

    // Finish never ran, so the working set is still there.
    assert_eq!(
        harness.jobs.recorded_updates().last(),
        Some(&JobStatus::Failed)
    );
    assert!(!harness
        .jobs
        .recorded_updates()
        .contains(&JobStatus::Finishing));
    assert!(harness.work.path().join("vid-c.mp4").exists());
}

#[tokio::test]
async fn test_upload_timeout_fails_job() {
    let harness = MockHarness::new();
    harness.storage.hang_uploads().await;
    let orchestrator = harness.orchestrator(OrchestratorConfig::default().with_upload_timeout(1));

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-t", "in/clip.mp4"), "bucket/out")
        .unwrap();
    let job_id = job.id.clone();

    let err = orchestrator.start(job, &video).await.unwrap_err();
    assert!(matches!(err, JobError::UploadTimeout { timeout_secs: 1 }));

    let stored = harness.jobs.find(&job_id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.error.contains("1 seconds"));
}

#[tokio::test]
async fn test_scheduling_rejection_fails_job() {
    let harness = MockHarness::new();
    harness.storage.reject_upload_with("bucket missing").await;
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-s", "in/clip.mp4"), "bucket/out")
        .unwrap();
    let err = orchestrator.start(job, &video).await.unwrap_err();

    assert!(matches!(err, JobError::Scheduling(_)));
    assert!(err.to_string().contains("bucket missing"));
}

#[tokio::test]
async fn test_completed_write_failure_records_failed() {
    let harness = MockHarness::new();
    harness.jobs.fail_on_status(JobStatus::Completed);
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-d", "in/clip.mp4"), "bucket/out")
        .unwrap();
    let job_id = job.id.clone();

    let err = orchestrator.start(job, &video).await.unwrap_err();
    assert!(err.is_persistence());
    assert!(err.failure_recorded());

    let stored = harness.jobs.find(&job_id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.error.contains("injected failure writing COMPLETED"));

    let updates = harness.jobs.recorded_updates();
    assert_eq!(
        &updates[updates.len() - 3..],
        &[JobStatus::Finishing, JobStatus::Completed, JobStatus::Failed]
    );
}

#[tokio::test]
async fn test_unrecorded_failure_surfaces_both_errors() {
    let harness = MockHarness::new();
    // The sixth update writes COMPLETED; it and the FAILED record both fail.
    harness.jobs.fail_from_update(6);
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-d2", "in/clip.mp4"), "bucket/out")
        .unwrap();
    let job_id = job.id.clone();

    let err = orchestrator.start(job, &video).await.unwrap_err();
    assert!(!err.failure_recorded());
    assert!(err.is_persistence());
    let text = err.to_string();
    assert!(text.contains("injected failure writing COMPLETED"));
    assert!(text.contains("injected failure writing FAILED"));

    let stored = harness.jobs.find(&job_id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Finishing);
}

#[tokio::test]
async fn test_status_write_failure_at_every_stage() {
    for (k, failing) in JobStatus::PIPELINE.iter().enumerate() {
        let harness = MockHarness::new();
        harness.jobs.fail_on_status(*failing);
        let orchestrator = harness.orchestrator(OrchestratorConfig::default());

        let (job, video) = orchestrator
            .create_job(fixtures::video(&format!("vid-k{}", k), "in/clip.mp4"), "out")
            .unwrap();
        let job_id = job.id.clone();

        let err = orchestrator.start(job, &video).await.unwrap_err();
        assert!(err.is_persistence(), "stage {}", failing);

        let mut expected = JobStatus::PIPELINE[..=k].to_vec();
        expected.push(JobStatus::Failed);
        assert_eq!(harness.jobs.recorded_updates(), expected, "stage {}", failing);

        let stored = harness.jobs.find(&job_id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(!stored.error.is_empty());
    }
}

#[tokio::test]
async fn test_download_failure_skips_tools() {
    let harness = MockHarness::new();
    harness.storage.fail_download_with("connection reset").await;
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-dl", "in/clip.mp4"), "out")
        .unwrap();
    let err = orchestrator.start(job, &video).await.unwrap_err();

    assert!(matches!(err, JobError::Transfer(_)));
    assert!(harness.tools.recorded_calls().await.is_empty());
    assert_eq!(
        harness.jobs.recorded_updates(),
        vec![JobStatus::Downloading, JobStatus::Failed]
    );
}

#[tokio::test]
async fn test_download_timeout_fails_job() {
    let harness = MockHarness::new();
    harness.storage.hang_downloads().await;
    let orchestrator =
        harness.orchestrator(OrchestratorConfig::default().with_download_timeout(1));

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-dt", "in/clip.mp4"), "out")
        .unwrap();
    let job_id = job.id.clone();

    let err = orchestrator.start(job, &video).await.unwrap_err();
    assert!(matches!(
        err,
        JobError::Transfer(TransferError::Timeout {
            operation: "download",
            timeout_secs: 1
        })
    ));

    assert_eq!(
        harness.jobs.recorded_updates(),
        vec![JobStatus::Downloading, JobStatus::Failed]
    );
    assert!(harness.tools.recorded_calls().await.is_empty());
    assert!(!harness.work.path().join("vid-dt.mp4").exists());

    let stored = harness.jobs.find(&job_id).unwrap().unwrap();
    assert!(stored.error.contains("download timed out"));
}

#[tokio::test]
async fn test_only_created_jobs_start() {
    let harness = MockHarness::new();
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let (job, video) = orchestrator
        .create_job(fixtures::video("vid-ns", "in/clip.mp4"), "out")
        .unwrap();
    let mut running = job.clone();
    running.status = JobStatus::Encoding;

    let err = orchestrator.start(running, &video).await.unwrap_err();
    assert!(matches!(err, JobError::NotStartable { .. }));
    assert!(err.is_precondition());
    assert!(harness.jobs.recorded_updates().is_empty());
    assert!(harness.storage.recorded_downloads().await.is_empty());
}

#[tokio::test]
async fn test_video_mismatch_is_rejected() {
    let harness = MockHarness::new();
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let (job, _) = orchestrator
        .create_job(fixtures::video("vid-m1", "in/a.mp4"), "out")
        .unwrap();
    let (_, other) = orchestrator
        .create_job(fixtures::video("vid-m2", "in/b.mp4"), "out")
        .unwrap();

    let err = orchestrator.start(job, &other).await.unwrap_err();
    assert!(matches!(err, JobError::VideoMismatch { .. }));
    assert!(harness.jobs.recorded_updates().is_empty());
}

#[test]
fn test_create_job_rejects_empty_output_path() {
    let harness = MockHarness::new();
    let orchestrator = harness.orchestrator(OrchestratorConfig::default());

    let err = orchestrator
        .create_job(fixtures::video("vid-e", "in/a.mp4"), "  ")
        .unwrap_err();
    assert!(matches!(err, JobError::InvalidRecord(_)));
    assert!(harness.videos.find("vid-e").unwrap().is_none());
}

#[tokio::test]
async fn test_upload_concurrency_settings() {
    for concurrency in [0, 1] {
        let harness = TestHarness::new();
        let orchestrator = harness.orchestrator(concurrency);

        let (job, video) = orchestrator
            .create_job(
                fixtures::video(&format!("vid-c{}", concurrency), "uploads/clip.mp4"),
                &harness.destination(),
            )
            .unwrap();
        let finished = orchestrator.start(job, &video).await.unwrap();

        assert_eq!(finished.status, JobStatus::Completed);
        let uploaded = harness.output.path().join(&video.id);
        assert!(uploaded.join("stream.mpd").exists());
        assert!(uploaded.join("video/avc1/init.mp4").exists());
    }
}

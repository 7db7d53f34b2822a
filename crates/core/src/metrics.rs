//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Jobs (runs started and finished, status transitions)
//! - Stages (duration and failures per processing stage)
//! - Tools and uploads (Bento4 runs, transferred files and bytes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Job Metrics
// =============================================================================

/// Job runs started total.
pub static JOBS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("encoder_jobs_started_total", "Total job runs started").unwrap()
});

/// Job runs finished total by result.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encoder_jobs_finished_total", "Total job runs finished"),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Job run duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("encoder_job_duration_seconds", "Duration of job runs").buckets(
            vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0],
        ),
        &["result"],
    )
    .unwrap()
});

/// Persisted status transitions by target status.
pub static STATUS_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "encoder_status_transitions_total",
            "Total job status transitions persisted",
        ),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Stage Metrics
// =============================================================================

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "encoder_stage_duration_seconds",
            "Duration of job processing stages",
        )
        .buckets(vec![
            0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0,
        ]),
        &["stage", "result"], // result: "success", "failed"
    )
    .unwrap()
});

/// Stage failures total.
pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encoder_stage_failures_total", "Total stage failures"),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Tool and Upload Metrics
// =============================================================================

/// Packaging tool invocations by result.
pub static TOOL_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encoder_tool_runs_total", "Total packaging tool invocations"),
        &["tool", "result"], // result: "success", "failed", "timeout"
    )
    .unwrap()
});

/// Files uploaded total.
pub static FILES_UPLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "encoder_files_uploaded_total",
        "Total files uploaded to the destination",
    )
    .unwrap()
});

/// Bytes uploaded total.
pub static BYTES_UPLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "encoder_bytes_uploaded_total",
        "Total bytes uploaded to the destination",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_STARTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(STATUS_TRANSITIONS.clone()),
        // Stages
        Box::new(STAGE_DURATION.clone()),
        Box::new(STAGE_FAILURES.clone()),
        // Tools and uploads
        Box::new(TOOL_RUNS.clone()),
        Box::new(FILES_UPLOADED.clone()),
        Box::new(BYTES_UPLOADED.clone()),
    ]
}

//! Prometheus registry and textfile export.
//!
//! The encoder runs one job and exits, so metrics are written to a
//! node-exporter textfile instead of being scraped.

use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{self, Encoder, IntGauge, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Unix time of the last finished run.
pub static LAST_RUN_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "encoder_last_run_timestamp_seconds",
        "Unix time at which the last encoder run finished",
    )
    .unwrap()
});

/// Whether the last run completed its job (1) or not (0).
pub static LAST_RUN_SUCCESS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "encoder_last_run_success",
        "Whether the last encoder run completed its job",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(LAST_RUN_TIMESTAMP.clone()))
        .unwrap();
    registry
        .register(Box::new(LAST_RUN_SUCCESS.clone()))
        .unwrap();
    // Core metrics (jobs, stages, tools, uploads)
    for metric in encoder_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Record the outcome of this run.
pub fn record_run(success: bool, finished_at: i64) {
    LAST_RUN_SUCCESS.set(i64::from(success));
    LAST_RUN_TIMESTAMP.set(finished_at);
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}

/// Write the metrics to `path`, replacing it atomically.
pub fn write_textfile(path: &Path) -> Result<()> {
    let body = encode_metrics()?;
    let staging = path.with_extension("prom.tmp");
    std::fs::write(&staging, body)
        .with_context(|| format!("Failed to write {:?}", staging))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("Failed to move metrics into {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encode_includes_core_metrics() {
        encoder_core::metrics::JOBS_STARTED.inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("encoder_jobs_started_total"));
    }

    #[test]
    fn test_write_textfile() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encoder.prom");

        record_run(true, 1_700_000_000);
        write_textfile(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("encoder_last_run_success 1"));
        assert!(!dir.path().join("encoder.prom.tmp").exists());
    }
}

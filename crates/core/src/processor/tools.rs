//! Bento4 tool invocation.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::config::ToolsConfig;
use super::error::ProcessError;
use crate::metrics;

/// Name of the fragmentation tool.
pub const FRAGMENT_TOOL: &str = "mp4fragment";
/// Name of the DASH packaging tool.
pub const PACKAGE_TOOL: &str = "mp4dash";

/// Captured result of a successful tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Combined stdout and stderr.
    pub output: String,
    pub duration_ms: u64,
}

/// Runs the external media tools.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Rewrites `source` as a fragmented MP4 at `target`.
    async fn fragment(&self, source: &Path, target: &Path) -> Result<ToolOutput, ProcessError>;

    /// Packages `fragmented` into a segment-timeline DASH presentation under `output_dir`.
    async fn package(
        &self,
        fragmented: &Path,
        output_dir: &Path,
    ) -> Result<ToolOutput, ProcessError>;

    /// Validates that the tools are installed and runnable.
    async fn validate(&self) -> Result<(), ProcessError>;
}

/// [`ToolRunner`] backed by the Bento4 command line tools.
pub struct Bento4Tools {
    config: ToolsConfig,
}

impl Bento4Tools {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ToolsConfig::default())
    }

    /// Arguments for `mp4fragment <source> <target>`.
    pub fn fragment_args(source: &Path, target: &Path) -> Vec<String> {
        vec![
            source.to_string_lossy().to_string(),
            target.to_string_lossy().to_string(),
        ]
    }

    /// Arguments for `mp4dash`.
    pub fn package_args(&self, fragmented: &Path, output_dir: &Path) -> Vec<String> {
        vec![
            fragmented.to_string_lossy().to_string(),
            "--use-segment-timeline".to_string(),
            "-o".to_string(),
            output_dir.to_string_lossy().to_string(),
            "-f".to_string(), // Overwrite output
            "--exec-dir".to_string(),
            self.config.exec_dir.to_string_lossy().to_string(),
        ]
    }

    async fn run(
        &self,
        tool: &'static str,
        program: &Path,
        args: &[String],
    ) -> Result<ToolOutput, ProcessError> {
        let start = Instant::now();
        debug!("Running {} {:?}", program.display(), args);

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProcessError::ToolNotFound {
                        tool,
                        path: program.to_path_buf(),
                    }
                } else {
                    ProcessError::Io(e)
                }
            })?;

        // Dropping the wait future on timeout kills the child.
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let output = match timeout(timeout_duration, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                metrics::TOOL_RUNS.with_label_values(&[tool, "timeout"]).inc();
                return Err(ProcessError::Timeout {
                    tool,
                    timeout_secs: self.config.timeout_secs,
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let duration_ms = start.elapsed().as_millis() as u64;
        debug!("{} finished in {}ms: {}", tool, duration_ms, combined.trim());

        if !output.status.success() {
            metrics::TOOL_RUNS.with_label_values(&[tool, "failed"]).inc();
            return Err(ProcessError::tool_failed(tool, output.status, combined));
        }

        metrics::TOOL_RUNS.with_label_values(&[tool, "success"]).inc();
        Ok(ToolOutput {
            output: combined,
            duration_ms,
        })
    }

    async fn probe(tool: &'static str, program: &Path) -> Result<(), ProcessError> {
        let result = Command::new(program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        // Bento4 tools exit non-zero when printing usage, so only launch failures count.
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ProcessError::ToolNotFound {
                tool,
                path: program.to_path_buf(),
            }),
            Err(e) => Err(ProcessError::Io(e)),
        }
    }
}

#[async_trait]
impl ToolRunner for Bento4Tools {
    fn name(&self) -> &str {
        "bento4"
    }

    async fn fragment(&self, source: &Path, target: &Path) -> Result<ToolOutput, ProcessError> {
        let args = Self::fragment_args(source, target);
        self.run(FRAGMENT_TOOL, &self.config.fragment_path, &args)
            .await
    }

    async fn package(
        &self,
        fragmented: &Path,
        output_dir: &Path,
    ) -> Result<ToolOutput, ProcessError> {
        let args = self.package_args(fragmented, output_dir);
        self.run(PACKAGE_TOOL, &self.config.package_path, &args)
            .await
    }

    async fn validate(&self) -> Result<(), ProcessError> {
        Self::probe(FRAGMENT_TOOL, &self.config.fragment_path).await?;
        Self::probe(PACKAGE_TOOL, &self.config.package_path).await?;

        if !tokio::fs::try_exists(&self.config.exec_dir)
            .await
            .unwrap_or(false)
        {
            warn!(
                "Bento4 exec dir {} does not exist; mp4dash may fail",
                self.config.exec_dir.display()
            );
        }

        Ok(())
    }
}

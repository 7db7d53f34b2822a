//! Mock packaging tools for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::processor::{ProcessError, ToolOutput, ToolRunner, FRAGMENT_TOOL, PACKAGE_TOOL};

/// A recorded tool invocation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedToolCall {
    /// `mp4fragment` or `mp4dash`.
    pub tool: &'static str,
    /// The input file.
    pub input: PathBuf,
    /// The output file or directory.
    pub output: PathBuf,
    /// Whether the invocation succeeded.
    pub success: bool,
}

/// Mock implementation of the ToolRunner trait.
///
/// Writes plausible outputs instead of running Bento4: `fragment` creates the
/// target file, `package` fills the output directory with a manifest and a
/// nested segment tree.
///
/// # Example
///
/// ```rust,ignore
/// use encoder_core::testing::MockTools;
///
/// let tools = MockTools::new();
/// tools.fail_fragment_with(1, "ERROR: bad header").await;
///
/// // ... run a job ...
///
/// let calls = tools.recorded_calls().await;
/// assert_eq!(calls.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockTools {
    calls: Arc<RwLock<Vec<RecordedToolCall>>>,
    fragment_failure: Arc<RwLock<Option<(i32, String)>>>,
    package_failure: Arc<RwLock<Option<(i32, String)>>>,
    package_consumes_input: Arc<RwLock<bool>>,
}

impl MockTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded invocations.
    pub async fn recorded_calls(&self) -> Vec<RecordedToolCall> {
        self.calls.read().await.clone()
    }

    /// Make every `fragment` call exit with `code` and print `output`.
    pub async fn fail_fragment_with(&self, code: i32, output: impl Into<String>) {
        *self.fragment_failure.write().await = Some((code, output.into()));
    }

    /// Make every `package` call exit with `code` and print `output`.
    pub async fn fail_package_with(&self, code: i32, output: impl Into<String>) {
        *self.package_failure.write().await = Some((code, output.into()));
    }

    /// Make `package` delete the fragmented file after a successful run.
    pub async fn consume_input_on_package(&self) {
        *self.package_consumes_input.write().await = true;
    }

    async fn record(&self, tool: &'static str, input: &Path, output: &Path, success: bool) {
        self.calls.write().await.push(RecordedToolCall {
            tool,
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            success,
        });
    }

    fn failure(tool: &'static str, code: i32, output: &str) -> ProcessError {
        ProcessError::ToolFailed {
            tool,
            status: format!("exit code {}", code),
            output: output.to_string(),
        }
    }
}

#[async_trait]
impl ToolRunner for MockTools {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fragment(&self, source: &Path, target: &Path) -> Result<ToolOutput, ProcessError> {
        if let Some((code, output)) = self.fragment_failure.read().await.clone() {
            self.record(FRAGMENT_TOOL, source, target, false).await;
            return Err(Self::failure(FRAGMENT_TOOL, code, &output));
        }

        tokio::fs::write(target, b"moof").await?;
        self.record(FRAGMENT_TOOL, source, target, true).await;
        Ok(ToolOutput {
            output: String::new(),
            duration_ms: 0,
        })
    }

    async fn package(
        &self,
        fragmented: &Path,
        output_dir: &Path,
    ) -> Result<ToolOutput, ProcessError> {
        if let Some((code, output)) = self.package_failure.read().await.clone() {
            self.record(PACKAGE_TOOL, fragmented, output_dir, false).await;
            return Err(Self::failure(PACKAGE_TOOL, code, &output));
        }

        let segments = output_dir.join("video").join("avc1");
        tokio::fs::create_dir_all(&segments).await?;
        tokio::fs::write(output_dir.join("stream.mpd"), b"<MPD/>").await?;
        tokio::fs::write(segments.join("init.mp4"), b"init").await?;
        tokio::fs::write(segments.join("seg-1.m4s"), b"segment").await?;
        if *self.package_consumes_input.read().await {
            tokio::fs::remove_file(fragmented).await?;
        }

        self.record(PACKAGE_TOOL, fragmented, output_dir, true).await;
        Ok(ToolOutput {
            output: "Parsing media file 1\n".to_string(),
            duration_ms: 0,
        })
    }

    async fn validate(&self) -> Result<(), ProcessError> {
        Ok(())
    }
}

//! Error types for the processor module.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from running the fragmentation and packaging tools.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Tool binary not found.
    #[error("{tool} not found at path: {path}")]
    ToolNotFound { tool: &'static str, path: PathBuf },

    /// Tool exited unsuccessfully. `output` is its combined stdout and stderr.
    #[error("{tool} exited with {status}: {output}")]
    ToolFailed {
        tool: &'static str,
        status: String,
        output: String,
    },

    /// Tool did not exit in time and was killed.
    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: &'static str, timeout_secs: u64 },

    /// The working directory could not be created.
    #[error("Failed to create working directory {path}: {source}")]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while launching or reading a tool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    /// Creates a tool failed error from the exit status and captured output.
    pub fn tool_failed(
        tool: &'static str,
        status: std::process::ExitStatus,
        output: impl Into<String>,
    ) -> Self {
        let status = match status.code() {
            Some(code) => format!("exit code {}", code),
            None => "no exit code (terminated by signal)".to_string(),
        };
        Self::ToolFailed {
            tool,
            status,
            output: output.into().trim().to_string(),
        }
    }
}

/// Which working artifact a cleanup step targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    SourceFile,
    FragmentFile,
    OutputDirectory,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::SourceFile => write!(f, "source file"),
            Artifact::FragmentFile => write!(f, "fragmented file"),
            Artifact::OutputDirectory => write!(f, "output directory"),
        }
    }
}

/// Removing a working artifact failed.
#[derive(Debug, Error)]
#[error("Failed to remove {artifact} {path}: {source}")]
pub struct CleanupError {
    pub artifact: Artifact,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

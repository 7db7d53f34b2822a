//! Video processing: fetching the source, running the Bento4 tools, cleaning up.
//!
//! [`VideoProcessor`] performs one step at a time and knows nothing about job
//! status; sequencing and persistence belong to the orchestrator.

mod config;
mod error;
mod tools;
mod video;

pub use config::ToolsConfig;
pub use error::{Artifact, CleanupError, ProcessError};
pub use tools::{Bento4Tools, ToolOutput, ToolRunner, FRAGMENT_TOOL, PACKAGE_TOOL};
pub use video::VideoProcessor;

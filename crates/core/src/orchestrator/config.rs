//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;

/// Configuration for the job orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Working root holding `<id>.mp4`, `<id>.frag` and `<id>/`.
    pub work_dir: PathBuf,

    /// Maximum in-flight upload transfers (0 = number of CPUs).
    #[serde(default)]
    pub upload_concurrency: usize,

    /// Time allowed for the upload to report completion.
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,

    /// Time allowed for fetching the source.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

fn default_upload_timeout() -> u64 {
    3600 // 1 hour
}

fn default_download_timeout() -> u64 {
    1800 // 30 minutes
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("encoder"),
            upload_concurrency: 0,
            upload_timeout_secs: default_upload_timeout(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_work_dir(mut self, work_dir: PathBuf) -> Self {
        self.work_dir = work_dir;
        self
    }

    pub fn with_upload_concurrency(mut self, concurrency: usize) -> Self {
        self.upload_concurrency = concurrency;
        self
    }

    pub fn with_upload_timeout(mut self, timeout_secs: u64) -> Self {
        self.upload_timeout_secs = timeout_secs;
        self
    }

    pub fn with_download_timeout(mut self, timeout_secs: u64) -> Self {
        self.download_timeout_secs = timeout_secs;
        self
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            work_dir: config.workspace.local_storage_path.clone(),
            upload_concurrency: config.upload.concurrency,
            upload_timeout_secs: config.upload.timeout_secs,
            download_timeout_secs: config.storage.download_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.upload_concurrency, 0);
        assert_eq!(config.upload_timeout(), Duration::from_secs(3600));
        assert_eq!(config.download_timeout(), Duration::from_secs(1800));
    }

    #[test]
    fn test_from_root_config() {
        let mut root = Config::default();
        root.workspace.local_storage_path = PathBuf::from("/var/lib/encoder");
        root.upload.concurrency = 6;
        root.upload.timeout_secs = 120;

        let config = OrchestratorConfig::from(&root);
        assert_eq!(config.work_dir, PathBuf::from("/var/lib/encoder"));
        assert_eq!(config.upload_concurrency, 6);
        assert_eq!(config.upload_timeout_secs, 120);
    }

    #[test]
    fn test_builders() {
        let config = OrchestratorConfig::default()
            .with_upload_timeout(30)
            .with_download_timeout(5);
        assert_eq!(config.upload_timeout(), Duration::from_secs(30));
        assert_eq!(config.download_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: OrchestratorConfig = toml::from_str(r#"work_dir = "/tmp/w""#).unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/tmp/w"));
        assert_eq!(config.upload_timeout_secs, 3600);
    }
}

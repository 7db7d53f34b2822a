//! Configuration for the media tools.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the Bento4 fragmentation and packaging tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the mp4fragment binary.
    #[serde(default = "default_fragment_path")]
    pub fragment_path: PathBuf,

    /// Path to the mp4dash binary.
    #[serde(default = "default_package_path")]
    pub package_path: PathBuf,

    /// Directory mp4dash uses to find the other Bento4 binaries (`--exec-dir`).
    #[serde(default = "default_exec_dir")]
    pub exec_dir: PathBuf,

    /// Timeout for a single tool invocation in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_fragment_path() -> PathBuf {
    PathBuf::from("mp4fragment")
}

fn default_package_path() -> PathBuf {
    PathBuf::from("mp4dash")
}

fn default_exec_dir() -> PathBuf {
    PathBuf::from("/opt/bento4/bin/")
}

fn default_timeout() -> u64 {
    3600 // 1 hour
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fragment_path: default_fragment_path(),
            package_path: default_package_path(),
            exec_dir: default_exec_dir(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ToolsConfig {
    /// Creates a new config with custom tool paths.
    pub fn with_paths(fragment_path: PathBuf, package_path: PathBuf) -> Self {
        Self {
            fragment_path,
            package_path,
            ..Default::default()
        }
    }

    /// Sets the Bento4 binary directory.
    pub fn with_exec_dir(mut self, exec_dir: PathBuf) -> Self {
        self.exec_dir = exec_dir;
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ToolsConfig::default();
        assert_eq!(config.fragment_path, PathBuf::from("mp4fragment"));
        assert_eq!(config.package_path, PathBuf::from("mp4dash"));
        assert_eq!(config.exec_dir, PathBuf::from("/opt/bento4/bin/"));
        assert_eq!(config.timeout_secs, 3600);
    }

    #[test]
    fn test_config_builder() {
        let config = ToolsConfig::with_paths(
            PathBuf::from("/usr/local/bin/mp4fragment"),
            PathBuf::from("/usr/local/bin/mp4dash"),
        )
        .with_exec_dir(PathBuf::from("/usr/local/bin/"))
        .with_timeout(600);

        assert_eq!(
            config.fragment_path,
            PathBuf::from("/usr/local/bin/mp4fragment")
        );
        assert_eq!(config.exec_dir, PathBuf::from("/usr/local/bin/"));
        assert_eq!(config.timeout_secs, 600);
    }

    #[test]
    fn test_config_partial_toml() {
        let config: ToolsConfig = toml::from_str("timeout_secs = 90").unwrap();
        assert_eq!(config.timeout_secs, 90);
        assert_eq!(config.package_path, PathBuf::from("mp4dash"));
    }
}

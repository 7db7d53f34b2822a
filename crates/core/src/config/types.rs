use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::processor::ToolsConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Storage medium selection and input/output locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Which backend moves bytes in and out of the worker.
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// Input location: a bucket name, or a local directory for the filesystem backend.
    #[serde(default)]
    pub input: String,
    /// Output location: `bucket[/prefix]`, or a local directory for the filesystem backend.
    #[serde(default)]
    pub output: String,
    /// Download timeout in seconds (default: 1800)
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    /// S3 client settings (used when backend = "object_storage")
    #[serde(default)]
    pub object_storage: ObjectStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            input: String::new(),
            output: String::new(),
            download_timeout_secs: default_download_timeout(),
            object_storage: ObjectStorageConfig::default(),
        }
    }
}

fn default_download_timeout() -> u64 {
    1800
}

/// Available storage backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    ObjectStorage,
    #[default]
    Filesystem,
}

impl StorageBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObjectStorage => "object_storage",
            Self::Filesystem => "filesystem",
        }
    }
}

/// S3-compatible client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStorageConfig {
    /// Custom endpoint (e.g., "http://localhost:9000" for MinIO). None uses AWS.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Static credentials. When absent the default AWS provider chain is used.
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: default_region(),
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Local working area configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Root under which `<id>.mp4`, `<id>.frag` and `<id>/` are created.
    #[serde(default = "default_local_storage_path")]
    pub local_storage_path: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            local_storage_path: default_local_storage_path(),
        }
    }
}

fn default_local_storage_path() -> PathBuf {
    std::env::temp_dir().join("encoder")
}

/// Upload configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Maximum in-flight file transfers. 0 = number of available CPUs.
    #[serde(default)]
    pub concurrency: usize,
    /// Time allowed for the whole upload to report completion (default: 3600)
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: 0,
            timeout_secs: default_upload_timeout(),
        }
    }
}

fn default_upload_timeout() -> u64 {
    3600
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("encoder.db")
}

/// Metrics export configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Node-exporter textfile written after each run. Disabled when absent.
    #[serde(default)]
    pub textfile_path: Option<PathBuf>,
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub storage: SanitizedStorageConfig,
    pub workspace: WorkspaceConfig,
    pub upload: UploadConfig,
    pub tools: ToolsConfig,
    pub database: DatabaseConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub backend: String,
    pub input: String,
    pub output: String,
    pub download_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    pub region: String,
    pub credentials_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let object_storage = &config.storage.object_storage;
        Self {
            storage: SanitizedStorageConfig {
                backend: config.storage.backend.as_str().to_string(),
                input: config.storage.input.clone(),
                output: config.storage.output.clone(),
                download_timeout_secs: config.storage.download_timeout_secs,
                endpoint_url: object_storage.endpoint_url.clone(),
                region: object_storage.region.clone(),
                credentials_configured: object_storage.access_key_id.is_some()
                    && object_storage.secret_access_key.is_some(),
            },
            workspace: config.workspace.clone(),
            upload: config.upload.clone(),
            tools: config.tools.clone(),
            database: config.database.clone(),
            metrics: config.metrics.clone(),
        }
    }
}

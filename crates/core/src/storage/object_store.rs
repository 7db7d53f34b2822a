//! S3-compatible object storage backend.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::fs;
use tracing::{debug, info};

use super::error::{SchedulingError, TransferError};
use super::signal::CompletionSignal;
use super::traits::{FileSink, StorageGateway};
use super::upload::UploadCoordinator;
use crate::config::ObjectStorageConfig;
use crate::workspace::WorkingSet;

/// Storage backed by S3-compatible buckets.
#[derive(Clone)]
pub struct ObjectStorageBackend {
    client: Client,
    input_bucket: String,
    work_root: PathBuf,
}

impl ObjectStorageBackend {
    pub fn new(client: Client, input_bucket: impl Into<String>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            input_bucket: input_bucket.into(),
            work_root: work_root.into(),
        }
    }

    /// Builds the S3 client from configuration.
    ///
    /// Static credentials are used when configured, otherwise the default provider chain.
    pub async fn from_config(
        config: &ObjectStorageConfig,
        input_bucket: impl Into<String>,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style);

        if let Some(endpoint_url) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            builder = builder.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "encoder-config",
            ));
        }

        Self::new(Client::from_conf(builder.build()), input_bucket, work_root)
    }

    pub fn input_bucket(&self) -> &str {
        &self.input_bucket
    }
}

#[async_trait]
impl StorageGateway for ObjectStorageBackend {
    fn name(&self) -> &str {
        "object_storage"
    }

    async fn download(&self, video_id: &str, source_path: &str) -> Result<(), TransferError> {
        let key = source_path.trim_start_matches('/');
        let target = WorkingSet::new(&self.work_root, video_id).source_file();
        debug!("Downloading {}/{} to {}", self.input_bucket, key, target.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.input_bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                if e.into_service_error().is_no_such_key() {
                    TransferError::SourceNotFound {
                        location: format!("{}/{}", self.input_bucket, key),
                    }
                } else {
                    TransferError::object_storage("download", &self.input_bucket, key, message)
                }
            })?;

        fs::create_dir_all(&self.work_root)
            .await
            .map_err(|e| TransferError::DirectoryCreationFailed {
                path: self.work_root.clone(),
                source: e,
            })?;

        let mut body = response.body.into_async_read();
        let mut file = fs::File::create(&target).await?;
        let bytes = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| TransferError::object_storage("download", &self.input_bucket, key, e))?;

        info!(
            "Downloaded {}/{} to {} ({} bytes)",
            self.input_bucket,
            key,
            target.display(),
            bytes
        );
        Ok(())
    }

    async fn upload(
        &self,
        local_dir: &Path,
        destination: &str,
        concurrency: usize,
    ) -> Result<CompletionSignal, SchedulingError> {
        if !fs::metadata(local_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(SchedulingError::SourceNotDirectory {
                path: local_dir.to_path_buf(),
            });
        }

        let (bucket, prefix) = parse_destination(destination)?;
        let sink = Arc::new(BucketSink {
            client: self.client.clone(),
            bucket,
            prefix,
        });
        let coordinator = UploadCoordinator::new(concurrency);
        debug!(
            "Scheduling upload {} -> {} with {} concurrent transfers",
            local_dir.display(),
            destination,
            coordinator.concurrency()
        );
        Ok(coordinator.spawn(local_dir.to_path_buf(), sink))
    }
}

/// Splits `bucket[/prefix]` into its parts.
pub fn parse_destination(destination: &str) -> Result<(String, String), SchedulingError> {
    let trimmed = destination.trim().trim_matches('/');
    let (bucket, prefix) = match trimmed.split_once('/') {
        Some((bucket, prefix)) => (bucket, prefix.trim_matches('/')),
        None => (trimmed, ""),
    };

    if bucket.is_empty() {
        return Err(SchedulingError::invalid_destination(
            destination,
            "missing bucket name",
        ));
    }

    Ok((bucket.to_string(), prefix.to_string()))
}

/// Object key for a file at `relative` under `prefix`, always `/`-separated.
pub fn object_key(prefix: &str, relative: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !prefix.is_empty() {
        parts.push(prefix.to_string());
    }
    parts.extend(relative.components().filter_map(|c| match c {
        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
        _ => None,
    }));
    parts.join("/")
}

/// Content type for DASH output files.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mpd") => "application/dash+xml",
        Some("m4s") => "video/iso.segment",
        Some("mp4") => "video/mp4",
        Some("m4a") => "audio/mp4",
        Some("vtt") => "text/vtt",
        _ => "application/octet-stream",
    }
}

/// Puts files into a bucket under a key prefix.
struct BucketSink {
    client: Client,
    bucket: String,
    prefix: String,
}

#[async_trait]
impl FileSink for BucketSink {
    async fn create_dir(&self, _relative: &Path) -> Result<(), TransferError> {
        // Keys carry the full path; buckets need no directory objects.
        Ok(())
    }

    async fn put_file(&self, local: &Path, relative: &Path) -> Result<u64, TransferError> {
        let key = object_key(&self.prefix, relative);
        let size = fs::metadata(local).await?.len();
        let body = ByteStream::from_path(local)
            .await
            .map_err(|e| TransferError::object_storage("upload", &self.bucket, &key, e))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .content_type(content_type_for(local))
            .send()
            .await
            .map_err(|e| {
                TransferError::object_storage("upload", &self.bucket, &key, DisplayErrorContext(&e))
            })?;

        debug!("Uploaded {} to {}/{}", local.display(), self.bucket, key);
        Ok(size)
    }
}

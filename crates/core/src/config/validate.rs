use super::{types::Config, ConfigError, StorageBackendKind};

/// Upper bound on in-flight upload transfers.
const MAX_UPLOAD_CONCURRENCY: usize = 1024;

/// Validate configuration
/// Currently validates:
/// - Input and output locations are set
/// - Object storage output has a bucket segment
/// - Static credentials come in pairs
/// - Timeouts are non-zero and concurrency is bounded
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let storage = &config.storage;

    if storage.input.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.input must be set".to_string(),
        ));
    }

    if storage.output.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.output must be set".to_string(),
        ));
    }

    if storage.backend == StorageBackendKind::ObjectStorage {
        if storage.output.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "storage.output must start with a bucket name, got {:?}",
                storage.output
            )));
        }

        let object_storage = &storage.object_storage;
        if object_storage.access_key_id.is_some() != object_storage.secret_access_key.is_some() {
            return Err(ConfigError::ValidationError(
                "storage.object_storage access_key_id and secret_access_key must be set together"
                    .to_string(),
            ));
        }
    }

    if storage.download_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "storage.download_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.upload.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "upload.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.upload.concurrency > MAX_UPLOAD_CONCURRENCY {
        return Err(ConfigError::ValidationError(format!(
            "upload.concurrency cannot exceed {}",
            MAX_UPLOAD_CONCURRENCY
        )));
    }

    if config.tools.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "tools.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

pub mod config;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod processor;
pub mod storage;
pub mod testing;
pub mod workspace;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig, StorageBackendKind,
};
pub use job::{
    Job, JobRepository, JobStatus, PersistenceError, SqliteStore, Video, VideoRepository,
};
pub use orchestrator::{JobError, JobOrchestrator, OrchestratorConfig};
pub use processor::{Bento4Tools, ToolRunner, ToolsConfig, VideoProcessor};
pub use storage::{
    CompletionSignal, FilesystemBackend, ObjectStorageBackend, StorageBackend, StorageGateway,
    UploadCoordinator, UploadOutcome,
};
pub use workspace::WorkingSet;

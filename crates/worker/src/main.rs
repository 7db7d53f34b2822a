mod cli;
mod metrics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use encoder_core::{
    load_config, load_config_from_env, validate_config, Bento4Tools, Config, ConfigError,
    JobOrchestrator, JobStatus, OrchestratorConfig, SanitizedConfig, SqliteStore, StorageBackend,
    StorageGateway, ToolRunner, Video,
};

use cli::Args;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the job completed.
async fn run() -> Result<bool> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse(std::env::args().skip(1))?;
    info!("encoder {} starting", VERSION);

    let config = load(&config_path())?;
    validate_config(&config).context("Configuration validation failed")?;
    info!(
        "Configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    let store = SqliteStore::new(&config.database.path)
        .with_context(|| format!("Failed to open database {:?}", config.database.path))?;
    info!("Job store initialized at {:?}", config.database.path);

    let storage = Arc::new(StorageBackend::from_config(&config).await);
    info!("Storage backend: {}", storage.name());

    let tools = Arc::new(Bento4Tools::new(config.tools.clone()));
    tools
        .validate()
        .await
        .context("Packaging tools are not available")?;

    let orchestrator = JobOrchestrator::new(
        OrchestratorConfig::from(&config),
        storage,
        tools,
        Arc::new(store.jobs()),
        Arc::new(store.videos()),
    );

    let video = Video::new(args.source_path, args.resource_id);
    let (job, video) = orchestrator
        .create_job(video, &config.storage.output)
        .context("Failed to register job")?;

    let completed = match orchestrator.start(job, &video).await {
        Ok(job) => {
            info!("Job {} finished with status {}", job.id, job.status);
            job.status == JobStatus::Completed
        }
        Err(e) => {
            error!("Job for video {} failed: {}", video.id, e);
            false
        }
    };

    metrics::record_run(completed, chrono::Utc::now().timestamp());
    if let Some(path) = &config.metrics.textfile_path {
        if let Err(e) = metrics::write_textfile(path) {
            warn!("Could not write metrics: {:#}", e);
        }
    }

    Ok(completed)
}

fn config_path() -> PathBuf {
    std::env::var("ENCODER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}

/// Loads the config file, or only the environment when there is no file.
fn load(path: &Path) -> Result<Config> {
    info!("Loading configuration from {:?}", path);
    match load_config(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            info!("No configuration file, using environment only");
            load_config_from_env().context("Failed to load configuration from environment")
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load config from {:?}", path)),
    }
}

//! Bounded-concurrency recursive upload of a working directory.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, TryStreamExt};
use tracing::{debug, info, warn};

use super::error::TransferError;
use super::signal::{CompletionSignal, UploadOutcome};
use super::traits::FileSink;
use crate::metrics;

/// Resolves a concurrency hint; 0 means one transfer per available CPU.
pub fn resolve_concurrency(hint: usize) -> usize {
    if hint > 0 {
        return hint;
    }
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Directories and regular files found under an upload root, relative to it.
///
/// Directories are listed parents first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPlan {
    pub directories: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// Totals of a finished upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

/// Drives a [`FileSink`] over a directory tree with at most N files in flight.
#[derive(Debug, Clone)]
pub struct UploadCoordinator {
    concurrency: usize,
}

impl UploadCoordinator {
    pub fn new(concurrency_hint: usize) -> Self {
        Self {
            concurrency: resolve_concurrency(concurrency_hint),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Walks `root`, recording directories and regular files. Other entry types are skipped.
    pub async fn plan(root: &Path) -> Result<UploadPlan, TransferError> {
        let mut plan = UploadPlan::default();
        let mut pending = vec![PathBuf::new()];

        while let Some(relative) = pending.pop() {
            let mut entries = tokio::fs::read_dir(root.join(&relative)).await?;
            let mut children = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                children.push((entry.file_name(), entry.file_type().await?));
            }
            children.sort_by(|a, b| a.0.cmp(&b.0));

            for (name, file_type) in children {
                let child = relative.join(name);
                if file_type.is_dir() {
                    plan.directories.push(child.clone());
                    pending.push(child);
                } else if file_type.is_file() {
                    plan.files.push(child);
                } else {
                    debug!(
                        "Skipping {}: not a regular file or directory",
                        root.join(&child).display()
                    );
                }
            }
        }

        Ok(plan)
    }

    /// Recreates the directory tree, then transfers every file.
    ///
    /// The first failing transfer stops the upload; files still queued are not sent.
    pub async fn transfer<K: FileSink>(
        &self,
        root: &Path,
        sink: Arc<K>,
    ) -> Result<UploadSummary, TransferError> {
        let plan = Self::plan(root).await?;
        debug!(
            "Upload plan for {}: {} directories, {} files",
            root.display(),
            plan.directories.len(),
            plan.files.len()
        );

        for directory in &plan.directories {
            sink.create_dir(directory).await?;
        }

        let bytes = AtomicU64::new(0);
        let sink = sink.as_ref();
        stream::iter(plan.files.iter().map(Ok::<_, TransferError>))
            .try_for_each_concurrent(self.concurrency, |relative| {
                let local = root.join(relative);
                let bytes = &bytes;
                async move {
                    let written = sink.put_file(&local, relative).await?;
                    bytes.fetch_add(written, Ordering::Relaxed);
                    metrics::FILES_UPLOADED.inc();
                    metrics::BYTES_UPLOADED.inc_by(written);
                    Ok(())
                }
            })
            .await?;

        Ok(UploadSummary {
            directories: plan.directories.len(),
            files: plan.files.len(),
            bytes: bytes.load(Ordering::Relaxed),
        })
    }

    /// Runs [`transfer`](Self::transfer) on a new task and returns its completion signal.
    pub fn spawn<K: FileSink>(self, root: PathBuf, sink: Arc<K>) -> CompletionSignal {
        let (sender, signal) = CompletionSignal::channel();
        let task = tokio::spawn(async move {
            let start = Instant::now();
            let outcome = match self.transfer(&root, sink).await {
                Ok(summary) => {
                    info!(
                        "Uploaded {} files ({} bytes) from {} in {:?}",
                        summary.files,
                        summary.bytes,
                        root.display(),
                        start.elapsed()
                    );
                    UploadOutcome::Completed
                }
                Err(e) => {
                    warn!("Upload from {} failed: {}", root.display(), e);
                    UploadOutcome::failed(e.to_string())
                }
            };
            sender.send(outcome);
        });
        signal.with_task(task)
    }
}

//! One-shot completion signal for scheduled uploads.

use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;

/// Message reported when every file was transferred.
pub const UPLOAD_COMPLETED: &str = "upload completed";

const ABANDONED: &str = "upload task ended without reporting an outcome";

/// The single value an upload reports when it settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed,
    /// Carries a non-empty description of the first error.
    Failed(String),
}

impl UploadOutcome {
    /// A failed outcome. Empty messages are replaced so the error is never blank.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            Self::Failed("upload failed".to_string())
        } else {
            Self::Failed(message)
        }
    }

    /// Interprets a raw completion message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message == UPLOAD_COMPLETED {
            Self::Completed
        } else {
            Self::failed(message)
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Completed => UPLOAD_COMPLETED,
            Self::Failed(message) => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Producer half. Consumed by [`CompletionSender::send`], so at most one value is ever sent.
#[derive(Debug)]
pub struct CompletionSender {
    tx: oneshot::Sender<UploadOutcome>,
}

impl CompletionSender {
    /// Reports the outcome. Returns false if the signal was already dropped.
    pub fn send(self, outcome: UploadOutcome) -> bool {
        self.tx.send(outcome).is_ok()
    }
}

/// Consumer half handed back by `StorageGateway::upload`.
///
/// Holds the transfer task so the stage that awaits the signal also owns the task.
/// Dropping the signal aborts a task that is still running.
#[derive(Debug)]
pub struct CompletionSignal {
    rx: oneshot::Receiver<UploadOutcome>,
    task: Option<JoinHandle<()>>,
}

impl CompletionSignal {
    pub fn channel() -> (CompletionSender, CompletionSignal) {
        let (tx, rx) = oneshot::channel();
        (
            CompletionSender { tx },
            CompletionSignal { rx, task: None },
        )
    }

    /// A signal that has already settled.
    pub fn ready(outcome: UploadOutcome) -> Self {
        let (sender, signal) = Self::channel();
        sender.send(outcome);
        signal
    }

    /// Attach the task producing the outcome.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Wait for the outcome, then join the transfer task.
    pub async fn wait(mut self) -> UploadOutcome {
        let received = (&mut self.rx).await;
        self.settle(received).await
    }

    /// Like [`wait`](Self::wait), but aborts the transfer task if nothing arrives in `limit`.
    pub async fn wait_timeout(mut self, limit: Duration) -> Result<UploadOutcome, Elapsed> {
        match tokio::time::timeout(limit, &mut self.rx).await {
            Ok(received) => Ok(self.settle(received).await),
            Err(elapsed) => {
                if let Some(task) = self.task.take() {
                    task.abort();
                }
                Err(elapsed)
            }
        }
    }

    async fn settle(
        &mut self,
        received: Result<UploadOutcome, oneshot::error::RecvError>,
    ) -> UploadOutcome {
        let joined = match self.task.take() {
            Some(task) => task.await,
            None => Ok(()),
        };

        match (received, joined) {
            (Ok(outcome), _) => outcome,
            (Err(_), Err(join_error)) => {
                UploadOutcome::failed(format!("upload task failed: {}", join_error))
            }
            (Err(_), Ok(())) => UploadOutcome::failed(ABANDONED),
        }
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

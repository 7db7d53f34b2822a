//! Job orchestration: the status state machine over the processing stages.
//!
//! ```text
//! CREATED -> DOWNLOADING -> FRAGMENTING -> ENCODING -> UPLOADING -> FINISHING -> COMPLETED
//!                  any failure (stage work or status persistence) -> FAILED
//! ```

mod config;
mod error;
mod runner;

pub use config::OrchestratorConfig;
pub use error::JobError;
pub use runner::JobOrchestrator;

//! Job records, the status state machine, and their persistence.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::{SqliteJobRepository, SqliteStore, SqliteVideoRepository};
pub use store::{JobRepository, PersistenceError, VideoRepository};
pub use types::{Job, JobStatus, TransitionError, ValidationError, Video};

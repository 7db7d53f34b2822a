//! SQLite-backed job and video repositories.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, Connection, ErrorCode};

use super::{
    Job, JobRepository, JobStatus, PersistenceError, TransitionError, Video, VideoRepository,
};

/// Shared SQLite database holding the `videos` and `jobs` tables.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the database file, creating it and the tables if needed.
    pub fn new(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path).map_err(PersistenceError::database)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(PersistenceError::database)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn jobs(&self) -> SqliteJobRepository {
        SqliteJobRepository {
            conn: Arc::clone(&self.conn),
        }
    }

    pub fn videos(&self) -> SqliteVideoRepository {
        SqliteVideoRepository {
            conn: Arc::clone(&self.conn),
        }
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PersistenceError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS videos (
                id TEXT PRIMARY KEY,
                resource_id TEXT NOT NULL DEFAULT '',
                file_path TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                video_id TEXT NOT NULL REFERENCES videos(id),
                output_path TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_video_id ON jobs(video_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            "#,
        )
        .map_err(PersistenceError::database)
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
    conn.lock()
        .map_err(|_| PersistenceError::database("connection lock poisoned"))
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Maps constraint violations on insert to domain errors.
fn insert_error(kind: &'static str, id: &str, err: rusqlite::Error) -> PersistenceError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        if failure.code == ErrorCode::ConstraintViolation {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return PersistenceError::AlreadyExists {
                        kind,
                        id: id.to_string(),
                    }
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return PersistenceError::database(format!(
                        "{} {} references an unknown video",
                        kind, id
                    ))
                }
                _ => {}
            }
        }
    }
    PersistenceError::database(err)
}

/// Job repository over a [`SqliteStore`].
pub struct SqliteJobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobRepository {
    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let status: String = row.get(3)?;
        let status = status.parse::<JobStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        Ok(Job {
            id: row.get(0)?,
            video_id: row.get(1)?,
            output_path: row.get(2)?,
            status,
            error: row.get(4)?,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn get(conn: &Connection, id: &str) -> Result<Option<Job>, PersistenceError> {
        let result = conn.query_row(
            "SELECT id, video_id, output_path, status, error, created_at, updated_at FROM jobs WHERE id = ?",
            params![id],
            Self::row_to_job,
        );

        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::database(e)),
        }
    }
}

impl JobRepository for SqliteJobRepository {
    fn insert(&self, job: Job) -> Result<Job, PersistenceError> {
        job.check_invariants()?;
        let conn = lock(&self.conn)?;

        conn.execute(
            "INSERT INTO jobs (id, video_id, output_path, status, error, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                job.id,
                job.video_id,
                job.output_path,
                job.status.as_str(),
                job.error,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| insert_error("job", &job.id, e))?;

        Ok(job)
    }

    fn find(&self, id: &str) -> Result<Option<Job>, PersistenceError> {
        let conn = lock(&self.conn)?;
        Self::get(&conn, id)
    }

    fn update(&self, job: Job) -> Result<Job, PersistenceError> {
        job.check_invariants()?;
        let conn = lock(&self.conn)?;

        let current = Self::get(&conn, &job.id)?
            .ok_or_else(|| PersistenceError::job_not_found(&job.id))?;

        let rewrite = current.status == job.status && !current.status.is_terminal();
        if !rewrite && !current.status.can_transition_to(job.status) {
            return Err(TransitionError {
                job_id: job.id.clone(),
                from: current.status,
                to: job.status,
            }
            .into());
        }

        conn.execute(
            "UPDATE jobs SET status = ?, error = ?, output_path = ?, updated_at = ? WHERE id = ?",
            params![
                job.status.as_str(),
                job.error,
                job.output_path,
                job.updated_at.to_rfc3339(),
                job.id,
            ],
        )
        .map_err(PersistenceError::database)?;

        Ok(Job {
            created_at: current.created_at,
            ..job
        })
    }
}

/// Video repository over a [`SqliteStore`].
pub struct SqliteVideoRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VideoRepository for SqliteVideoRepository {
    fn insert(&self, video: Video) -> Result<Video, PersistenceError> {
        video.validate()?;
        let conn = lock(&self.conn)?;

        conn.execute(
            "INSERT INTO videos (id, resource_id, file_path, created_at) VALUES (?, ?, ?, ?)",
            params![
                video.id,
                video.resource_id,
                video.file_path,
                video.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| insert_error("video", &video.id, e))?;

        Ok(video)
    }

    fn find(&self, id: &str) -> Result<Option<Video>, PersistenceError> {
        let conn = lock(&self.conn)?;

        let result = conn.query_row(
            "SELECT id, resource_id, file_path, created_at FROM videos WHERE id = ?",
            params![id],
            |row| {
                let created_at: String = row.get(3)?;
                Ok(Video {
                    id: row.get(0)?,
                    resource_id: row.get(1)?,
                    file_path: row.get(2)?,
                    created_at: parse_timestamp(&created_at),
                })
            },
        );

        match result {
            Ok(video) => Ok(Some(video)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::database(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    fn insert_video(store: &SqliteStore) -> Video {
        store
            .videos()
            .insert(Video::new("incoming/sample.mp4", "res-42"))
            .unwrap()
    }

    #[test]
    fn test_insert_and_find_video() {
        let store = create_test_store();
        let video = insert_video(&store);

        let found = store.videos().find(&video.id).unwrap().unwrap();
        assert_eq!(found.file_path, "incoming/sample.mp4");
        assert_eq!(found.resource_id, "res-42");
    }

    #[test]
    fn test_insert_duplicate_video() {
        let store = create_test_store();
        let video = insert_video(&store);

        let result = store.videos().insert(video);
        assert!(matches!(
            result,
            Err(PersistenceError::AlreadyExists { kind: "video", .. })
        ));
    }

    #[test]
    fn test_insert_invalid_video_rejected() {
        let store = create_test_store();
        let mut video = Video::new("incoming/sample.mp4", "");
        video.id = "nested/id".to_string();

        let result = store.videos().insert(video);
        assert!(matches!(result, Err(PersistenceError::InvalidRecord(_))));
    }

    #[test]
    fn test_insert_and_find_job() {
        let store = create_test_store();
        let video = insert_video(&store);
        let job = store
            .jobs()
            .insert(Job::new(&video.id, "dash-bucket"))
            .unwrap();

        let found = store.jobs().find(&job.id).unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Created);
        assert_eq!(found.video_id, video.id);
        assert_eq!(found.output_path, "dash-bucket");
        assert!(found.error.is_empty());
    }

    #[test]
    fn test_job_requires_existing_video() {
        let store = create_test_store();
        let result = store.jobs().insert(Job::new("missing-video", "dash-bucket"));
        assert!(matches!(result, Err(PersistenceError::Database(_))));
    }

    #[test]
    fn test_find_missing_job() {
        let store = create_test_store();
        assert!(store.jobs().find("nope").unwrap().is_none());
    }

    #[test]
    fn test_update_follows_state_machine() {
        let store = create_test_store();
        let video = insert_video(&store);
        let jobs = store.jobs();
        let mut job = jobs.insert(Job::new(&video.id, "out")).unwrap();

        for status in JobStatus::PIPELINE {
            job = jobs.update(job.transition(status).unwrap()).unwrap();
            assert_eq!(jobs.find(&job.id).unwrap().unwrap().status, status);
        }
    }

    #[test]
    fn test_update_rejects_skipped_status() {
        let store = create_test_store();
        let video = insert_video(&store);
        let jobs = store.jobs();
        let job = jobs.insert(Job::new(&video.id, "out")).unwrap();

        let mut skipped = job.clone();
        skipped.status = JobStatus::Encoding;
        let result = jobs.update(skipped);
        assert!(matches!(result, Err(PersistenceError::InvalidTransition(_))));
    }

    #[test]
    fn test_failed_job_cannot_be_resurrected() {
        let store = create_test_store();
        let video = insert_video(&store);
        let jobs = store.jobs();
        let job = jobs.insert(Job::new(&video.id, "out")).unwrap();
        let job = jobs.update(job.transition(JobStatus::Downloading).unwrap()).unwrap();
        let failed = jobs.update(job.fail("source missing").unwrap()).unwrap();

        let stored = jobs.find(&failed.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error, "source missing");

        let mut revived = stored.clone();
        revived.status = JobStatus::Fragmenting;
        revived.error.clear();
        assert!(matches!(
            jobs.update(revived),
            Err(PersistenceError::InvalidTransition(_))
        ));

        // Rewriting a terminal record is not allowed either.
        assert!(jobs.update(stored).is_err());
    }

    #[test]
    fn test_update_missing_job() {
        let store = create_test_store();
        let job = Job::new("video", "out").transition(JobStatus::Downloading).unwrap();
        assert!(matches!(
            store.jobs().update(job),
            Err(PersistenceError::NotFound { kind: "job", .. })
        ));
    }

    #[test]
    fn test_store_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encoder.db");

        let job_id = {
            let store = SqliteStore::new(&path).unwrap();
            let video = insert_video(&store);
            store.jobs().insert(Job::new(&video.id, "out")).unwrap().id
        };

        let reopened = SqliteStore::new(&path).unwrap();
        assert!(reopened.jobs().find(&job_id).unwrap().is_some());
    }
}

//! SQLite audit log, one row per completed job.
//!
//! Rows are only ever inserted. The connection sits behind a mutex, so
//! concurrent appends (pipeline) and reads (HTTP control surface) are
//! serialized.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::gateway::AuditSink;
use crate::job_types::JobRecord;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transformations (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    path          TEXT    NOT NULL,
    radius        INTEGER NOT NULL,
    elapsed_ms    INTEGER NOT NULL,
    source_digest TEXT,
    recorded_at   INTEGER NOT NULL
);
";

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to create audit directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open audit database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to append audit record: {0}")]
    Write(#[source] rusqlite::Error),
    #[error("failed to query audit log: {0}")]
    Query(#[source] rusqlite::Error),
    #[error("audit log lock poisoned")]
    LockPoisoned,
}

/// A row read back from the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredJob {
    pub id: i64,
    pub path: String,
    pub radius: u32,
    pub elapsed_ms: u64,
    pub source_digest: Option<String>,
    /// Unix ms assigned when the row was written.
    pub recorded_at: i64,
}

pub struct AuditLog {
    conn: Mutex<Connection>,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl AuditLog {
    /// Open (or create) the database at `path` and ensure the table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AuditError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let open_err = |source| AuditError::Open {
            path: path.to_path_buf(),
            source,
        };
        let conn = Connection::open(path).map_err(open_err)?;
        conn.execute_batch(SCHEMA).map_err(open_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Throwaway log for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, AuditError> {
        let open_err = |source| AuditError::Open {
            path: PathBuf::from(":memory:"),
            source,
        };
        let conn = Connection::open_in_memory().map_err(open_err)?;
        conn.execute_batch(SCHEMA).map_err(open_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert one row and return its id.
    pub fn insert(&self, record: &JobRecord) -> Result<i64, AuditError> {
        let conn = self.conn.lock().map_err(|_| AuditError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO transformations (path, radius, elapsed_ms, source_digest, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.path.to_string_lossy().into_owned(),
                record.radius.get(),
                record.elapsed_ms as i64,
                record.source_digest,
                now_ms(),
            ],
        )
        .map_err(AuditError::Write)?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent rows first.
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredJob>, AuditError> {
        let conn = self.conn.lock().map_err(|_| AuditError::LockPoisoned)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, path, radius, elapsed_ms, source_digest, recorded_at
                 FROM transformations ORDER BY id DESC LIMIT ?1",
            )
            .map_err(AuditError::Query)?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(StoredJob {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    radius: row.get(2)?,
                    elapsed_ms: row.get::<_, i64>(3)? as u64,
                    source_digest: row.get(4)?,
                    recorded_at: row.get(5)?,
                })
            })
            .map_err(AuditError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(AuditError::Query)
    }

    pub fn count(&self) -> Result<u64, AuditError> {
        let conn = self.conn.lock().map_err(|_| AuditError::LockPoisoned)?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM transformations", [], |row| row.get(0))
            .map_err(AuditError::Query)?;
        Ok(n as u64)
    }
}

impl AuditSink for AuditLog {
    fn append(&self, record: &JobRecord) -> Result<(), AuditError> {
        let id = self.insert(record)?;
        tracing::trace!(id, path = %record.path.display(), "audit row written");
        Ok(())
    }
}

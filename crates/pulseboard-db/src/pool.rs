//! SQLite connection handling.
//!
//! The database is owned by the external tracker CLI; we open it read-only
//! and treat every read as a point-in-time snapshot. A single connection
//! behind a mutex is enough since snapshot reads are short and serialized
//! by the refresh scheduler anyway.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] rusqlite::Error),

    #[error("Database not found: {0}")]
    NotFound(String),

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Read-only handle to the issue database.
#[derive(Debug)]
pub struct DbPool {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl DbPool {
    /// Open the database read-only.
    ///
    /// Fails if the file does not exist; a missing database is a fatal
    /// startup error, not something to silently create.
    pub fn open(path: &Path) -> DbResult<Self> {
        if !path.exists() {
            return Err(DbError::NotFound(path.display().to_string()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_millis(250))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Path this pool was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a closure with the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
        let conn = self.conn.lock().expect("db connection mutex poisoned");
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = DbPool::open(&dir.path().join("absent.db")).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn test_open_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE issues (id TEXT PRIMARY KEY)")
            .unwrap();

        let pool = DbPool::open(&path).unwrap();
        let result = pool.with_conn(|conn| {
            conn.execute("INSERT INTO issues (id) VALUES ('x')", [])?;
            Ok(())
        });
        assert!(result.is_err());
    }
}

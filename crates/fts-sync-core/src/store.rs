//! Shared SQLite connection.
//!
//! The engine works against a single connection guarded by a mutex. Each
//! caller locks for the duration of its own statement sequence; nothing else
//! in the engine adds locking on top of this.

use crate::error::{FtsError, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Cheaply cloneable handle to the shared connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| FtsError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(&db_path).map_err(|e| FtsError::Database {
            message: format!("Failed to open database {}: {}", db_path.display(), e),
            source: Some(e),
        })?;
        Self::configure_connection(&conn)?;
        debug!("Opened store at {}", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Some(db_path),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: None,
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )?;
        Ok(())
    }

    /// Database path, `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Acquire the connection.
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| FtsError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }

    /// Run a closure with the connection held.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Whether a table (regular or virtual) with this exact name exists.
    pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
        Self::object_exists(conn, "table", name)
    }

    /// Whether a trigger with this exact name exists.
    pub fn trigger_exists(conn: &Connection, name: &str) -> Result<bool> {
        Self::object_exists(conn, "trigger", name)
    }

    /// Creation SQL of a table, matched case-insensitively as SQLite resolves names.
    pub fn table_sql(conn: &Connection, name: &str) -> Result<Option<String>> {
        let sql = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type='table' AND name=?1 COLLATE NOCASE",
                [name],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(sql.flatten())
    }

    fn object_exists(conn: &Connection, kind: &str, name: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type=?1 AND name=?2",
            [kind, name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

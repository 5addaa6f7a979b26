//! Database connection and initialization
//!
//! Handles the shared SQLite connection and database setup

use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use super::schema;
use crate::error::{IpamError, IpamResult};

/// Database wrapper with thread-safe connection
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Opens (or creates) the database file and applies the schema
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file (created if not exists)
    pub fn new(path: PathBuf) -> IpamResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                IpamError::Storage(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(&path)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };
        db.initialize()?;

        Ok(db)
    }

    /// Creates an in-memory database (for testing)
    pub fn in_memory() -> IpamResult<Self> {
        let conn = Connection::open_in_memory()?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        };
        db.initialize()?;

        Ok(db)
    }

    fn initialize(&self) -> IpamResult<()> {
        let conn = self.lock()?;
        schema::create_tables(&conn)
    }

    /// Locks the shared connection.
    pub fn lock(&self) -> IpamResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| IpamError::Storage("Database connection lock poisoned".to_string()))
    }

    /// Runs `f` inside a savepoint. Any error rolls back everything `f` wrote.
    ///
    /// The connection lock is held for the whole closure, so concurrent
    /// callers on the same `Database` are serialized.
    pub fn transaction<T, F>(&self, name: &str, f: F) -> IpamResult<T>
    where
        F: FnOnce(&Connection) -> IpamResult<T>,
    {
        let conn = self.lock()?;
        conn.execute_batch(&format!("SAVEPOINT {}", name))?;

        match f(&conn) {
            Ok(value) => {
                conn.execute_batch(&format!("RELEASE SAVEPOINT {}", name))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = conn.execute_batch(&format!(
                    "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"
                )) {
                    tracing::error!("Rollback of savepoint {} failed: {}", name, rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Get database path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Get default database path for the application
    pub fn default_path() -> PathBuf {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("ipam-core").join("ipam.db")
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            path: self.path.clone(),
        }
    }
}

pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Durable backing store for permissions, files, versions, comments and
/// the activity log. One connection, serialized behind a mutex.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database; every call yields an isolated instance.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits when `f` returns `Ok`, rolls
    /// back otherwise, so a failed operation leaves no partial writes.
    pub fn transaction<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| E::from(anyhow!("DB lock poisoned: {}", e)))?;
        let tx = conn
            .transaction()
            .map_err(|e| E::from(anyhow::Error::from(e)))?;
        let value = f(&tx)?;
        tx.commit().map_err(|e| E::from(anyhow::Error::from(e)))?;
        Ok(value)
    }
}

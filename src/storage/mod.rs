//! SQLite database shared by the record and conversation stores
//!
//! A single connection guarded by an async mutex. Every store operation
//! takes the lock for the duration of one statement (or one transaction),
//! so conditional writes such as `UPDATE ... WHERE status = 'pending'` are
//! the only synchronisation the stores need.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

pub const SCHEMA_VERSION: i64 = 2;

/// Shared database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (and migrate) a database file, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Acquire the connection
    pub async fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// Current schema version
    pub async fn schema_version(&self) -> Result<i64> {
        let conn = self.conn().await;
        schema_version(&conn)
    }
}

/// Timestamps are stored as Unix milliseconds
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn schema_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

fn migrate(conn: &Connection) -> Result<()> {
    let mut current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(Error::Config(format!(
            "unsupported schema version {}, max supported {}",
            current, SCHEMA_VERSION
        )));
    }

    if current < 1 {
        conn.execute_batch(include_str!("../../migrations/0001_records.sql"))?;
        conn.execute_batch("PRAGMA user_version = 1")?;
        current = 1;
    }

    if current < 2 {
        conn.execute_batch(include_str!("../../migrations/0002_conversation.sql"))?;
        conn.execute_batch("PRAGMA user_version = 2")?;
    }

    Ok(())
}

// SPDX-License-Identifier: MPL-2.0

use crate::api::ProblemStatus;
use crate::store::StoreError;
use crate::store::schema::SCHEMA;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Shared handle to the row store. Cloning is cheap; every clone talks to the
/// same connection, and the mutex serializes all access to it.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Path(format!("failed to create data dir: {}", e)))?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        debug!(path = %path.display(), "opened database");
        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests and throwaway servers
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run schema migrations
    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        // All CREATE IF NOT EXISTS
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Access connection for operations
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves nothing half-applied: every multi-row
        // write runs in a transaction that rolls back on drop.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current unix timestamp in milliseconds
    pub fn now() -> i64 {
        Utc::now().timestamp_millis()
    }
}

pub(crate) fn to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

pub(crate) fn to_status(raw: &str) -> Result<ProblemStatus, StoreError> {
    raw.parse()
        .map_err(|e: crate::api::UnknownStatus| StoreError::Corrupt(e.to_string()))
}

//! Connection pool for blocking store workers.
//!
//! Each store call runs on a blocking worker that acquires one connection
//! for the duration of the call. Connections are opened lazily and returned
//! to the pool when the guard drops; there is no global registry.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::error::{StoreError, StoreResult};

pub(crate) struct ConnectionPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

impl ConnectionPool {
    /// Open the pool, verifying the database is reachable by opening one
    /// connection eagerly.
    pub(crate) fn open(path: impl AsRef<Path>) -> StoreResult<Arc<Self>> {
        let pool = Arc::new(Self {
            path: path.as_ref().to_path_buf(),
            idle: Mutex::new(Vec::new()),
        });
        let conn = pool.open_connection()?;
        pool.release(conn);
        Ok(pool)
    }

    /// Acquire a connection, opening a new one when none is idle.
    pub(crate) fn acquire(self: &Arc<Self>) -> StoreResult<PooledConnection> {
        let idle = self
            .idle
            .lock()
            .map_err(|_| StoreError::Database("connection pool lock poisoned".to_string()))?
            .pop();
        let conn = match idle {
            Some(conn) => conn,
            None => self.open_connection()?,
        };
        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
        })
    }

    fn release(&self, conn: Connection) {
        // A poisoned lock just forfeits the connection; the next acquire
        // opens a fresh one.
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(conn);
        }
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&self.path)?;
        // WAL lets concurrent workers read while one writes; cascade
        // deletes require foreign_keys on every connection.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;
            PRAGMA busy_timeout=5000;
            "#,
        )?;
        Ok(conn)
    }
}

/// Guard owning one connection; returns it to the pool on drop.
pub(crate) struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already returned")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already returned")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas and the busy timeout.
//!
//! # Invariants
//! - Returned connections have `foreign_keys` set per `StoreOptions`.
//! - Lock waits are bounded by `StoreOptions::busy_timeout`; nothing retries
//!   beyond it.

use super::StoreResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection-level settings applied at open time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub foreign_keys: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            foreign_keys: true,
        }
    }
}

/// Opens a SQLite database file with default options.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> StoreResult<Connection> {
    open_db_with(path, &StoreOptions::default())
}

/// Opens a SQLite database file with explicit options.
pub fn open_db_with(path: impl AsRef<Path>, options: &StoreOptions) -> StoreResult<Connection> {
    open_logged("file", options, || Connection::open(path))
}

/// Opens an in-memory SQLite database with default options.
pub fn open_db_in_memory() -> StoreResult<Connection> {
    open_db_in_memory_with(&StoreOptions::default())
}

/// Opens an in-memory SQLite database with explicit options.
pub fn open_db_in_memory_with(options: &StoreOptions) -> StoreResult<Connection> {
    open_logged("memory", options, Connection::open_in_memory)
}

fn open_logged(
    mode: &str,
    options: &StoreOptions,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> StoreResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match configure_connection(&conn, options) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={} foreign_keys={} busy_timeout_ms={}",
                started_at.elapsed().as_millis(),
                options.foreign_keys,
                options.busy_timeout.as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

fn configure_connection(conn: &Connection, options: &StoreOptions) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", options.foreign_keys)?;
    conn.busy_timeout(options.busy_timeout)?;
    Ok(())
}

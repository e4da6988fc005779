//! SQLite storage bootstrap and the entity store adapter.
//!
//! # Responsibility
//! - Open and configure SQLite connections.
//! - Create entity tables from static entity metadata.
//! - Execute parameterized queries and classify store failures.
//!
//! # Invariants
//! - Store failures are surfaced to the caller, never retried.
//! - Core code must not read/write entity data before `ensure_table` ran for it.

use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub mod schema;
pub mod store;

pub use open::{open_db, open_db_in_memory, open_db_in_memory_with, open_db_with, StoreOptions};
pub use store::{BoundQuery, EntityStore, LockMode, QueryParams};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by the backing store, classified by cause.
#[derive(Debug)]
pub enum StoreError {
    /// The database could not be opened, reached, or is busy/locked.
    Connectivity(rusqlite::Error),
    /// A unique, foreign-key, not-null or check constraint rejected a write.
    ConstraintViolation(rusqlite::Error),
    /// The statement text or its parameters are invalid.
    MalformedQuery(rusqlite::Error),
    /// A row value could not be converted into the requested Rust type.
    Mapping(rusqlite::Error),
    Other(rusqlite::Error),
}

impl StoreError {
    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "store_connectivity",
            Self::ConstraintViolation(_) => "store_constraint",
            Self::MalformedQuery(_) => "store_malformed_query",
            Self::Mapping(_) => "store_mapping",
            Self::Other(_) => "store_other",
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation(_))
    }

    fn inner(&self) -> &rusqlite::Error {
        match self {
            Self::Connectivity(err)
            | Self::ConstraintViolation(err)
            | Self::MalformedQuery(err)
            | Self::Mapping(err)
            | Self::Other(err) => err,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connectivity(err) => write!(f, "store unavailable: {err}"),
            Self::ConstraintViolation(err) => write!(f, "constraint violation: {err}"),
            Self::MalformedQuery(err) => write!(f, "malformed query: {err}"),
            Self::Mapping(err) => write!(f, "row mapping failed: {err}"),
            Self::Other(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        // Covers both plain SQLite failures and statement input errors.
        if let Some(code) = value.sqlite_error_code() {
            return match code {
                ErrorCode::ConstraintViolation => Self::ConstraintViolation(value),
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::PermissionDenied
                | ErrorCode::FileLockingProtocolFailed => Self::Connectivity(value),
                ErrorCode::Unknown | ErrorCode::ApiMisuse | ErrorCode::ParameterOutOfRange => {
                    Self::MalformedQuery(value)
                }
                _ => Self::Other(value),
            };
        }

        match &value {
            rusqlite::Error::InvalidParameterCount(..)
            | rusqlite::Error::InvalidParameterName(_)
            | rusqlite::Error::InvalidColumnName(_)
            | rusqlite::Error::InvalidColumnIndex(_)
            | rusqlite::Error::MultipleStatement
            | rusqlite::Error::ExecuteReturnedResults => Self::MalformedQuery(value),
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => Self::Mapping(value),
            _ => Self::Other(value),
        }
    }
}

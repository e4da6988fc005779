//! Entity store adapter over one SQLite connection or transaction.
//!
//! # Responsibility
//! - Bind positional or named parameters and execute one statement.
//! - Hand each result row to a caller-supplied mapper.
//! - Classify failures into `StoreError` and emit metadata-only log events.
//!
//! # Invariants
//! - Parameter values are never logged.
//! - No statement is retried.
//! - Lock hints are carried for diagnostics only; the rendered SQL decides
//!   what the store actually does with them.

use super::{StoreError, StoreResult};
use log::{debug, error, trace};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, Statement};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Log target of statement events; `trace` here includes statement text.
pub(crate) const LOG_TARGET: &str = module_path!();

/// Bound parameters for one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParams {
    /// `?` placeholders, bound in order.
    Positional(Vec<Value>),
    /// `:name` placeholders.
    Named(Vec<(String, Value)>),
}

impl QueryParams {
    pub fn none() -> Self {
        Self::Positional(Vec::new())
    }

    /// Builds named parameters; a missing `:` prefix is added.
    pub fn named<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(name, value)| {
                    let name = name.into();
                    let name = if name.starts_with(':') {
                        name
                    } else {
                        format!(":{name}")
                    };
                    (name, value.into())
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Positional(values) => values.len(),
            Self::Named(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<Value>> for QueryParams {
    fn from(value: Vec<Value>) -> Self {
        Self::Positional(value)
    }
}

/// Row-level lock requested for a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    #[default]
    None,
    PessimisticRead,
    PessimisticWrite,
}

impl LockMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PessimisticRead => "pessimistic_read",
            Self::PessimisticWrite => "pessimistic_write",
        }
    }
}

/// Statement text plus everything needed to execute it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: QueryParams,
    pub lock: LockMode,
}

impl BoundQuery {
    pub fn new(sql: impl Into<String>, params: impl Into<QueryParams>) -> Self {
        Self {
            sql: sql.into(),
            params: params.into(),
            lock: LockMode::None,
        }
    }

    pub fn with_lock(mut self, lock: LockMode) -> Self {
        self.lock = lock;
        self
    }
}

/// Query execution boundary used by repositories and custom fragments.
///
/// Borrowing a `Transaction` works as well, since it derefs to `Connection`.
pub struct EntityStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> EntityStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Runs a row-returning statement and maps every row.
    pub fn execute<T>(
        &self,
        query: &BoundQuery,
        mut map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> StoreResult<Vec<T>> {
        let started_at = Instant::now();
        let result = self.run(query, |stmt| {
            let mut rows = stmt.raw_query();
            let mut mapped = Vec::new();
            while let Some(row) = rows.next()? {
                mapped.push(map(row)?);
            }
            Ok(mapped)
        });
        self.log_outcome("select", query, started_at, result.as_ref().map(Vec::len));
        result
    }

    /// Runs a single-value `COUNT` style statement.
    pub fn execute_count(&self, query: &BoundQuery) -> StoreResult<u64> {
        let started_at = Instant::now();
        let result = self.run(query, |stmt| {
            let mut rows = stmt.raw_query();
            let count: i64 = match rows.next()? {
                Some(row) => row.get(0)?,
                None => 0,
            };
            u64::try_from(count).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, count))
        });
        self.log_outcome("count", query, started_at, result.as_ref().map(|_| 1));
        result
    }

    /// Runs an `UPDATE`/`DELETE` and returns the affected-row count.
    pub fn execute_update(&self, query: &BoundQuery) -> StoreResult<usize> {
        let started_at = Instant::now();
        let result = self.run(query, |stmt| stmt.raw_execute());
        self.log_outcome("update", query, started_at, result.as_ref().copied());
        result
    }

    /// Runs an `INSERT` and returns the new rowid.
    pub fn execute_insert(&self, query: &BoundQuery) -> StoreResult<i64> {
        let started_at = Instant::now();
        let result = self
            .run(query, |stmt| stmt.raw_execute())
            .map(|_| self.conn.last_insert_rowid());
        self.log_outcome("insert", query, started_at, result.as_ref().map(|_| 1));
        result
    }

    fn run<T>(
        &self,
        query: &BoundQuery,
        body: impl FnOnce(&mut Statement<'_>) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        trace!("event=store_sql module=store sql={}", query.sql);
        let mut stmt = self.conn.prepare(&query.sql)?;
        bind_params(&mut stmt, &query.params)?;
        Ok(body(&mut stmt)?)
    }

    fn log_outcome(
        &self,
        kind: &str,
        query: &BoundQuery,
        started_at: Instant,
        outcome: Result<usize, &StoreError>,
    ) {
        match outcome {
            Ok(rows) => debug!(
                "event=store_query module=store status=ok kind={kind} rows={rows} params={} lock={} duration_ms={}",
                query.params.len(),
                query.lock.as_str(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=store_query module=store status=error kind={kind} lock={} duration_ms={} error_code={} error={}",
                query.lock.as_str(),
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
    }
}

fn bind_params(stmt: &mut Statement<'_>, params: &QueryParams) -> rusqlite::Result<()> {
    match params {
        QueryParams::Positional(values) => {
            let expected = stmt.parameter_count();
            if expected != values.len() {
                return Err(rusqlite::Error::InvalidParameterCount(values.len(), expected));
            }
            for (index, value) in values.iter().enumerate() {
                stmt.raw_bind_parameter(index + 1, value)?;
            }
        }
        QueryParams::Named(pairs) => {
            for (name, value) in pairs {
                let index = stmt
                    .parameter_index(name)?
                    .ok_or_else(|| rusqlite::Error::InvalidParameterName(name.clone()))?;
                stmt.raw_bind_parameter(index, value)?;
            }
        }
    }
    Ok(())
}

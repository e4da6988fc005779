//! Result shapes of derived finders.

use crate::repo::{RepoError, RepoResult};

/// How a finder turns its rows into a return value.
pub trait ResultShape {
    type Output<T>;

    /// Row cap added to the query so uniqueness can be checked cheaply.
    const FETCH_LIMIT: Option<u64>;

    fn collect<T>(rows: Vec<T>, descriptor: &str) -> RepoResult<Self::Output<T>>;
}

/// Every matching row; empty is fine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Many;

/// Zero or one row; more than one is `NonUniqueResult`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Optional;

/// One row, or `None` as the "no result" sentinel; more than one is
/// `NonUniqueResult`.
///
/// Same output type as [`Optional`]. The two stay distinct so a finder's
/// declared contract is visible at its definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct Single;

impl ResultShape for Many {
    type Output<T> = Vec<T>;

    const FETCH_LIMIT: Option<u64> = None;

    fn collect<T>(rows: Vec<T>, _descriptor: &str) -> RepoResult<Vec<T>> {
        Ok(rows)
    }
}

impl ResultShape for Optional {
    type Output<T> = Option<T>;

    const FETCH_LIMIT: Option<u64> = Some(2);

    fn collect<T>(rows: Vec<T>, descriptor: &str) -> RepoResult<Option<T>> {
        at_most_one(rows, descriptor)
    }
}

impl ResultShape for Single {
    type Output<T> = Option<T>;

    const FETCH_LIMIT: Option<u64> = Some(2);

    fn collect<T>(rows: Vec<T>, descriptor: &str) -> RepoResult<Option<T>> {
        at_most_one(rows, descriptor)
    }
}

fn at_most_one<T>(rows: Vec<T>, descriptor: &str) -> RepoResult<Option<T>> {
    if rows.len() > 1 {
        return Err(RepoError::NonUniqueResult {
            descriptor: descriptor.to_string(),
        });
    }
    Ok(rows.into_iter().next())
}

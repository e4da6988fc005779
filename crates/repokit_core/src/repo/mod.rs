//! Repository facade over the entity store.
//!
//! # Responsibility
//! - Expose CRUD, derived finders, paging and bulk updates per entity type.
//! - Keep one managed instance per persistent identity inside a unit of work.
//! - Compose caller-supplied query fragments with the generated operations.
//!
//! # Invariants
//! - Every repository call runs inside an explicit `UnitOfWork`.
//! - Absence on read is success (`None` / empty), never an error.
//! - Derived finders are validated at construction, never at call time.

use crate::db::StoreError;
use crate::query::QueryError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod managed;
pub mod member_repo;
pub mod repository;
pub mod shape;
pub mod unit_of_work;

pub use managed::Managed;
pub use member_repo::{
    MemberDto, MemberRepository, MemberRepositoryCustom, MemberRepositoryImpl, UsernameOnly,
};
pub use repository::{Counter, Finder, NoFragment, Projection, QueryHints, Repository};
pub use shape::{Many, Optional, ResultShape, Single};
pub use unit_of_work::UnitOfWork;

/// Teams need only the generated operations.
pub type TeamRepository = Repository<crate::model::team::Team>;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository-level failure.
#[derive(Debug)]
pub enum RepoError {
    Store(StoreError),
    Query(QueryError),
    /// A single-result finder matched more than one row.
    NonUniqueResult { descriptor: String },
    /// A delete targeted a missing row under `MissingDeletePolicy::Error`,
    /// or a refresh found no row.
    NotFound { entity: &'static str, id: String },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Query(err) => write!(f, "{err}"),
            Self::NonUniqueResult { descriptor } => {
                write!(f, "`{descriptor}` expected at most one result but found more")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid entity data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Query(err) => Some(err),
            Self::NonUniqueResult { .. } | Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<QueryError> for RepoError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(StoreError::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use crate::query::QueryError;
    use std::error::Error;

    #[test]
    fn query_errors_keep_their_source() {
        let err = RepoError::from(QueryError::EmptyAssignments);
        assert!(err.source().is_some());
        assert!(matches!(err, RepoError::Query(QueryError::EmptyAssignments)));
    }

    #[test]
    fn not_found_names_entity_and_id() {
        let err = RepoError::NotFound {
            entity: "Member",
            id: "42".to_string(),
        };
        assert_eq!(err.to_string(), "Member not found: 42");
    }
}

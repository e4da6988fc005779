//! Generic persistence core: entity store adapter, query builder with
//! derived queries, repository facade with a unit of work, and pagination.
//!
//! Sample `Member`/`Team` entities and repositories exercise every layer.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod page;
pub mod query;
pub mod repo;

pub use config::{MissingDeletePolicy, RepositoryConfig};
pub use db::{
    open_db, open_db_in_memory, open_db_in_memory_with, BoundQuery, EntityStore, LockMode,
    QueryParams, StoreError, StoreOptions, StoreResult,
};
pub use logging::{
    active_settings, default_log_level, init_logging, log_runtime_settings, LogLevel, LogSettings,
    LoggingError,
};
pub use model::entity::{Entity, EntityId, EntityMeta, FieldDef, FieldKind};
pub use model::member::{Member, MemberId};
pub use model::team::{Team, TeamId};
pub use page::{Page, PageRequest, Slice};
pub use query::{
    Assignment, Direction, Operand, Operator, Predicate, QueryBuilder, QueryError, Sort,
};
pub use repo::{
    Counter, Finder, Managed, Many, MemberDto, MemberRepository, MemberRepositoryCustom,
    MemberRepositoryImpl, NoFragment, Optional, Projection, RepoError, RepoResult, Repository,
    ResultShape, Single, TeamRepository, UnitOfWork, UsernameOnly,
};

/// Minimal health-check API for embedding hosts.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

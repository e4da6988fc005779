//! Query construction: predicates, sorting, SQL rendering and derived queries.
//!
//! # Responsibility
//! - Turn typed predicates, sorts and paging directives into `BoundQuery`s.
//! - Parse method-name style descriptors into predicate templates.
//!
//! # Invariants
//! - Every field name is resolved against the entity's declared fields;
//!   unknown names fail with `QueryError::InvalidField`.
//! - Values are always bound as parameters, never spliced into SQL text.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod assign;
pub mod builder;
pub mod derived;
pub mod predicate;
pub mod sort;

pub use assign::Assignment;
pub use builder::{Dialect, QueryBuilder, SelectBuilder};
pub use derived::{DerivedQuery, Subject};
pub use predicate::{Operand, Operator, Predicate};
pub use sort::{Direction, Order, Sort};

/// Errors raised while building or binding a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A predicate, sort, assignment or descriptor names an undeclared field.
    InvalidField { entity: &'static str, field: String },
    /// A derived-query descriptor does not follow the supported grammar.
    MalformedDescriptor { descriptor: String, reason: String },
    /// `In` got a single value, or a scalar operator got a list.
    OperandMismatch { field: String, operator: Operator },
    /// A derived query was called with the wrong number of arguments.
    ArgumentCount {
        descriptor: String,
        expected: usize,
        actual: usize,
    },
    InvalidPageRequest(String),
    /// A bulk update was requested without any assignment.
    EmptyAssignments,
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidField { entity, field } => {
                write!(f, "unknown field `{field}` for entity {entity}")
            }
            Self::MalformedDescriptor { descriptor, reason } => {
                write!(f, "malformed query descriptor `{descriptor}`: {reason}")
            }
            Self::OperandMismatch { field, operator } => write!(
                f,
                "operand for `{field}` does not fit operator {}",
                operator.as_str()
            ),
            Self::ArgumentCount {
                descriptor,
                expected,
                actual,
            } => write!(
                f,
                "`{descriptor}` expects {expected} argument(s), got {actual}"
            ),
            Self::InvalidPageRequest(message) => write!(f, "invalid page request: {message}"),
            Self::EmptyAssignments => write!(f, "bulk update requires at least one assignment"),
        }
    }
}

impl Error for QueryError {}

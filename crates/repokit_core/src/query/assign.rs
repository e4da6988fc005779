//! Assignment expressions for bulk updates.

use crate::query::predicate::Operand;
use rusqlite::types::Value;

/// Right-hand side of one `SET` item.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentExpr {
    /// `column = ?`; must be a single value.
    Value(Operand),
    /// `column = column + ?`
    Add(Value),
}

/// One `SET` item of a bulk update.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: String,
    pub expr: AssignmentExpr,
}

impl Assignment {
    /// `field = value`
    pub fn set(field: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self {
            field: field.into(),
            expr: AssignmentExpr::Value(value.into()),
        }
    }

    /// `field = field + delta`
    pub fn increment(field: impl Into<String>, delta: i64) -> Self {
        Self {
            field: field.into(),
            expr: AssignmentExpr::Add(Value::Integer(delta)),
        }
    }
}

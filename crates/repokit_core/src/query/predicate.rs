//! Filter predicates.

use rusqlite::types::Value;
use uuid::Uuid;

/// Comparison operator of one predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    Like,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::In => "IN",
            Self::Like => "LIKE",
        }
    }

    /// Whether the operator takes a list operand.
    pub fn takes_list(self) -> bool {
        matches!(self, Self::In)
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Single(Value),
    List(Vec<Value>),
}

impl Operand {
    pub fn list<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// Text list helper, since `&str` has no `Into<Value>`.
    pub fn text_list<S: AsRef<str>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::List(
            values
                .into_iter()
                .map(|value| Value::Text(value.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Single(value)
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Self::Single(Value::Text(value.to_string()))
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Self::Single(Value::Text(value))
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Self::Single(Value::Integer(value))
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Self::Single(Value::Integer(i64::from(value)))
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Self::Single(Value::Integer(i64::from(value)))
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Self::Single(Value::Real(value))
    }
}

impl From<Uuid> for Operand {
    fn from(value: Uuid) -> Self {
        Self::Single(Value::Text(value.to_string()))
    }
}

/// One filter condition; predicates in a list are AND-joined.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub operand: Operand,
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: Operator, operand: impl Into<Operand>) -> Self {
        Self {
            field: field.into(),
            operator,
            operand: operand.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::new(field, Operator::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::new(field, Operator::Ge, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::new(field, Operator::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::new(field, Operator::Le, value)
    }

    /// `pattern` uses SQL `LIKE` wildcards as given.
    pub fn like(field: impl Into<String>, pattern: impl Into<Operand>) -> Self {
        Self::new(field, Operator::Like, pattern)
    }

    pub fn is_in(field: impl Into<String>, values: Operand) -> Self {
        Self::new(field, Operator::In, values)
    }

    /// Whether the operand shape fits the operator.
    pub fn is_well_formed(&self) -> bool {
        self.operator.takes_list() == self.operand.is_list()
    }
}

#[cfg(test)]
mod tests {
    use super::{Operand, Operator, Predicate};
    use rusqlite::types::Value;

    #[test]
    fn constructors_set_operator_and_operand() {
        let predicate = Predicate::gt("age", 15);
        assert_eq!(predicate.operator, Operator::Gt);
        assert_eq!(predicate.operand, Operand::Single(Value::Integer(15)));
        assert!(predicate.is_well_formed());
    }

    #[test]
    fn in_requires_list_operand() {
        assert!(Predicate::is_in("username", Operand::text_list(["AAA", "BBB"])).is_well_formed());
        assert!(!Predicate::new("username", Operator::In, "AAA").is_well_formed());
        assert!(!Predicate::new("age", Operator::Eq, Operand::list([1_i64, 2])).is_well_formed());
    }
}

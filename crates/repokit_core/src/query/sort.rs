//! Sort specifications.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One `(field, direction)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

/// Ordered list of sort keys; empty means unsorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    /// Sorts by every field in `fields` using the same direction.
    pub fn by(direction: Direction, fields: &[&str]) -> Self {
        Self {
            orders: fields
                .iter()
                .map(|field| Order {
                    field: (*field).to_string(),
                    direction,
                })
                .collect(),
        }
    }

    pub fn asc(field: &str) -> Self {
        Self::by(Direction::Asc, &[field])
    }

    pub fn desc(field: &str) -> Self {
        Self::by(Direction::Desc, &[field])
    }

    /// Appends another key; earlier keys take precedence.
    pub fn then(mut self, field: &str, direction: Direction) -> Self {
        self.orders.push(Order {
            field: field.to_string(),
            direction,
        });
        self
    }

    /// Appends all keys of `other` after the keys of `self`.
    pub fn and(mut self, other: &Sort) -> Self {
        self.orders.extend(other.orders.iter().cloned());
        self
    }

    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, Sort};

    #[test]
    fn combined_sort_keeps_key_order() {
        let sort = Sort::desc("username").and(&Sort::asc("age")).then("id", Direction::Desc);
        let keys: Vec<_> = sort
            .orders()
            .iter()
            .map(|order| (order.field.as_str(), order.direction))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("username", Direction::Desc),
                ("age", Direction::Asc),
                ("id", Direction::Desc)
            ]
        );
        assert!(Sort::unsorted().is_unsorted());
    }
}

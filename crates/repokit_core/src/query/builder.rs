//! SQL rendering for one entity table.
//!
//! # Example
//!
//! ```ignore
//! let query = QueryBuilder::new(Member::meta())
//!     .select()
//!     .filter(&[Predicate::eq("age", 10)])
//!     .sort(&Sort::desc("username"))
//!     .limit(3)
//!     .build()?;
//! // query.sql: SELECT member_id, username, age, team_id FROM member
//! //            WHERE age = ? ORDER BY username DESC LIMIT ?
//! ```

use crate::db::store::{BoundQuery, LockMode, QueryParams};
use crate::model::entity::{EntityMeta, FieldDef};
use crate::query::assign::{Assignment, AssignmentExpr};
use crate::query::predicate::{Operand, Operator, Predicate};
use crate::query::sort::Sort;
use crate::query::QueryError;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// SQL flavor used when rendering placeholders, open-ended offsets and locks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `?` placeholders; no row-lock clause.
    #[default]
    Sqlite,
    /// `$1, $2, ...` placeholders.
    Postgres,
    /// `?` placeholders.
    MySql,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::Sqlite | Self::MySql => "?".to_string(),
        }
    }

    fn lock_clause(self, lock: LockMode) -> Option<&'static str> {
        match (self, lock) {
            (_, LockMode::None) | (Self::Sqlite, _) => None,
            (Self::Postgres | Self::MySql, LockMode::PessimisticRead) => Some("FOR SHARE"),
            (Self::Postgres | Self::MySql, LockMode::PessimisticWrite) => Some("FOR UPDATE"),
        }
    }

    /// `LIMIT` literal meaning "no limit", for dialects that need one before `OFFSET`.
    fn unbounded_limit(self) -> Option<&'static str> {
        match self {
            Self::Sqlite => Some("-1"),
            Self::MySql => Some("18446744073709551615"),
            Self::Postgres => None,
        }
    }
}

/// Collects bound values and hands out dialect placeholders.
struct ParamSink {
    dialect: Dialect,
    values: Vec<Value>,
}

impl ParamSink {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    fn finish(self, sql: String) -> BoundQuery {
        BoundQuery::new(sql, QueryParams::Positional(self.values))
    }
}

/// Renders statements against one entity's metadata.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    meta: &'static EntityMeta,
    dialect: Dialect,
}

impl QueryBuilder {
    pub fn new(meta: &'static EntityMeta) -> Self {
        Self::with_dialect(meta, Dialect::default())
    }

    pub fn with_dialect(meta: &'static EntityMeta, dialect: Dialect) -> Self {
        Self { meta, dialect }
    }

    pub fn meta(&self) -> &'static EntityMeta {
        self.meta
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Resolves a declared field name.
    pub fn field(&self, name: &str) -> Result<&'static FieldDef, QueryError> {
        self.meta.field(name).ok_or_else(|| QueryError::InvalidField {
            entity: self.meta.name,
            field: name.to_string(),
        })
    }

    pub fn select(&self) -> SelectBuilder<'_> {
        SelectBuilder {
            builder: self,
            predicates: Vec::new(),
            sort: Sort::unsorted(),
            limit: None,
            offset: None,
            lock: LockMode::None,
            distinct: false,
            projection: None,
        }
    }

    pub fn count(&self, predicates: &[Predicate]) -> Result<BoundQuery, QueryError> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.meta.table);
        let mut sink = ParamSink::new(self.dialect);
        self.append_where(&mut sql, &mut sink, predicates)?;
        Ok(sink.finish(sql))
    }

    /// Renders `SELECT EXISTS(...)`, readable through a count execution.
    pub fn exists(&self, predicates: &[Predicate]) -> Result<BoundQuery, QueryError> {
        let mut inner = format!("SELECT 1 FROM {}", self.meta.table);
        let mut sink = ParamSink::new(self.dialect);
        self.append_where(&mut inner, &mut sink, predicates)?;
        Ok(sink.finish(format!("SELECT EXISTS({inner})")))
    }

    pub fn select_by_id(&self, id: Value) -> BoundQuery {
        let mut sink = ParamSink::new(self.dialect);
        let placeholder = sink.bind(id);
        sink.finish(format!(
            "SELECT {} FROM {} WHERE {} = {placeholder}",
            self.meta.column_list(),
            self.meta.table,
            self.meta.id.column
        ))
    }

    /// `values` follow `EntityMeta::fields`; `id` is included when supplied.
    pub fn insert(&self, id: Option<Value>, values: Vec<Value>) -> BoundQuery {
        let mut sink = ParamSink::new(self.dialect);
        let mut columns = Vec::with_capacity(values.len() + 1);
        let mut placeholders = Vec::with_capacity(values.len() + 1);

        if let Some(id) = id {
            columns.push(self.meta.id.column);
            placeholders.push(sink.bind(id));
        }
        for (field, value) in self.meta.fields.iter().zip(values) {
            columns.push(field.column);
            placeholders.push(sink.bind(value));
        }

        sink.finish(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.meta.table,
            columns.join(", "),
            placeholders.join(", ")
        ))
    }

    pub fn update_by_id(&self, id: Value, values: Vec<Value>) -> BoundQuery {
        let mut sink = ParamSink::new(self.dialect);
        let assignments: Vec<_> = self
            .meta
            .fields
            .iter()
            .zip(values)
            .map(|(field, value)| format!("{} = {}", field.column, sink.bind(value)))
            .collect();
        let id_placeholder = sink.bind(id);

        sink.finish(format!(
            "UPDATE {} SET {} WHERE {} = {id_placeholder}",
            self.meta.table,
            assignments.join(", "),
            self.meta.id.column
        ))
    }

    pub fn delete_by_id(&self, id: Value) -> BoundQuery {
        let mut sink = ParamSink::new(self.dialect);
        let placeholder = sink.bind(id);
        sink.finish(format!(
            "DELETE FROM {} WHERE {} = {placeholder}",
            self.meta.table, self.meta.id.column
        ))
    }

    pub fn delete_all(&self) -> BoundQuery {
        BoundQuery::new(format!("DELETE FROM {}", self.meta.table), QueryParams::none())
    }

    /// Renders `UPDATE ... SET ... WHERE ...` for a bulk update.
    pub fn bulk_update(
        &self,
        predicates: &[Predicate],
        assignments: &[Assignment],
    ) -> Result<BoundQuery, QueryError> {
        if assignments.is_empty() {
            return Err(QueryError::EmptyAssignments);
        }

        let mut sink = ParamSink::new(self.dialect);
        let mut items = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let column = self.field(&assignment.field)?.column;
            let item = match &assignment.expr {
                AssignmentExpr::Value(Operand::Single(value)) => {
                    format!("{column} = {}", sink.bind(value.clone()))
                }
                AssignmentExpr::Value(Operand::List(_)) => {
                    return Err(QueryError::OperandMismatch {
                        field: assignment.field.clone(),
                        operator: Operator::Eq,
                    });
                }
                AssignmentExpr::Add(delta) => {
                    format!("{column} = {column} + {}", sink.bind(delta.clone()))
                }
            };
            items.push(item);
        }

        let mut sql = format!("UPDATE {} SET {}", self.meta.table, items.join(", "));
        self.append_where(&mut sql, &mut sink, predicates)?;
        Ok(sink.finish(sql))
    }

    fn append_where(
        &self,
        sql: &mut String,
        sink: &mut ParamSink,
        predicates: &[Predicate],
    ) -> Result<(), QueryError> {
        if predicates.is_empty() {
            return Ok(());
        }

        let mut clauses = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            let column = self.field(&predicate.field)?.column;
            if !predicate.is_well_formed() {
                return Err(QueryError::OperandMismatch {
                    field: predicate.field.clone(),
                    operator: predicate.operator,
                });
            }
            let clause = match &predicate.operand {
                Operand::List(values) if values.is_empty() => "0 = 1".to_string(),
                Operand::List(values) => {
                    let placeholders: Vec<_> =
                        values.iter().map(|value| sink.bind(value.clone())).collect();
                    format!("{column} IN ({})", placeholders.join(", "))
                }
                Operand::Single(value) => format!(
                    "{column} {} {}",
                    predicate.operator.as_str(),
                    sink.bind(value.clone())
                ),
            };
            clauses.push(clause);
        }

        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
        Ok(())
    }

    fn append_order(&self, sql: &mut String, sort: &Sort) -> Result<(), QueryError> {
        if sort.is_unsorted() {
            return Ok(());
        }
        let mut clauses = Vec::with_capacity(sort.orders().len());
        for order in sort.orders() {
            let column = self.field(&order.field)?.column;
            clauses.push(format!("{column} {}", order.direction.as_sql()));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&clauses.join(", "));
        Ok(())
    }
}

/// Fluent `SELECT` builder returned by [`QueryBuilder::select`].
#[derive(Debug, Clone)]
pub struct SelectBuilder<'q> {
    builder: &'q QueryBuilder,
    predicates: Vec<Predicate>,
    sort: Sort,
    limit: Option<u64>,
    offset: Option<u64>,
    lock: LockMode,
    distinct: bool,
    projection: Option<Vec<String>>,
}

impl SelectBuilder<'_> {
    pub fn filter(mut self, predicates: &[Predicate]) -> Self {
        self.predicates.extend(predicates.iter().cloned());
        self
    }

    pub fn sort(mut self, sort: &Sort) -> Self {
        self.sort = self.sort.and(sort);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn lock(mut self, lock: LockMode) -> Self {
        self.lock = lock;
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Selects only `fields`, aliased to their field names.
    pub fn project(mut self, fields: &[&str]) -> Self {
        self.projection = Some(fields.iter().map(|field| (*field).to_string()).collect());
        self
    }

    pub fn build(self) -> Result<BoundQuery, QueryError> {
        let builder = self.builder;
        let meta = builder.meta;
        let columns = match &self.projection {
            Some(fields) => {
                let mut items = Vec::with_capacity(fields.len());
                for name in fields {
                    let field = builder.field(name)?;
                    if field.column == field.name {
                        items.push(field.column.to_string());
                    } else {
                        items.push(format!("{} AS {}", field.column, field.name));
                    }
                }
                items.join(", ")
            }
            None => meta.column_list(),
        };

        let keyword = if self.distinct {
            "SELECT DISTINCT"
        } else {
            "SELECT"
        };
        let mut sql = format!("{keyword} {columns} FROM {}", meta.table);
        let mut sink = ParamSink::new(builder.dialect);
        builder.append_where(&mut sql, &mut sink, &self.predicates)?;
        builder.append_order(&mut sql, &self.sort)?;

        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                sql.push_str(&format!(" LIMIT {}", sink.bind(to_value(limit))));
                if let Some(offset) = offset.filter(|offset| *offset > 0) {
                    sql.push_str(&format!(" OFFSET {}", sink.bind(to_value(offset))));
                }
            }
            (None, Some(offset)) if offset > 0 => {
                if let Some(unbounded) = builder.dialect.unbounded_limit() {
                    sql.push_str(&format!(" LIMIT {unbounded}"));
                }
                sql.push_str(&format!(" OFFSET {}", sink.bind(to_value(offset))));
            }
            (None, _) => {}
        }

        if let Some(clause) = builder.dialect.lock_clause(self.lock) {
            sql.push(' ');
            sql.push_str(clause);
        }

        Ok(sink.finish(sql).with_lock(self.lock))
    }
}

fn to_value(number: u64) -> Value {
    Value::Integer(i64::try_from(number).unwrap_or(i64::MAX))
}

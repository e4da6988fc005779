//! Entity contracts and static mapping metadata.
//!
//! # Responsibility
//! - Describe how one Rust type maps onto one table (`EntityMeta`).
//! - Convert identifiers and rows between Rust values and SQLite values.
//!
//! # Invariants
//! - Metadata is declared once per entity type and never changes at runtime.
//! - `Entity::field_values()` returns values in `EntityMeta::fields` order.
//! - An identifier, once assigned, is never reassigned.

use rusqlite::types::{FromSqlError, FromSqlResult, Type, Value, ValueRef};
use rusqlite::Row;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use uuid::Uuid;

/// SQLite storage class used when creating a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Real,
    Text,
    Boolean,
}

impl FieldKind {
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }
}

/// Mapping of one entity field onto one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Name used by predicates, sorts and derived queries.
    pub name: &'static str,
    /// Physical column name.
    pub column: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    /// Referenced table for many-to-one relations (`table(id column)`).
    pub references: Option<(&'static str, &'static str)>,
}

impl FieldDef {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            column,
            kind,
            nullable: false,
            references: None,
        }
    }

    pub const fn integer(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Integer)
    }

    pub const fn text(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Text)
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Declares a many-to-one reference to `table(column)`.
    pub const fn references(mut self, table: &'static str, column: &'static str) -> Self {
        self.references = Some((table, column));
        self
    }
}

/// Static table mapping for one entity type.
#[derive(Debug)]
pub struct EntityMeta {
    /// Entity name used in logs and errors.
    pub name: &'static str,
    pub table: &'static str,
    pub id: FieldDef,
    /// Non-identifier fields in declaration order.
    pub fields: &'static [FieldDef],
}

impl EntityMeta {
    /// Resolves a field (identifier included) by its declared name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        if self.id.name == name {
            return Some(&self.id);
        }
        self.fields.iter().find(|field| field.name == name)
    }

    /// Identifier followed by every declared field.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldDef> {
        std::iter::once(&self.id).chain(self.fields.iter())
    }

    /// Comma-separated select list of every column.
    pub fn column_list(&self) -> String {
        self.all_fields()
            .map(|field| field.column)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Identifier type usable as an entity primary key.
pub trait EntityId: Clone + Eq + Hash + Debug + Display + 'static {
    /// Column declaration used when creating the table.
    const COLUMN_DECL: &'static str;

    fn to_value(&self) -> Value;

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self>;

    /// Client-side identifier generated right before insert, if any.
    fn generate() -> Option<Self> {
        None
    }

    /// Identifier derived from the store's `last_insert_rowid`, if any.
    fn from_rowid(_rowid: i64) -> Option<Self> {
        None
    }
}

impl EntityId for i64 {
    const COLUMN_DECL: &'static str = "INTEGER PRIMARY KEY AUTOINCREMENT";

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_i64()
    }

    fn from_rowid(rowid: i64) -> Option<Self> {
        Some(rowid)
    }
}

impl EntityId for Uuid {
    const COLUMN_DECL: &'static str = "TEXT PRIMARY KEY NOT NULL";

    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Uuid::parse_str(text).map_err(|err| FromSqlError::Other(Box::new(err)))
    }

    fn generate() -> Option<Self> {
        Some(Uuid::new_v4())
    }
}

/// A persistent record mapped onto one table.
///
/// # Example
///
/// ```ignore
/// impl Entity for Member {
///     type Id = i64;
///     fn meta() -> &'static EntityMeta { &MEMBER_META }
///     fn id(&self) -> Option<i64> { self.id }
///     fn assign_id(&mut self, id: i64) { self.id = Some(id) }
///     fn field_values(&self) -> Vec<Value> { /* username, age, team_id */ }
///     fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> { /* by column name */ }
/// }
/// ```
pub trait Entity: Clone + Debug + 'static {
    type Id: EntityId;

    fn meta() -> &'static EntityMeta;

    fn id(&self) -> Option<Self::Id>;

    /// Called by the repository only while `id()` is `None`.
    fn assign_id(&mut self, id: Self::Id);

    /// Values for `meta().fields`, in order, excluding the identifier.
    fn field_values(&self) -> Vec<Value>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Reads an identifier column through `EntityId::from_value`.
pub fn read_id<I: EntityId>(row: &Row<'_>, column: &str) -> rusqlite::Result<I> {
    let index = row.as_ref().column_index(column)?;
    let value = row.get_ref(index)?;
    I::from_value(value).map_err(|err| match err {
        FromSqlError::InvalidType => {
            rusqlite::Error::InvalidColumnType(index, column.to_string(), value.data_type())
        }
        other => rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(other)),
    })
}

/// Reads a nullable identifier column (many-to-one references).
pub fn read_optional_id<I: EntityId>(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<I>> {
    let index = row.as_ref().column_index(column)?;
    if matches!(row.get_ref(index)?, ValueRef::Null) {
        return Ok(None);
    }
    read_id(row, column).map(Some)
}

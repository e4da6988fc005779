//! Team sample entity.
//!
//! Teams use client-generated `Uuid` identifiers; members reference a team by
//! id instead of embedding it.

use crate::model::entity::{read_id, Entity, EntityMeta, FieldDef};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TeamId = Uuid;

pub(crate) static TEAM_META: EntityMeta = EntityMeta {
    name: "Team",
    table: "team",
    id: FieldDef::text("id", "team_id"),
    fields: &[FieldDef::text("name", "name")],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// `None` until the first save.
    pub id: Option<TeamId>,
    pub name: String,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl Entity for Team {
    type Id = TeamId;

    fn meta() -> &'static EntityMeta {
        &TEAM_META
    }

    fn id(&self) -> Option<TeamId> {
        self.id
    }

    fn assign_id(&mut self, id: TeamId) {
        self.id = Some(id);
    }

    fn field_values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(read_id(row, "team_id")?),
            name: row.get("name")?,
        })
    }
}

//! Member sample entity.
//!
//! # Responsibility
//! - Model the member record used by the repository walkthroughs.
//! - Hold the team relation as an identifier reference.
//!
//! # Invariants
//! - `id` is assigned by the store on first insert and never changed after.
//! - `team_id`, when set, references an existing `team` row.

use crate::model::entity::{read_optional_id, Entity, EntityMeta, FieldDef};
use crate::model::team::{Team, TeamId};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub type MemberId = i64;

pub(crate) static MEMBER_META: EntityMeta = EntityMeta {
    name: "Member",
    table: "member",
    id: FieldDef::integer("id", "member_id"),
    fields: &[
        FieldDef::text("username", "username"),
        FieldDef::integer("age", "age"),
        FieldDef::text("team_id", "team_id")
            .nullable()
            .references("team", "team_id"),
    ],
};

/// Member record; `team_id` is a many-to-one reference to [`Team`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: Option<MemberId>,
    pub username: String,
    pub age: i64,
    pub team_id: Option<TeamId>,
}

impl Member {
    pub fn new(username: impl Into<String>) -> Self {
        Self::with_age(username, 0)
    }

    pub fn with_age(username: impl Into<String>, age: i64) -> Self {
        Self {
            id: None,
            username: username.into(),
            age,
            team_id: None,
        }
    }

    /// Creates a member already attached to a saved team.
    pub fn with_team(username: impl Into<String>, age: i64, team: &Team) -> Self {
        let mut member = Self::with_age(username, age);
        member.change_team(team);
        member
    }

    /// Points this member at `team`. A transient team (no id) clears the link.
    pub fn change_team(&mut self, team: &Team) {
        self.team_id = team.id;
    }
}

impl Entity for Member {
    type Id = MemberId;

    fn meta() -> &'static EntityMeta {
        &MEMBER_META
    }

    fn id(&self) -> Option<MemberId> {
        self.id
    }

    fn assign_id(&mut self, id: MemberId) {
        self.id = Some(id);
    }

    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.username.clone()),
            Value::Integer(self.age),
            Value::from(self.team_id.map(|id| id.to_string())),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get("member_id")?),
            username: row.get("username")?,
            age: row.get("age")?,
            team_id: read_optional_id(row, "team_id")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Member;
    use crate::model::entity::Entity;
    use crate::model::team::Team;
    use rusqlite::types::Value;
    use uuid::Uuid;

    #[test]
    fn change_team_copies_team_identifier() {
        let mut team = Team::new("teamA");
        team.id = Some(Uuid::new_v4());

        let member = Member::with_team("member1", 10, &team);
        assert_eq!(member.team_id, team.id);
        assert_eq!(member.id, None);
    }

    #[test]
    fn new_member_defaults_to_zero_age() {
        let member = Member::new("memberA");
        assert_eq!(member.age, 0);
        assert!(member.team_id.is_none());
    }

    #[test]
    fn team_reference_is_stored_as_text_or_null() {
        let team_id = Uuid::new_v4();
        let mut member = Member::with_age("member1", 10);
        assert_eq!(member.field_values()[2], Value::Null);

        member.team_id = Some(team_id);
        assert_eq!(
            member.field_values(),
            vec![
                Value::Text("member1".to_string()),
                Value::Integer(10),
                Value::Text(team_id.to_string()),
            ]
        );
    }
}

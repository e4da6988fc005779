//! Table creation from entity metadata.
//!
//! # Responsibility
//! - Render `CREATE TABLE IF NOT EXISTS` statements from `EntityMeta`.
//! - Create the sample Member/Team schema in dependency order.
//!
//! # Invariants
//! - Creation is idempotent; existing tables are never altered or dropped.
//! - Referenced tables must be created before the tables that point at them.

use super::StoreResult;
use crate::model::entity::{Entity, EntityId};
use crate::model::member::Member;
use crate::model::team::Team;
use log::info;
use rusqlite::Connection;

/// Renders the DDL statement for one entity type.
pub fn create_table_sql<E: Entity>() -> String {
    let meta = E::meta();
    let mut columns = vec![format!("{} {}", meta.id.column, E::Id::COLUMN_DECL)];
    let mut references = Vec::new();

    for field in meta.fields {
        let null_clause = if field.nullable { "" } else { " NOT NULL" };
        columns.push(format!(
            "{} {}{}",
            field.column,
            field.kind.sql_type(),
            null_clause
        ));
        if let Some((table, column)) = field.references {
            references.push(format!(
                "FOREIGN KEY ({}) REFERENCES {table}({column})",
                field.column
            ));
        }
    }
    columns.extend(references);

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        meta.table,
        columns.join(",\n    ")
    )
}

/// Creates the table for `E` when it does not exist yet.
pub fn ensure_table<E: Entity>(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(&create_table_sql::<E>())?;
    info!(
        "event=schema_ensure module=db status=ok entity={} table={}",
        E::meta().name,
        E::meta().table
    );
    Ok(())
}

/// Creates the Team and Member tables used by the sample repositories.
pub fn ensure_sample_schema(conn: &Connection) -> StoreResult<()> {
    ensure_table::<Team>(conn)?;
    ensure_table::<Member>(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{create_table_sql, ensure_sample_schema};
    use crate::model::member::Member;
    use crate::model::team::Team;
    use rusqlite::Connection;

    #[test]
    fn member_ddl_declares_columns_and_team_reference() {
        let sql = create_table_sql::<Member>();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS member ("));
        assert!(sql.contains("member_id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("username TEXT NOT NULL"));
        assert!(sql.contains("team_id TEXT,"));
        assert!(sql.contains("FOREIGN KEY (team_id) REFERENCES team(team_id)"));
    }

    #[test]
    fn team_ddl_uses_text_identifier() {
        let sql = create_table_sql::<Team>();
        assert!(sql.contains("team_id TEXT PRIMARY KEY NOT NULL"));
    }

    #[test]
    fn sample_schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        ensure_sample_schema(&conn).expect("first create");
        ensure_sample_schema(&conn).expect("second create");

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('member', 'team')",
                [],
                |row| row.get(0),
            )
            .expect("count tables");
        assert_eq!(tables, 2);
    }
}

//! Table metadata backing query construction.
//!
//! Every filterable column and joinable relation is declared here. Query
//! construction resolves string field paths against this metadata and rejects
//! anything the schema does not name, so a bad path fails before any SQL
//! reaches Postgres.

use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder};

use crate::application::repos::{Entity, QueryError, Value};
use crate::domain::entities::{NewPost, NewUser, PostRecord, UserRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    BigInt,
    Text,
    Bool,
}

impl ColumnKind {
    pub fn name(self) -> &'static str {
        match self {
            ColumnKind::BigInt => "bigint",
            ColumnKind::Text => "text",
            ColumnKind::Bool => "bool",
        }
    }

    pub fn admits(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ColumnKind::BigInt, Value::BigInt(_))
                | (ColumnKind::Text, Value::Text(_))
                | (ColumnKind::Bool, Value::Bool(_))
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// How a relation multiplies base rows when joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    BelongsTo,
    HasMany,
}

#[derive(Debug, Clone, Copy)]
pub struct Relation {
    /// Name used in field paths and join lists, matched case-insensitively.
    pub name: &'static str,
    pub kind: RelationKind,
    pub table: &'static str,
    /// Join column on the owning entity's table.
    pub local_column: &'static str,
    /// Join column on the related table.
    pub foreign_column: &'static str,
    /// Filterable columns of the related table.
    pub columns: &'static [Column],
}

/// Postgres mapping of an [`Entity`]. All entities expose a bigint `id`
/// primary key generated by the database.
pub trait Table: Entity + for<'r> sqlx::FromRow<'r, PgRow> {
    const TABLE: &'static str;
    const COLUMNS: &'static [Column];
    const RELATIONS: &'static [Relation];
    /// Columns written on insert, in `push_insert_values` order.
    const INSERT_COLUMNS: &'static [&'static str];

    fn push_insert_values(qb: &mut QueryBuilder<'_, Postgres>, draft: &Self::Draft);
}

const USER_COLUMNS: &[Column] = &[
    Column {
        name: "id",
        kind: ColumnKind::BigInt,
    },
    Column {
        name: "login",
        kind: ColumnKind::Text,
    },
    Column {
        name: "password_hash",
        kind: ColumnKind::Text,
    },
];

const POST_COLUMNS: &[Column] = &[
    Column {
        name: "id",
        kind: ColumnKind::BigInt,
    },
    Column {
        name: "owner_id",
        kind: ColumnKind::BigInt,
    },
    Column {
        name: "text",
        kind: ColumnKind::Text,
    },
];

impl Table for UserRecord {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [Column] = USER_COLUMNS;
    const RELATIONS: &'static [Relation] = &[Relation {
        name: "posts",
        kind: RelationKind::HasMany,
        table: "posts",
        local_column: "id",
        foreign_column: "owner_id",
        columns: POST_COLUMNS,
    }];
    const INSERT_COLUMNS: &'static [&'static str] = &["login", "password_hash"];

    fn push_insert_values(qb: &mut QueryBuilder<'_, Postgres>, draft: &NewUser) {
        let mut values = qb.separated(", ");
        values.push_bind(draft.login.clone());
        values.push_bind(draft.password_hash.clone());
    }
}

impl Table for PostRecord {
    const TABLE: &'static str = "posts";
    const COLUMNS: &'static [Column] = POST_COLUMNS;
    const RELATIONS: &'static [Relation] = &[Relation {
        name: "user",
        kind: RelationKind::BelongsTo,
        table: "users",
        local_column: "owner_id",
        foreign_column: "id",
        columns: USER_COLUMNS,
    }];
    const INSERT_COLUMNS: &'static [&'static str] = &["owner_id", "text"];

    fn push_insert_values(qb: &mut QueryBuilder<'_, Postgres>, draft: &NewPost) {
        let mut values = qb.separated(", ");
        values.push_bind(draft.owner_id);
        values.push_bind(draft.text.clone());
    }
}

pub fn find_column(columns: &'static [Column], name: &str) -> Option<&'static Column> {
    columns.iter().find(|column| column.name == name)
}

pub fn find_relation<E: Table>(name: &str) -> Option<&'static Relation> {
    E::RELATIONS
        .iter()
        .find(|relation| relation.name.eq_ignore_ascii_case(name))
}

/// Consistency check for the hand-maintained metadata, run once at startup.
pub fn verify<E: Table>() -> Result<(), QueryError> {
    for insert_column in E::INSERT_COLUMNS {
        if find_column(E::COLUMNS, insert_column).is_none() {
            return Err(QueryError::UnknownField {
                entity: E::TABLE,
                field: (*insert_column).to_owned(),
            });
        }
    }
    for relation in E::RELATIONS {
        if find_column(E::COLUMNS, relation.local_column).is_none() {
            return Err(QueryError::UnknownField {
                entity: E::TABLE,
                field: relation.local_column.to_owned(),
            });
        }
        if find_column(relation.columns, relation.foreign_column).is_none() {
            return Err(QueryError::UnknownField {
                entity: relation.table,
                field: relation.foreign_column.to_owned(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_tables_are_consistent() {
        verify::<UserRecord>().expect("users metadata should verify");
        verify::<PostRecord>().expect("posts metadata should verify");
    }

    #[test]
    fn relations_resolve_case_insensitively() {
        assert!(find_relation::<PostRecord>("user").is_some());
        assert!(find_relation::<PostRecord>("User").is_some());
        assert!(find_relation::<PostRecord>("USER").is_some());
        assert!(find_relation::<PostRecord>("owner").is_none());
        assert!(find_relation::<UserRecord>("Posts").is_some());
    }

    #[test]
    fn column_kinds_admit_matching_values_only() {
        assert!(ColumnKind::BigInt.admits(&Value::BigInt(1)));
        assert!(!ColumnKind::BigInt.admits(&Value::Text("1".to_owned())));
        assert!(ColumnKind::Text.admits(&Value::Text("a".to_owned())));
        assert!(!ColumnKind::Bool.admits(&Value::BigInt(0)));
    }
}

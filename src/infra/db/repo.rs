//! Generic Postgres repository.
//!
//! One implementation serves every [`Table`] entity. Filters, joins, ordering
//! and grouping arrive as strings, are validated against the entity metadata
//! in [`schema`](super::schema), and only then rendered into a single SQL
//! statement with bound parameters.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::application::repos::{
    Changes, Cond, Direction, EntityRepo, Filters, FindOpts, OrderBy, QueryError, RepoError, Value,
};
use crate::infra::db::schema::{Relation, RelationKind, Table, find_column, find_relation};
use crate::infra::db::util::{convert_count, map_sqlx_error};

pub struct PgRepo<E: Table> {
    pool: Arc<PgPool>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Table> PgRepo<E> {
    pub(crate) fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Conditions an operation accepts.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CondSupport {
    EqOnly,
    EqBetween,
    EqGtLt,
}

impl CondSupport {
    fn operation(self) -> &'static str {
        match self {
            CondSupport::EqOnly => "find_one_by",
            CondSupport::EqBetween => "find_all_by",
            CondSupport::EqGtLt => "count_by",
        }
    }

    fn admits(self, cond: &Cond) -> bool {
        matches!(
            (self, cond),
            (_, Cond::Eq(_))
                | (CondSupport::EqBetween, Cond::Between(..))
                | (CondSupport::EqGtLt, Cond::Gt(_))
                | (CondSupport::EqGtLt, Cond::Lt(_))
        )
    }
}

struct JoinPlan {
    clauses: Vec<String>,
    /// Relations filters may reference, resolved from the explicit join list.
    filterable: Vec<&'static Relation>,
    distinct: bool,
}

fn resolve_joins<E: Table>(joins: &[&str], eager: &[String]) -> Result<JoinPlan, QueryError> {
    let mut clauses = Vec::new();
    let mut filterable: Vec<&'static Relation> = Vec::new();
    let mut joined_tables: Vec<&'static str> = Vec::new();
    let mut distinct = false;

    for name in joins {
        let relation = find_relation::<E>(name).ok_or_else(|| QueryError::UnknownRelation {
            entity: E::TABLE,
            relation: (*name).to_owned(),
        })?;
        if joined_tables.contains(&relation.name) {
            continue;
        }
        clauses.push(format!(
            "JOIN {} ON {}.{} = {}.{}",
            relation.table,
            relation.table,
            relation.foreign_column,
            E::TABLE,
            relation.local_column
        ));
        joined_tables.push(relation.name);
        filterable.push(relation);
    }

    for name in eager {
        let relation = find_relation::<E>(name).ok_or_else(|| QueryError::UnknownRelation {
            entity: E::TABLE,
            relation: name.clone(),
        })?;
        if relation.kind == RelationKind::HasMany {
            // A has-many left join repeats base rows per related row.
            distinct = true;
        }
        if joined_tables.contains(&relation.name) {
            continue;
        }
        clauses.push(format!(
            "LEFT JOIN {} ON {}.{} = {}.{}",
            relation.table,
            relation.table,
            relation.foreign_column,
            E::TABLE,
            relation.local_column
        ));
        joined_tables.push(relation.name);
    }

    Ok(JoinPlan {
        clauses,
        filterable,
        distinct,
    })
}

fn resolve_path<E: Table>(
    path: &str,
    filterable: &[&'static Relation],
) -> Result<(&'static str, &'static super::schema::Column), QueryError> {
    if path.is_empty() {
        return Err(QueryError::MalformedPath {
            path: path.to_owned(),
        });
    }
    match path.split_once('.') {
        None => {
            let column = find_column(E::COLUMNS, path).ok_or_else(|| QueryError::UnknownField {
                entity: E::TABLE,
                field: path.to_owned(),
            })?;
            Ok((E::TABLE, column))
        }
        Some((relation_name, field)) => {
            if relation_name.is_empty() || field.is_empty() || field.contains('.') {
                return Err(QueryError::MalformedPath {
                    path: path.to_owned(),
                });
            }
            let relation =
                find_relation::<E>(relation_name).ok_or_else(|| QueryError::UnknownRelation {
                    entity: E::TABLE,
                    relation: relation_name.to_owned(),
                })?;
            if !filterable.iter().any(|joined| joined.name == relation.name) {
                return Err(QueryError::MissingJoin {
                    path: path.to_owned(),
                    relation: relation.name.to_owned(),
                });
            }
            let column =
                find_column(relation.columns, field).ok_or_else(|| QueryError::UnknownField {
                    entity: relation.table,
                    field: field.to_owned(),
                })?;
            Ok((relation.table, column))
        }
    }
}

fn check_value(
    column: &super::schema::Column,
    path: &str,
    value: &Value,
) -> Result<(), QueryError> {
    if column.kind.admits(value) {
        return Ok(());
    }
    Err(QueryError::ValueType {
        field: path.to_owned(),
        expected: column.kind.name(),
        got: value.type_name(),
    })
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: &Value) {
    match value {
        Value::BigInt(v) => qb.push_bind(*v),
        Value::Text(v) => qb.push_bind(v.clone()),
        Value::Bool(v) => qb.push_bind(*v),
    };
}

fn apply_filters<E: Table>(
    qb: &mut QueryBuilder<'static, Postgres>,
    filters: &Filters,
    filterable: &[&'static Relation],
    support: CondSupport,
) -> Result<(), QueryError> {
    for (path, cond) in filters.conds() {
        if !support.admits(cond) {
            return Err(QueryError::UnsupportedCondition {
                operation: support.operation(),
                condition: cond.name(),
            });
        }
        let (table, column) = resolve_path::<E>(path, filterable)?;
        match cond {
            Cond::Eq(value) => {
                check_value(column, path, value)?;
                qb.push(format!(" AND {}.{} = ", table, column.name));
                push_value(qb, value);
            }
            Cond::Gt(value) => {
                check_value(column, path, value)?;
                qb.push(format!(" AND {}.{} > ", table, column.name));
                push_value(qb, value);
            }
            Cond::Lt(value) => {
                check_value(column, path, value)?;
                qb.push(format!(" AND {}.{} < ", table, column.name));
                push_value(qb, value);
            }
            Cond::Between(low, high) => {
                check_value(column, path, low)?;
                check_value(column, path, high)?;
                qb.push(format!(" AND {}.{} BETWEEN ", table, column.name));
                push_value(qb, low);
                qb.push(" AND ");
                push_value(qb, high);
            }
        }
    }
    Ok(())
}

fn apply_group_by<E: Table>(
    qb: &mut QueryBuilder<'static, Postgres>,
    fields: &[String],
) -> Result<(), QueryError> {
    if fields.is_empty() {
        return Ok(());
    }
    qb.push(" GROUP BY ");
    let mut separated = qb.separated(", ");
    for field in fields {
        let column = find_column(E::COLUMNS, field).ok_or_else(|| QueryError::UnknownField {
            entity: E::TABLE,
            field: field.clone(),
        })?;
        separated.push(format!("{}.{}", E::TABLE, column.name));
    }
    Ok(())
}

fn apply_order_by<E: Table>(
    qb: &mut QueryBuilder<'static, Postgres>,
    orders: &[OrderBy],
) -> Result<(), QueryError> {
    if orders.is_empty() {
        return Ok(());
    }
    qb.push(" ORDER BY ");
    let mut separated = qb.separated(", ");
    for order in orders {
        let column =
            find_column(E::COLUMNS, &order.field).ok_or_else(|| QueryError::UnknownField {
                entity: E::TABLE,
                field: order.field.clone(),
            })?;
        let direction = match order.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        separated.push(format!("{}.{} {}", E::TABLE, column.name, direction));
    }
    Ok(())
}

fn apply_paging(
    qb: &mut QueryBuilder<'static, Postgres>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<(), QueryError> {
    if limit.is_some_and(|value| value < 0) || offset.is_some_and(|value| value < 0) {
        return Err(QueryError::NegativeBound);
    }
    if let Some(limit) = limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit);
    }
    if let Some(offset) = offset {
        qb.push(" OFFSET ");
        qb.push_bind(offset);
    }
    Ok(())
}

fn select_builder<E: Table>(distinct: bool) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    if distinct {
        qb.push("DISTINCT ");
    }
    {
        let mut columns = qb.separated(", ");
        for column in E::COLUMNS {
            columns.push(format!("{}.{}", E::TABLE, column.name));
        }
    }
    qb.push(" FROM ");
    qb.push(E::TABLE);
    qb
}

fn push_returning<E: Table>(qb: &mut QueryBuilder<'static, Postgres>) {
    let mut columns = qb.separated(", ");
    for column in E::COLUMNS {
        columns.push(column.name);
    }
}

pub(crate) fn build_find_one<E: Table>(id: i64) -> QueryBuilder<'static, Postgres> {
    let mut qb = select_builder::<E>(false);
    qb.push(format!(" WHERE {}.id = ", E::TABLE));
    qb.push_bind(id);
    qb
}

pub(crate) fn build_select<E: Table>(
    filters: &Filters,
    joins: &[&str],
    opts: &FindOpts,
    support: CondSupport,
) -> Result<QueryBuilder<'static, Postgres>, QueryError> {
    let plan = resolve_joins::<E>(joins, &opts.eager_load)?;
    let mut qb = select_builder::<E>(plan.distinct);
    for clause in &plan.clauses {
        qb.push(format!(" {clause}"));
    }
    qb.push(" WHERE 1=1");
    apply_filters::<E>(&mut qb, filters, &plan.filterable, support)?;
    apply_group_by::<E>(&mut qb, &opts.group_by)?;
    apply_order_by::<E>(&mut qb, &opts.order_by)?;
    apply_paging(&mut qb, opts.limit, opts.offset)?;
    Ok(qb)
}

pub(crate) fn build_count<E: Table>(
    filters: &Filters,
    group_by: &[&str],
) -> Result<QueryBuilder<'static, Postgres>, QueryError> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT COUNT({}.id) FROM {} WHERE 1=1",
        E::TABLE,
        E::TABLE
    ));
    apply_filters::<E>(&mut qb, filters, &[], CondSupport::EqGtLt)?;
    if !group_by.is_empty() {
        qb.push(" GROUP BY ");
        let mut separated = qb.separated(", ");
        for field in group_by {
            let column = find_column(E::COLUMNS, field).ok_or_else(|| QueryError::UnknownField {
                entity: E::TABLE,
                field: (*field).to_owned(),
            })?;
            separated.push(format!("{}.{}", E::TABLE, column.name));
        }
    }
    Ok(qb)
}

pub(crate) fn build_insert<E: Table>(draft: &E::Draft) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("INSERT INTO {} (", E::TABLE));
    {
        let mut columns = qb.separated(", ");
        for column in E::INSERT_COLUMNS {
            columns.push(*column);
        }
    }
    qb.push(") VALUES (");
    E::push_insert_values(&mut qb, draft);
    qb.push(") RETURNING ");
    push_returning::<E>(&mut qb);
    qb
}

pub(crate) fn build_update<E: Table>(
    id: i64,
    changes: &Changes,
) -> Result<QueryBuilder<'static, Postgres>, QueryError> {
    if changes.is_empty() {
        return Err(QueryError::EmptyChanges);
    }
    let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", E::TABLE));
    let mut first = true;
    for (field, value) in changes.sets() {
        let column = find_column(E::COLUMNS, field).ok_or_else(|| QueryError::UnknownField {
            entity: E::TABLE,
            field: field.clone(),
        })?;
        check_value(column, field, value)?;
        if !first {
            qb.push(", ");
        }
        first = false;
        qb.push(format!("{} = ", column.name));
        push_value(&mut qb, value);
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);
    qb.push(" RETURNING ");
    push_returning::<E>(&mut qb);
    Ok(qb)
}

pub(crate) fn build_delete<E: Table>(id: i64) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("DELETE FROM {} WHERE id = ", E::TABLE));
    qb.push_bind(id);
    qb
}

#[async_trait]
impl<E: Table> EntityRepo<E> for PgRepo<E> {
    async fn find_one(&self, id: i64) -> Result<Option<E>, RepoError> {
        let mut qb = build_find_one::<E>(id);
        qb.build_query_as::<E>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_all(&self, opts: &FindOpts) -> Result<Vec<E>, RepoError> {
        let mut qb = build_select::<E>(&Filters::new(), &[], opts, CondSupport::EqBetween)?;
        qb.build_query_as::<E>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_one_by(
        &self,
        filters: &Filters,
        joins: &[&str],
    ) -> Result<Option<E>, RepoError> {
        let opts = FindOpts::new().limit(1);
        let mut qb = build_select::<E>(filters, joins, &opts, CondSupport::EqOnly)?;
        qb.build_query_as::<E>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_all_by(
        &self,
        filters: &Filters,
        joins: &[&str],
        opts: &FindOpts,
    ) -> Result<Vec<E>, RepoError> {
        let mut qb = build_select::<E>(filters, joins, opts, CondSupport::EqBetween)?;
        qb.build_query_as::<E>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn count_by(&self, filters: &Filters, group_by: &[&str]) -> Result<u64, RepoError> {
        let mut qb = build_count::<E>(filters, group_by)?;
        let row = qb
            .build()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        match row {
            Some(row) => convert_count(row.try_get::<i64, _>(0).map_err(map_sqlx_error)?),
            None => Ok(0),
        }
    }

    async fn add(&self, draft: E::Draft) -> Result<E, RepoError> {
        let mut qb = build_insert::<E>(&draft);
        qb.build_query_as::<E>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn upd(&self, id: i64, changes: &Changes) -> Result<Option<E>, RepoError> {
        let mut qb = build_update::<E>(id, changes)?;
        qb.build_query_as::<E>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let mut qb = build_delete::<E>(id);
        let result = qb
            .build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}

//! Repository contract shared by persistence adapters.
//!
//! Call sites describe lookups with string field paths instead of SQL. A
//! path is either a bare column (`"login"`) or a relation column
//! (`"user.login"`). Relation segments resolve against the entity metadata
//! case-insensitively and must name a relation the call also joins.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{NewPost, NewUser, PostRecord, UserRecord};

/// Rejected query construction. Raised before any SQL reaches the database.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("unknown field `{field}` on `{entity}`")]
    UnknownField { entity: &'static str, field: String },
    #[error("unknown relation `{relation}` on `{entity}`")]
    UnknownRelation {
        entity: &'static str,
        relation: String,
    },
    #[error("field path `{path}` requires relation `{relation}` to be joined")]
    MissingJoin { path: String, relation: String },
    #[error("malformed field path `{path}`")]
    MalformedPath { path: String },
    #[error("`{condition}` conditions are not supported by `{operation}`")]
    UnsupportedCondition {
        operation: &'static str,
        condition: &'static str,
    },
    #[error("expected a {expected} value for `{field}`, got {got}")]
    ValueType {
        field: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("limit and offset must not be negative")]
    NegativeBound,
    #[error("update requires at least one field")]
    EmptyChanges,
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// A filter or update value. Only column types present in the schema are
/// representable, so type mismatches surface while the query is built.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    BigInt(i64),
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::BigInt(_) => "bigint",
            Value::Text(_) => "text",
            Value::Bool(_) => "bool",
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::BigInt(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Eq(Value),
    Gt(Value),
    Lt(Value),
    Between(Value, Value),
}

impl Cond {
    pub fn name(&self) -> &'static str {
        match self {
            Cond::Eq(_) => "eq",
            Cond::Gt(_) => "gt",
            Cond::Lt(_) => "lt",
            Cond::Between(..) => "between",
        }
    }
}

/// Ordered field conditions combined with `AND`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    conds: Vec<(String, Cond)>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conds.push((path.into(), Cond::Eq(value.into())));
        self
    }

    pub fn gt(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conds.push((path.into(), Cond::Gt(value.into())));
        self
    }

    pub fn lt(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conds.push((path.into(), Cond::Lt(value.into())));
        self
    }

    pub fn between(
        mut self,
        path: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.conds
            .push((path.into(), Cond::Between(low.into(), high.into())));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conds.is_empty()
    }

    pub fn conds(&self) -> &[(String, Cond)] {
        &self.conds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Listing options shared by [`EntityRepo::find_all`] and
/// [`EntityRepo::find_all_by`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOpts {
    pub order_by: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub group_by: Vec<String>,
    /// Relations to LEFT JOIN so related rows are fetched in the same
    /// statement instead of per-row follow-up queries.
    pub eager_load: Vec<String>,
}

impl FindOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn group(mut self, field: impl Into<String>) -> Self {
        self.group_by.push(field.into());
        self
    }

    pub fn eager(mut self, relation: impl Into<String>) -> Self {
        self.eager_load.push(relation.into());
        self
    }
}

/// Field assignments applied by [`EntityRepo::upd`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    sets: Vec<(String, Value)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn sets(&self) -> &[(String, Value)] {
        &self.sets
    }
}

/// Marker for records a repository can manage.
pub trait Entity: Send + Sync + Unpin + 'static {
    /// Insert form accepted by [`EntityRepo::add`].
    type Draft: Send + Sync + 'static;
}

impl Entity for UserRecord {
    type Draft = NewUser;
}

impl Entity for PostRecord {
    type Draft = NewPost;
}

#[async_trait]
pub trait EntityRepo<E: Entity>: Send + Sync {
    /// Fetches a record by primary key.
    async fn find_one(&self, id: i64) -> Result<Option<E>, RepoError>;

    /// Lists records without filters. Options still apply.
    async fn find_all(&self, opts: &FindOpts) -> Result<Vec<E>, RepoError>;

    /// Fetches the first record matching `filters`. Accepts `eq` conditions
    /// only.
    async fn find_one_by(&self, filters: &Filters, joins: &[&str])
    -> Result<Option<E>, RepoError>;

    /// Lists records matching `filters`. Accepts `eq` and `between`
    /// conditions.
    async fn find_all_by(
        &self,
        filters: &Filters,
        joins: &[&str],
        opts: &FindOpts,
    ) -> Result<Vec<E>, RepoError>;

    /// Counts records matching `filters`. Accepts `eq`, `gt` and `lt`
    /// conditions. With `group_by` the count of the first group is returned,
    /// zero when no group exists.
    async fn count_by(&self, filters: &Filters, group_by: &[&str]) -> Result<u64, RepoError>;

    /// Inserts a draft and returns the stored record.
    async fn add(&self, draft: E::Draft) -> Result<E, RepoError>;

    /// Applies `changes` to the record with the given id, returning the
    /// updated record if one exists.
    async fn upd(&self, id: i64, changes: &Changes) -> Result<Option<E>, RepoError>;

    /// Deletes by primary key. Returns whether a record was removed.
    async fn delete(&self, id: i64) -> Result<bool, RepoError>;
}

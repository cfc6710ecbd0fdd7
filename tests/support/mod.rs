//! In-memory repository fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use bacheca::application::repos::{Changes, Cond, EntityRepo, Filters, FindOpts, RepoError, Value};
use bacheca::domain::entities::{NewPost, NewUser, PostRecord, UserRecord};

/// Backing store for `EntityRepo<UserRecord>` enforcing the same login
/// uniqueness as the `users` table.
#[derive(Default)]
pub struct FakeUsers {
    rows: Mutex<Vec<UserRecord>>,
    next_id: AtomicI64,
}

fn user_matches(user: &UserRecord, path: &str, cond: &Cond) -> bool {
    match (path, cond) {
        ("id", Cond::Eq(Value::BigInt(id))) => user.id == *id,
        ("login", Cond::Eq(Value::Text(login))) => user.login == *login,
        _ => false,
    }
}

#[async_trait]
impl EntityRepo<UserRecord> for FakeUsers {
    async fn find_one(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().find(|user| user.id == id).cloned())
    }

    async fn find_all(&self, _opts: &FindOpts) -> Result<Vec<UserRecord>, RepoError> {
        Ok(self.rows.lock().await.clone())
    }

    async fn find_one_by(
        &self,
        filters: &Filters,
        _joins: &[&str],
    ) -> Result<Option<UserRecord>, RepoError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|user| {
                filters
                    .conds()
                    .iter()
                    .all(|(path, cond)| user_matches(user, path, cond))
            })
            .cloned())
    }

    async fn find_all_by(
        &self,
        filters: &Filters,
        _joins: &[&str],
        _opts: &FindOpts,
    ) -> Result<Vec<UserRecord>, RepoError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|user| {
                filters
                    .conds()
                    .iter()
                    .all(|(path, cond)| user_matches(user, path, cond))
            })
            .cloned()
            .collect())
    }

    async fn count_by(&self, filters: &Filters, _group_by: &[&str]) -> Result<u64, RepoError> {
        let rows = self.rows.lock().await;
        let count = rows
            .iter()
            .filter(|user| {
                filters
                    .conds()
                    .iter()
                    .all(|(path, cond)| user_matches(user, path, cond))
            })
            .count();
        Ok(count as u64)
    }

    async fn add(&self, draft: NewUser) -> Result<UserRecord, RepoError> {
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|user| user.login == draft.login) {
            return Err(RepoError::Duplicate {
                constraint: "users_login_key".to_owned(),
            });
        }
        let user = UserRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            login: draft.login,
            password_hash: draft.password_hash,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn upd(&self, id: i64, changes: &Changes) -> Result<Option<UserRecord>, RepoError> {
        let mut rows = self.rows.lock().await;
        let Some(user) = rows.iter_mut().find(|user| user.id == id) else {
            return Ok(None);
        };
        for (field, value) in changes.sets() {
            match (field.as_str(), value) {
                ("login", Value::Text(login)) => user.login = login.clone(),
                ("password_hash", Value::Text(hash)) => user.password_hash = hash.clone(),
                _ => {}
            }
        }
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|user| user.id != id);
        Ok(rows.len() < before)
    }
}

/// Backing store for `EntityRepo<PostRecord>`. Counts `find_all_by` calls so
/// tests can tell cached reads from repository reads.
#[derive(Default)]
pub struct FakePosts {
    rows: Mutex<Vec<PostRecord>>,
    next_id: AtomicI64,
    list_calls: AtomicUsize,
}

impl FakePosts {
    /// Number of `find_all_by` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

fn post_matches(post: &PostRecord, path: &str, cond: &Cond) -> bool {
    match (path, cond) {
        ("id", Cond::Eq(Value::BigInt(id))) => post.id == *id,
        ("owner_id", Cond::Eq(Value::BigInt(owner))) => post.owner_id == *owner,
        ("text", Cond::Eq(Value::Text(text))) => post.text == *text,
        _ => false,
    }
}

#[async_trait]
impl EntityRepo<PostRecord> for FakePosts {
    async fn find_one(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().find(|post| post.id == id).cloned())
    }

    async fn find_all(&self, _opts: &FindOpts) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self.rows.lock().await.clone())
    }

    async fn find_one_by(
        &self,
        filters: &Filters,
        _joins: &[&str],
    ) -> Result<Option<PostRecord>, RepoError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|post| {
                filters
                    .conds()
                    .iter()
                    .all(|(path, cond)| post_matches(post, path, cond))
            })
            .cloned())
    }

    async fn find_all_by(
        &self,
        filters: &Filters,
        _joins: &[&str],
        _opts: &FindOpts,
    ) -> Result<Vec<PostRecord>, RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|post| {
                filters
                    .conds()
                    .iter()
                    .all(|(path, cond)| post_matches(post, path, cond))
            })
            .cloned()
            .collect())
    }

    async fn count_by(&self, filters: &Filters, _group_by: &[&str]) -> Result<u64, RepoError> {
        let rows = self.rows.lock().await;
        let count = rows
            .iter()
            .filter(|post| {
                filters
                    .conds()
                    .iter()
                    .all(|(path, cond)| post_matches(post, path, cond))
            })
            .count();
        Ok(count as u64)
    }

    async fn add(&self, draft: NewPost) -> Result<PostRecord, RepoError> {
        let post = PostRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            owner_id: draft.owner_id,
            text: draft.text,
        };
        self.rows.lock().await.push(post.clone());
        Ok(post)
    }

    async fn upd(&self, id: i64, changes: &Changes) -> Result<Option<PostRecord>, RepoError> {
        let mut rows = self.rows.lock().await;
        let Some(post) = rows.iter_mut().find(|post| post.id == id) else {
            return Ok(None);
        };
        for (field, value) in changes.sets() {
            match (field.as_str(), value) {
                ("text", Value::Text(text)) => post.text = text.clone(),
                ("owner_id", Value::BigInt(owner)) => post.owner_id = *owner,
                _ => {}
            }
        }
        Ok(Some(post.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|post| post.id != id);
        Ok(rows.len() < before)
    }
}

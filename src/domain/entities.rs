//! Domain entities mirrored from persistent storage.

use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
}

/// Insert form of [`UserRecord`], without the generated id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub login: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PostRecord {
    pub id: i64,
    pub owner_id: i64,
    pub text: String,
}

/// Insert form of [`PostRecord`], without the generated id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub owner_id: i64,
    pub text: String,
}

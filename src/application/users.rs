//! Account registration and login.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::auth::{AuthError, TokenAuthority, digest_password, verify_password};
use crate::application::repos::{EntityRepo, Filters, RepoError};
use crate::domain::entities::{NewUser, UserRecord};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("login `{login}` is already taken")]
    LoginTaken { login: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct UserService {
    users: Arc<dyn EntityRepo<UserRecord>>,
    tokens: TokenAuthority,
}

impl UserService {
    pub fn new(users: Arc<dyn EntityRepo<UserRecord>>, tokens: TokenAuthority) -> Self {
        Self { users, tokens }
    }

    /// Registers a login and returns a fresh access token.
    ///
    /// Uniqueness rides on the `users` login constraint, so two concurrent
    /// sign-ups for the same login cannot both succeed.
    pub async fn sign_up(&self, login: &str, password: &str) -> Result<String, UserError> {
        let draft = NewUser {
            login: login.to_owned(),
            password_hash: digest_password(password),
        };
        let user = match self.users.add(draft).await {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => {
                return Err(UserError::LoginTaken {
                    login: login.to_owned(),
                });
            }
            Err(other) => return Err(other.into()),
        };
        info!(target = "bacheca::users", user_id = user.id, "account created");
        Ok(self.tokens.issue(user.id, &user.login)?)
    }

    /// Verifies credentials and returns a fresh access token.
    pub async fn login(&self, login: &str, password: &str) -> Result<String, UserError> {
        let filters = Filters::new().eq("login", login);
        let user = self
            .users
            .find_one_by(&filters, &[])
            .await?
            .ok_or(UserError::NotFound)?;
        if !verify_password(password, &user.password_hash) {
            return Err(UserError::WrongPassword);
        }
        Ok(self.tokens.issue(user.id, &user.login)?)
    }
}

//! Route handlers, one submodule per resource.
//!
//! Error-to-response conversions shared by the handlers are defined here.

mod posts;
mod users;

pub use posts::*;
pub use users::*;

use axum::http::StatusCode;

use crate::application::posts::PostError;
use crate::application::repos::RepoError;
use crate::application::users::UserError;

use super::error::{ApiError, codes};

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Query(query) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::QUERY,
            "Query construction failed",
            Some(query.to_string()),
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(message),
        ),
    }
}

pub(crate) fn user_to_api(err: UserError) -> ApiError {
    match err {
        UserError::NotFound => ApiError::not_found("User not found"),
        UserError::WrongPassword => ApiError::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Password is wrong",
            None,
        ),
        UserError::LoginTaken { login } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "User already exists",
            Some(login),
        ),
        UserError::Auth(auth) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::TOKEN,
            "Token issuance failed",
            Some(auth.to_string()),
        ),
        UserError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn post_to_api(err: PostError) -> ApiError {
    match err {
        PostError::NotFound => ApiError::not_found("Post not found"),
        PostError::Repo(repo) => repo_to_api(repo),
    }
}

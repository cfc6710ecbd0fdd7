//! Application services layer scaffolding.

pub mod auth;
pub mod error;
pub mod posts;
pub mod repos;
pub mod users;

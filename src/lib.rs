//! Bacheca: a small token-authenticated message board backend.
//!
//! Layered as domain (entities), application (repository vocabulary,
//! services, auth), and infra (Postgres, Redis, HTTP, telemetry), with a
//! typed configuration layer feeding the binary.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;

//! Account handlers

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use super::user_to_api;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{ApiResult, LoginRequest, SignUpRequest, TokenData};
use crate::infra::http::state::ApiState;

pub async fn sign_up(
    State(state): State<ApiState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.login.trim().is_empty() {
        return Err(ApiError::bad_request("Login cannot be empty"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::bad_request("Password cannot be empty"));
    }

    let token = state
        .users
        .sign_up(&payload.login, &payload.password)
        .await
        .map_err(user_to_api)?;

    Ok(ApiResult::ok(TokenData { token }))
}

pub async fn login(
    State(state): State<ApiState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state
        .users
        .login(&payload.login, &payload.password)
        .await
        .map_err(user_to_api)?;

    Ok(ApiResult::ok(TokenData { token }))
}

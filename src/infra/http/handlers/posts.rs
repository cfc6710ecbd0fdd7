//! Post handlers

use axum::Json;
use axum::extract::{Extension, State};
use axum::response::IntoResponse;

use crate::application::auth::CurrentUser;

use super::post_to_api;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{
    AddPostRequest, ApiResult, DeletePostRequest, PostCreatedData, PostDeletedData,
};
use crate::infra::http::state::ApiState;

pub async fn create_post(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<AddPostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.text.len() > state.max_post_bytes {
        return Err(ApiError::payload_too_large("Post text is too large"));
    }

    let post_id = state
        .posts
        .create_post(user.id, payload.text)
        .await
        .map_err(post_to_api)?;

    Ok(ApiResult::ok(PostCreatedData { post_id }))
}

pub async fn list_posts(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let posts = state
        .posts
        .list_posts(user.id)
        .await
        .map_err(post_to_api)?;

    Ok(ApiResult::ok(posts))
}

pub async fn delete_post(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<DeletePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .posts
        .delete_post(user.id, payload.post_id)
        .await
        .map_err(post_to_api)?;

    Ok(ApiResult::ok(PostDeletedData { deleted }))
}

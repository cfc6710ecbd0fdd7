use axum::Json;
use serde::{Deserialize, Serialize};

/// Envelope wrapping every response body: `{"success", "message", "data"}`.
#[derive(Debug, Deserialize, Serialize)]
pub struct ApiResult<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResult<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: "ok".to_string(),
            data: Some(data),
        })
    }
}

impl ApiResult<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SignUpRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AddPostRequest {
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DeletePostRequest {
    pub post_id: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenData {
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PostCreatedData {
    pub post_id: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PostDeletedData {
    pub deleted: bool,
}

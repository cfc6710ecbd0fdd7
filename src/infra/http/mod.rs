pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use sqlx::Error as SqlxError;

use crate::application::error::ErrorReport;

use middleware::{log_responses, require_auth, set_request_context};

pub fn build_router(state: ApiState) -> Router {
    let auth_state = state.clone();

    let protected = Router::new()
        .route("/post/add", post(handlers::create_post))
        .route("/post/all", get(handlers::list_posts))
        .route("/post", delete(handlers::delete_post))
        .layer(axum_middleware::from_fn_with_state(auth_state, require_auth));

    Router::new()
        .route("/user/sign-up", post(handlers::sign_up))
        .route("/user/login", post(handlers::login))
        .route("/_health/db", get(db_health))
        .merge(protected)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn db_health(State(state): State<ApiState>) -> Response {
    db_health_response(state.db.health_check().await)
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

use std::sync::Arc;

use crate::application::auth::TokenAuthority;
use crate::application::posts::PostService;
use crate::application::users::UserService;
use crate::infra::db::Database;

#[derive(Clone)]
pub struct ApiState {
    pub users: Arc<UserService>,
    pub posts: Arc<PostService>,
    pub tokens: TokenAuthority,
    pub db: Database,
    pub max_post_bytes: usize,
}

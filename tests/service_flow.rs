//! Service-level coverage over in-memory fakes: account registration,
//! credential checks, and the cached post listing life cycle.

mod support;

use std::sync::Arc;

use time::Duration;

use bacheca::application::auth::TokenAuthority;
use bacheca::application::posts::{PostError, PostService, PostSummary, posts_cache_key};
use bacheca::application::repos::EntityRepo;
use bacheca::application::users::{UserError, UserService};
use bacheca::domain::entities::{PostRecord, UserRecord};
use bacheca::infra::cache::{CacheClient, MemoryCache};
use support::{FakePosts, FakeUsers};

const LIST_TTL_SECONDS: u64 = 300;

fn token_authority() -> TokenAuthority {
    TokenAuthority::new("service-flow-secret", Duration::minutes(30))
}

fn user_service(users: Arc<FakeUsers>) -> UserService {
    let repo: Arc<dyn EntityRepo<UserRecord>> = users;
    UserService::new(repo, token_authority())
}

fn post_service(posts: Arc<FakePosts>, cache: Option<Arc<MemoryCache>>) -> PostService {
    let repo: Arc<dyn EntityRepo<PostRecord>> = posts;
    let cache = cache.map(|cache| cache as Arc<dyn CacheClient>);
    PostService::new(repo, cache, LIST_TTL_SECONDS)
}

#[tokio::test]
async fn sign_up_then_login_round_trip() {
    let service = user_service(Arc::new(FakeUsers::default()));

    let token = service
        .sign_up("alice", "pw1")
        .await
        .expect("sign up should succeed");
    let claims = token_authority()
        .verify(&token)
        .expect("issued token should verify");
    assert_eq!(claims.sub, 1);
    assert_eq!(claims.login, "alice");

    let login_token = service
        .login("alice", "pw1")
        .await
        .expect("login should succeed");
    let claims = token_authority()
        .verify(&login_token)
        .expect("login token should verify");
    assert_eq!(claims.sub, 1);

    assert!(matches!(
        service.login("alice", "wrong").await,
        Err(UserError::WrongPassword)
    ));
    assert!(matches!(
        service.login("bob", "pw1").await,
        Err(UserError::NotFound)
    ));
}

#[tokio::test]
async fn duplicate_sign_up_reports_taken_login() {
    let service = user_service(Arc::new(FakeUsers::default()));

    service
        .sign_up("alice", "pw1")
        .await
        .expect("first sign up should succeed");

    match service.sign_up("alice", "other").await {
        Err(UserError::LoginTaken { login }) => assert_eq!(login, "alice"),
        other => panic!("expected LoginTaken, got {other:?}"),
    }
}

#[tokio::test]
async fn post_flow_create_list_delete() {
    let service = post_service(Arc::new(FakePosts::default()), None);
    let owner = 7;

    let post_id = service
        .create_post(owner, "hello".to_owned())
        .await
        .expect("create should succeed");

    let listing = service.list_posts(owner).await.expect("list should succeed");
    assert_eq!(
        listing,
        vec![PostSummary {
            id: post_id,
            text: "hello".to_owned()
        }]
    );

    let deleted = service
        .delete_post(owner, post_id)
        .await
        .expect("delete should succeed");
    assert!(deleted);

    let listing = service.list_posts(owner).await.expect("list should succeed");
    assert!(listing.is_empty());

    assert!(matches!(
        service.delete_post(owner, post_id).await,
        Err(PostError::NotFound)
    ));
}

#[tokio::test]
async fn foreign_posts_stay_invisible() {
    let service = post_service(Arc::new(FakePosts::default()), None);

    let post_id = service
        .create_post(1, "mine".to_owned())
        .await
        .expect("create should succeed");

    // Another account cannot delete it, and cannot tell it exists.
    assert!(matches!(
        service.delete_post(2, post_id).await,
        Err(PostError::NotFound)
    ));
    assert!(service.list_posts(2).await.expect("list should succeed").is_empty());

    let listing = service.list_posts(1).await.expect("list should succeed");
    assert_eq!(listing.len(), 1);
}

#[tokio::test]
async fn listing_is_served_from_cache_until_invalidated() {
    let posts = Arc::new(FakePosts::default());
    let cache = Arc::new(MemoryCache::new());
    let service = post_service(posts.clone(), Some(cache.clone()));
    let owner = 7;
    let key = posts_cache_key(owner);
    assert_eq!(key, "user:7:posts");

    service
        .create_post(owner, "hello".to_owned())
        .await
        .expect("create should succeed");
    assert_eq!(posts.list_calls(), 0);

    let first = service.list_posts(owner).await.expect("list should succeed");
    assert_eq!(posts.list_calls(), 1);
    assert!(cache.contains(&key));
    assert_eq!(cache.ttl_seconds(&key), Some(LIST_TTL_SECONDS));

    let second = service.list_posts(owner).await.expect("list should succeed");
    assert_eq!(posts.list_calls(), 1, "warm read must not touch the repository");
    assert_eq!(first, second);

    service
        .create_post(owner, "second".to_owned())
        .await
        .expect("create should succeed");
    assert!(!cache.contains(&key), "creating a post must drop the cached listing");

    let third = service.list_posts(owner).await.expect("list should succeed");
    assert_eq!(posts.list_calls(), 2);
    assert_eq!(third.len(), 2);
}

#[tokio::test]
async fn delete_invalidates_cached_listing() {
    let posts = Arc::new(FakePosts::default());
    let cache = Arc::new(MemoryCache::new());
    let service = post_service(posts.clone(), Some(cache.clone()));
    let owner = 3;
    let key = posts_cache_key(owner);

    let post_id = service
        .create_post(owner, "hello".to_owned())
        .await
        .expect("create should succeed");
    service.list_posts(owner).await.expect("list should succeed");
    assert!(cache.contains(&key));

    service
        .delete_post(owner, post_id)
        .await
        .expect("delete should succeed");
    assert!(!cache.contains(&key), "deleting a post must drop the cached listing");

    let listing = service.list_posts(owner).await.expect("list should succeed");
    assert!(listing.is_empty());
    assert_eq!(posts.list_calls(), 2);
}

#[tokio::test]
async fn cold_warm_and_uncached_listings_serialize_identically() {
    let posts = Arc::new(FakePosts::default());
    let cache = Arc::new(MemoryCache::new());
    let cached = post_service(posts.clone(), Some(cache));
    let uncached = post_service(posts.clone(), None);
    let owner = 7;

    cached
        .create_post(owner, "hello".to_owned())
        .await
        .expect("create should succeed");
    cached
        .create_post(owner, "world".to_owned())
        .await
        .expect("create should succeed");

    let cold = cached.list_posts(owner).await.expect("list should succeed");
    let warm = cached.list_posts(owner).await.expect("list should succeed");
    let plain = uncached.list_posts(owner).await.expect("list should succeed");

    let cold_bytes = serde_json::to_vec(&cold).expect("listing should encode");
    let warm_bytes = serde_json::to_vec(&warm).expect("listing should encode");
    let plain_bytes = serde_json::to_vec(&plain).expect("listing should encode");
    assert_eq!(cold_bytes, warm_bytes);
    assert_eq!(cold_bytes, plain_bytes);
}

#[tokio::test]
async fn cache_outage_degrades_to_repository_reads() {
    let posts = Arc::new(FakePosts::default());
    let cache = Arc::new(MemoryCache::new());
    let service = post_service(posts.clone(), Some(cache.clone()));
    let owner = 7;

    cache.set_unavailable(true);

    let post_id = service
        .create_post(owner, "hello".to_owned())
        .await
        .expect("create must succeed while the cache is down");

    let listing = service.list_posts(owner).await.expect("list should succeed");
    assert_eq!(listing, vec![PostSummary {
        id: post_id,
        text: "hello".to_owned()
    }]);
    assert_eq!(posts.list_calls(), 1);

    service.list_posts(owner).await.expect("list should succeed");
    assert_eq!(posts.list_calls(), 2, "every read goes to the repository while the cache is down");

    cache.set_unavailable(false);

    service.list_posts(owner).await.expect("list should succeed");
    assert_eq!(posts.list_calls(), 3);
    service.list_posts(owner).await.expect("list should succeed");
    assert_eq!(posts.list_calls(), 3, "recovered cache serves warm reads again");
}

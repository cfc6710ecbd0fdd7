//! Post publishing and cached listing.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::application::repos::{EntityRepo, Filters, FindOpts, RepoError};
use crate::domain::entities::{NewPost, PostRecord};
use crate::infra::cache::CacheClient;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Wire and cache form of a post, without the owner id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: i64,
    pub text: String,
}

/// Cache key for a user's post listing.
pub fn posts_cache_key(owner_id: i64) -> String {
    format!("user:{owner_id}:posts")
}

pub struct PostService {
    posts: Arc<dyn EntityRepo<PostRecord>>,
    cache: Option<Arc<dyn CacheClient>>,
    list_ttl_seconds: u64,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn EntityRepo<PostRecord>>,
        cache: Option<Arc<dyn CacheClient>>,
        list_ttl_seconds: u64,
    ) -> Self {
        Self {
            posts,
            cache,
            list_ttl_seconds,
        }
    }

    /// Stores a post for `owner_id` and returns its id.
    pub async fn create_post(&self, owner_id: i64, text: String) -> Result<i64, PostError> {
        let post = self.posts.add(NewPost { owner_id, text }).await?;
        self.invalidate_listing(owner_id).await;
        Ok(post.id)
    }

    /// Lists the caller's posts. Reads go through the cache when one is
    /// configured; any cache failure degrades to a repository read.
    pub async fn list_posts(&self, owner_id: i64) -> Result<Vec<PostSummary>, PostError> {
        let key = posts_cache_key(owner_id);
        if let Some(summaries) = self.read_cached_listing(&key).await {
            return Ok(summaries);
        }

        let filters = Filters::new().eq("owner_id", owner_id);
        let records = self
            .posts
            .find_all_by(&filters, &[], &FindOpts::new())
            .await?;
        let summaries: Vec<PostSummary> = records
            .into_iter()
            .map(|post| PostSummary {
                id: post.id,
                text: post.text,
            })
            .collect();

        self.store_listing(&key, &summaries).await;
        Ok(summaries)
    }

    /// Deletes one of the caller's posts. Posts of other users read as
    /// absent, so post ids cannot be probed across accounts.
    pub async fn delete_post(&self, owner_id: i64, post_id: i64) -> Result<bool, PostError> {
        let post = self
            .posts
            .find_one(post_id)
            .await?
            .ok_or(PostError::NotFound)?;
        if post.owner_id != owner_id {
            return Err(PostError::NotFound);
        }
        let deleted = self.posts.delete(post_id).await?;
        self.invalidate_listing(owner_id).await;
        Ok(deleted)
    }

    async fn read_cached_listing(&self, key: &str) -> Option<Vec<PostSummary>> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(summaries) => {
                    counter!("bacheca_post_list_cache_hit_total").increment(1);
                    Some(summaries)
                }
                Err(err) => {
                    counter!("bacheca_post_list_cache_error_total").increment(1);
                    warn!(
                        target = "bacheca::posts",
                        key = %key,
                        error = %err,
                        "cached listing is not decodable, dropping it"
                    );
                    if let Err(err) = cache.del(key).await {
                        warn!(
                            target = "bacheca::posts",
                            key = %key,
                            error = %err,
                            "dropping undecodable listing failed"
                        );
                    }
                    None
                }
            },
            Ok(None) => {
                counter!("bacheca_post_list_cache_miss_total").increment(1);
                None
            }
            Err(err) => {
                counter!("bacheca_post_list_cache_error_total").increment(1);
                warn!(
                    target = "bacheca::posts",
                    key = %key,
                    error = %err,
                    "cache read failed, serving from the database"
                );
                None
            }
        }
    }

    async fn store_listing(&self, key: &str, summaries: &[PostSummary]) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let bytes = match serde_json::to_vec(summaries) {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) => {
                warn!(
                    target = "bacheca::posts",
                    key = %key,
                    error = %err,
                    "listing cannot be encoded for caching"
                );
                return;
            }
        };
        if let Err(err) = cache.set_ex(key, bytes, self.list_ttl_seconds).await {
            counter!("bacheca_post_list_cache_error_total").increment(1);
            warn!(
                target = "bacheca::posts",
                key = %key,
                error = %err,
                "cache write failed"
            );
        }
    }

    async fn invalidate_listing(&self, owner_id: i64) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let key = posts_cache_key(owner_id);
        match cache.del(&key).await {
            Ok(()) => {
                counter!("bacheca_post_list_cache_invalidated_total").increment(1);
            }
            Err(err) => {
                counter!("bacheca_post_list_cache_error_total").increment(1);
                warn!(
                    target = "bacheca::posts",
                    key = %key,
                    error = %err,
                    "cache invalidation failed"
                );
            }
        }
    }
}

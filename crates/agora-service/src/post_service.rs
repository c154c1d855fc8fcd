//! Post service trait definition.

use crate::dto::CreatePostRequest;
use agora_core::{AgoraResult, Interface, Post, PostId, PostListing, UserId};
use async_trait::async_trait;

/// Posts write and read path.
///
/// Writes commit to the system of record, publish the matching event, and
/// invalidate the cache before returning. Reads go through the cache.
#[async_trait]
pub trait PostService: Interface + Send + Sync {
    /// Creates a post and announces it with `post.created`.
    async fn create_post(&self, request: CreatePostRequest) -> AgoraResult<Post>;

    /// Gets a post by ID.
    async fn get_post(&self, id: &PostId) -> AgoraResult<Post>;

    /// Lists posts newest first. `page` is 1-based.
    async fn list_posts(&self, page: usize) -> AgoraResult<PostListing>;

    /// Deletes a post owned by `user_id` and announces it with `post.deleted`.
    async fn delete_post(&self, id: &PostId, user_id: &UserId) -> AgoraResult<()>;
}

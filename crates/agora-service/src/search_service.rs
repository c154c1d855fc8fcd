//! Search service trait definition.

use agora_core::{AgoraResult, Interface, PostCreated, PostDeleted, SearchEntry};
use async_trait::async_trait;

/// Search projection of the posts.
#[async_trait]
pub trait SearchService: Interface + Send + Sync {
    /// Finds posts matching `query`, best matches first.
    async fn search(&self, query: &str) -> AgoraResult<Vec<SearchEntry>>;

    /// Projects a created post into the index.
    async fn index_post(&self, event: PostCreated) -> AgoraResult<()>;

    /// Removes a deleted post from the index. Returns false if it was unknown.
    async fn remove_post(&self, event: &PostDeleted) -> AgoraResult<bool>;
}

//! Repository trait definitions.

use agora_core::{
    AgoraResult, Interface, Media, MediaId, Page, PageRequest, Post, PostId, SearchEntry, StoredObject,
};
use async_trait::async_trait;

/// Posts system of record.
#[async_trait]
pub trait PostRepository: Interface + Send + Sync {
    /// Finds a post by ID.
    async fn find_by_id(&self, id: &PostId) -> AgoraResult<Option<Post>>;

    /// Finds one page of posts, newest first.
    async fn find_page(&self, page: PageRequest) -> AgoraResult<Page<Post>>;

    /// Saves a post.
    async fn save(&self, post: &Post) -> AgoraResult<Post>;

    /// Deletes a post by ID. Returns false if it did not exist.
    async fn delete(&self, id: &PostId) -> AgoraResult<bool>;
}

/// Secondary read index fed by post events.
///
/// Writes are idempotent so redelivered events are harmless.
#[async_trait]
pub trait SearchRepository: Interface + Send + Sync {
    /// Inserts or replaces the entry for its post.
    async fn upsert(&self, entry: &SearchEntry) -> AgoraResult<()>;

    /// Removes the entry for a post. Returns false if there was none.
    async fn delete_by_post_id(&self, post_id: &PostId) -> AgoraResult<bool>;

    /// Finds the entry for a post.
    async fn find_by_post_id(&self, post_id: &PostId) -> AgoraResult<Option<SearchEntry>>;

    /// Finds entries matching any whitespace-separated term, best first.
    async fn search(&self, query: &str, limit: usize) -> AgoraResult<Vec<SearchEntry>>;
}

/// Media records.
#[async_trait]
pub trait MediaRepository: Interface + Send + Sync {
    /// Saves a media record.
    async fn save(&self, media: &Media) -> AgoraResult<Media>;

    /// Finds the records with the given IDs. Unknown IDs are skipped.
    async fn find_by_ids(&self, ids: &[MediaId]) -> AgoraResult<Vec<Media>>;

    /// Lists all records, newest first.
    async fn find_all(&self) -> AgoraResult<Vec<Media>>;

    /// Deletes a record. Returns false if it did not exist.
    async fn delete(&self, id: &MediaId) -> AgoraResult<bool>;
}

/// Binary object storage.
#[async_trait]
pub trait ObjectStore: Interface + Send + Sync {
    /// Uploads a buffer and returns its public ID and URL.
    async fn upload(&self, bytes: &[u8], file_name: &str, mime_type: &str) -> AgoraResult<StoredObject>;

    /// Deletes an object by public ID.
    async fn delete(&self, public_id: &str) -> AgoraResult<()>;
}

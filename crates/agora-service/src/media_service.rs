//! Media service trait definition.

use crate::dto::UploadMediaRequest;
use agora_core::{AgoraResult, Interface, Media, PostDeleted};
use async_trait::async_trait;

/// Media uploads and their cleanup.
#[async_trait]
pub trait MediaService: Interface + Send + Sync {
    /// Stores the file and records it.
    async fn upload(&self, request: UploadMediaRequest) -> AgoraResult<Media>;

    /// Lists every media record.
    async fn list_media(&self) -> AgoraResult<Vec<Media>>;

    /// Deletes the media attached to a deleted post, object first, then
    /// record. Returns how many were removed.
    async fn remove_for_post(&self, event: &PostDeleted) -> AgoraResult<usize>;
}

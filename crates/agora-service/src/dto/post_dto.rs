//! Post-related DTOs.

use agora_core::{AgoraError, AgoraResult, MediaId, UserId};
use serde::{Deserialize, Serialize};

/// Request to create a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    /// Author, taken from the authenticated caller.
    pub user_id: UserId,
    pub content: String,
    /// Media uploaded beforehand through the media service.
    #[serde(default)]
    pub media_ids: Vec<MediaId>,
}

impl CreatePostRequest {
    /// Rejects requests without content.
    pub fn validate(&self) -> AgoraResult<()> {
        if self.content.trim().is_empty() {
            return Err(AgoraError::validation("Post content is required"));
        }
        Ok(())
    }
}

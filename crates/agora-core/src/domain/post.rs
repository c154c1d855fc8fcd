//! Post entity owned by the posts service.

use crate::{MediaId, PostId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post as stored in the posts system of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub content: String,
    #[serde(default)]
    pub media_ids: Vec<MediaId>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Creates a new post authored by `user_id`.
    #[must_use]
    pub fn new(user_id: UserId, content: String, media_ids: Vec<MediaId>) -> Self {
        Self {
            id: PostId::new(),
            user_id,
            content,
            media_ids,
            created_at: Utc::now(),
        }
    }

    /// Returns true if `user_id` authored this post.
    #[must_use]
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}

/// One page of the post listing, newest first.
///
/// This is the value stored under the `listing:{page}` cache keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListing {
    pub posts: Vec<Post>,
    /// 1-based page number.
    pub current_page: usize,
    pub total_pages: u64,
    pub total_posts: u64,
}

//! Search read-model entries projected from post events.

use crate::{PostCreated, PostId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post as projected into the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<PostCreated> for SearchEntry {
    fn from(event: PostCreated) -> Self {
        Self {
            post_id: event.post_id,
            user_id: event.user_id,
            content: event.content,
            created_at: event.created_at,
        }
    }
}

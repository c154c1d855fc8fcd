//! Media records owned by the media service.

use crate::{MediaId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a binary stored in the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: MediaId,
    /// Object-store identifier used for deletion.
    pub public_id: String,
    pub url: String,
    pub original_name: String,
    pub mime_type: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Result of uploading a binary to the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub public_id: String,
    pub url: String,
}

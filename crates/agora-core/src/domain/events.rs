//! Domain events published on the messaging backbone.
//!
//! Event bodies go on the wire as bare camelCase JSON objects with no envelope.
//! Unknown fields are ignored on decode so producers can add fields without
//! breaking older consumers.

use crate::{MediaId, Post, PostId, UserId};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Routing keys used on the shared topic exchange.
pub mod routing_keys {
    /// A post was committed to the posts system of record.
    pub const POST_CREATED: &str = "post.created";
    /// A post was removed from the posts system of record.
    pub const POST_DELETED: &str = "post.deleted";
}

/// A fact about a state change, routed by its routing key.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Routing key the event is published under.
    const ROUTING_KEY: &'static str;

    /// Identifier of the entity the event is about.
    fn aggregate_id(&self) -> String;
}

/// Body of `post.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCreated {
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Post> for PostCreated {
    fn from(post: &Post) -> Self {
        Self {
            post_id: post.id.clone(),
            user_id: post.user_id.clone(),
            content: post.content.clone(),
            created_at: post.created_at,
        }
    }
}

impl DomainEvent for PostCreated {
    const ROUTING_KEY: &'static str = routing_keys::POST_CREATED;

    fn aggregate_id(&self) -> String {
        self.post_id.to_string()
    }
}

/// Body of `post.deleted`.
///
/// `userId` is carried for auditing but no consumer depends on it, so it may be
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDeleted {
    pub post_id: PostId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub media_ids: Vec<MediaId>,
}

impl From<&Post> for PostDeleted {
    fn from(post: &Post) -> Self {
        Self {
            post_id: post.id.clone(),
            user_id: Some(post.user_id.clone()),
            media_ids: post.media_ids.clone(),
        }
    }
}

impl DomainEvent for PostDeleted {
    const ROUTING_KEY: &'static str = routing_keys::POST_DELETED;

    fn aggregate_id(&self) -> String {
        self.post_id.to_string()
    }
}

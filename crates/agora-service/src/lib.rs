//! # Agora Service
//!
//! The three services riding the backbone:
//!
//! - **Posts** owns the system of record, publishes `post.created` and
//!   `post.deleted`, and keeps the read-through cache coherent.
//! - **Search** projects post events into its own index.
//! - **Media** deletes the binaries of deleted posts.

pub mod cache;
pub mod dto;
pub mod handlers;
pub mod r#impl;
pub mod media_service;
pub mod post_service;
pub mod search_service;

pub use cache::*;
pub use dto::*;
pub use handlers::*;
pub use media_service::*;
pub use post_service::*;
pub use r#impl::*;
pub use search_service::*;

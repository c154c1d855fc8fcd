//! Service implementations.
//!
//! Trait definitions live in the parent module (e.g. `post_service.rs`).

pub mod media_service_impl;
pub mod post_service_impl;
pub mod search_service_impl;

pub use media_service_impl::MediaServiceImpl;
pub use post_service_impl::PostServiceImpl;
pub use search_service_impl::{SearchServiceImpl, SEARCH_LIMIT};

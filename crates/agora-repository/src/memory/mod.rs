//! In-memory implementations.
//!
//! Used by tests and single-process local runs.

mod media_repository;
mod object_store;
mod post_repository;
mod search_repository;

pub use media_repository::InMemoryMediaRepository;
pub use object_store::InMemoryObjectStore;
pub use post_repository::InMemoryPostRepository;
pub use search_repository::InMemorySearchRepository;

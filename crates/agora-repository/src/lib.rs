//! # Agora Repository
//!
//! Storage interfaces the services depend on, and in-memory implementations.
//!
//! ```text
//! PostService     → Arc<dyn PostRepository>    (system of record)
//! SearchService   → Arc<dyn SearchRepository>  (secondary read index)
//! MediaService    → Arc<dyn MediaRepository>   (media records)
//!                 → Arc<dyn ObjectStore>       (binary objects)
//! ```
//!
//! Storage schema and query syntax belong to the backing stores; the traits
//! only fix the operations the services need.

pub mod memory;
pub mod traits;

pub use memory::*;
pub use traits::*;

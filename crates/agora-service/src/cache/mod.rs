//! Caching infrastructure for the service layer.
//!
//! The read path goes through [`CacheCoordinator::read_through`]; the owning
//! service's write path calls [`CacheCoordinator::invalidate`]. Backends are
//! Redis in production and an in-process map for tests and local runs.

mod cache_interface;
pub mod cache_keys;
mod coordinator;
mod memory_cache;
mod redis_cache;

#[cfg(test)]
pub use cache_interface::MockCacheInterface;
pub use cache_interface::CacheInterface;
pub use coordinator::CacheCoordinator;
pub use memory_cache::InMemoryCache;
pub use redis_cache::{create_pool, RedisCacheService, DEFAULT_SCAN_BATCH};

//! Cache interface trait for abstracted caching operations.

use agora_core::{AgoraResult, Interface};
use async_trait::async_trait;
use std::time::Duration;

/// Key/value cache holding JSON strings with a TTL per key.
///
/// Values are stored type-erased so the trait stays dyn-compatible; typed
/// access goes through [`CacheCoordinator`](super::CacheCoordinator).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheInterface: Interface + Send + Sync {
    /// Get a raw JSON value from the cache.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    async fn get_raw(&self, key: &str) -> AgoraResult<Option<String>>;

    /// Set a raw JSON value in the cache with a TTL.
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> AgoraResult<()>;

    /// Delete a value from the cache.
    ///
    /// Returns `true` if the key existed and was deleted.
    async fn delete(&self, key: &str) -> AgoraResult<bool>;

    /// Check if a key exists in the cache.
    async fn exists(&self, key: &str) -> AgoraResult<bool>;

    /// Delete every key matching a glob pattern (`*` and `?`).
    ///
    /// Returns the number of keys deleted.
    async fn delete_pattern(&self, pattern: &str) -> AgoraResult<u64>;

    /// Check if caching is enabled.
    fn is_enabled(&self) -> bool;
}

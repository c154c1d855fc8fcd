//! Read-through caching and write-path invalidation.

use super::{cache_keys, CacheInterface};
use agora_core::{AgoraError, AgoraResult};
use agora_resilience::{with_timeout, TimeoutConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Coordinates the read-through cache for one owning service.
///
/// The cache is never authoritative. Every cache failure degrades to the
/// source of truth: reads fall back to the loader and invalidation errors are
/// logged without failing the write that triggered them. Each cache round trip
/// is bounded so a hung cache cannot stall the request path. The listing
/// pattern delete walks the keyspace in SCAN rounds and gets its own, longer
/// bound.
#[derive(Clone)]
pub struct CacheCoordinator {
    cache: Arc<dyn CacheInterface>,
    op_timeout: Duration,
    invalidation_timeout: Duration,
}

impl CacheCoordinator {
    /// Creates a coordinator over `cache`.
    pub fn new(cache: Arc<dyn CacheInterface>) -> Self {
        let timeouts = TimeoutConfig::default();
        Self {
            cache,
            op_timeout: timeouts.cache_timeout,
            invalidation_timeout: timeouts.invalidation_timeout,
        }
    }

    /// Sets the bound for a single cache round trip.
    #[must_use]
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Sets the bound for the listing pattern delete.
    #[must_use]
    pub fn with_invalidation_timeout(mut self, invalidation_timeout: Duration) -> Self {
        self.invalidation_timeout = invalidation_timeout;
        self
    }

    /// The underlying cache.
    pub fn cache(&self) -> &Arc<dyn CacheInterface> {
        &self.cache
    }

    /// Returns the cached value under `key`, or loads, stores, and returns it.
    ///
    /// Loader errors propagate and nothing is stored for them.
    pub async fn read_through<T, F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> AgoraResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AgoraResult<T>> + Send,
    {
        match self.bounded(self.cache.get_raw(key)).await {
            Ok(Some(json)) => match serde_json::from_str::<T>(&json) {
                Ok(value) => {
                    debug!(key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key, error = %e, "Ignoring undecodable cache entry"),
            },
            Ok(None) => debug!(key, "Cache miss"),
            Err(e) => warn!(key, error = %e, "Cache read failed, loading from source"),
        }

        let value = loader().await?;

        match serde_json::to_string(&value) {
            Ok(json) => {
                if let Err(e) = self.bounded(self.cache.set_raw(key, &json, ttl)).await {
                    warn!(key, error = %e, "Cache write failed");
                }
            }
            Err(e) => warn!(key, error = %e, "Value could not be cached"),
        }

        Ok(value)
    }

    /// Drops the cached entity and every cached listing page.
    ///
    /// Returns the number of keys removed. Failures are logged; stale entries
    /// left behind expire with their TTL.
    pub async fn invalidate(&self, entity_id: &str) -> u64 {
        let entity_key = cache_keys::entity(entity_id);
        let mut removed = 0;

        match self.bounded(self.cache.delete(&entity_key)).await {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => warn!(key = %entity_key, error = %e, "Failed to invalidate entity"),
        }

        let listings = with_timeout::<_, _, _, AgoraError>(self.invalidation_timeout, || {
            self.cache.delete_pattern(cache_keys::LISTING_PATTERN)
        });
        match listings.await {
            Ok(count) => removed += count,
            Err(e) => warn!(
                pattern = cache_keys::LISTING_PATTERN,
                error = %e,
                "Failed to invalidate listings"
            ),
        }

        debug!(entity_id, removed, "Cache invalidated");
        removed
    }

    async fn bounded<T, Fut>(&self, op: Fut) -> AgoraResult<T>
    where
        Fut: Future<Output = AgoraResult<T>>,
    {
        with_timeout::<_, _, _, AgoraError>(self.op_timeout, || op).await
    }
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("enabled", &self.cache.is_enabled())
            .field("op_timeout", &self.op_timeout)
            .field("invalidation_timeout", &self.invalidation_timeout)
            .finish()
    }
}

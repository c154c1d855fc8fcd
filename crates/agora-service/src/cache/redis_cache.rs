//! Redis-based cache implementation.

use super::CacheInterface;
use agora_config::RedisConfig;
use agora_core::{AgoraError, AgoraResult};
use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Pool, Runtime};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Keys requested per SCAN round trip unless configured otherwise.
pub const DEFAULT_SCAN_BATCH: usize = 500;

/// Redis-based cache service.
///
/// A disabled service (no pool) behaves as an always-empty cache.
pub struct RedisCacheService {
    pool: Option<Arc<Pool>>,
    scan_batch_size: usize,
}

impl RedisCacheService {
    /// Create a new Redis cache service.
    #[must_use]
    pub fn new(pool: Arc<Pool>) -> Self {
        Self::with_scan_batch(pool, DEFAULT_SCAN_BATCH)
    }

    /// Create a service that requests `scan_batch_size` keys per SCAN call.
    #[must_use]
    pub fn with_scan_batch(pool: Arc<Pool>, scan_batch_size: usize) -> Self {
        Self {
            pool: Some(pool),
            scan_batch_size: scan_batch_size.max(1),
        }
    }

    /// Create a no-op cache service (for when Redis is disabled).
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            pool: None,
            scan_batch_size: DEFAULT_SCAN_BATCH,
        }
    }

    async fn get_conn(&self) -> AgoraResult<deadpool_redis::Connection> {
        match &self.pool {
            Some(pool) => pool
                .get()
                .await
                .map_err(|e| AgoraError::Cache(format!("Failed to get Redis connection: {}", e))),
            None => Err(AgoraError::Cache("Cache is disabled".to_string())),
        }
    }
}

#[async_trait]
impl CacheInterface for RedisCacheService {
    fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    async fn get_raw(&self, key: &str) -> AgoraResult<Option<String>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| AgoraError::Cache(format!("Failed to get key '{}': {}", key, e)))?;

        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> AgoraResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut conn = self.get_conn().await?;
        let ttl_secs = ttl.as_secs().max(1);

        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| AgoraError::Cache(format!("Failed to set key '{}': {}", key, e)))?;

        debug!(key, ttl_secs, "Cached key");
        Ok(())
    }

    async fn delete(&self, key: &str) -> AgoraResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let mut conn = self.get_conn().await?;
        let deleted: i64 = conn
            .del(key)
            .await
            .map_err(|e| AgoraError::Cache(format!("Failed to delete key '{}': {}", key, e)))?;

        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> AgoraResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let mut conn = self.get_conn().await?;
        conn.exists(key)
            .await
            .map_err(|e| AgoraError::Cache(format!("Failed to check key '{}': {}", key, e)))
    }

    /// Walks the keyspace with SCAN and deletes matches batch by batch.
    ///
    /// Cost grows with the total number of keys in the database, not with the
    /// number of matches.
    async fn delete_pattern(&self, pattern: &str) -> AgoraResult<u64> {
        if !self.is_enabled() {
            return Ok(0);
        }

        let mut conn = self.get_conn().await?;
        let mut cursor: u64 = 0;
        let mut rounds = 0u32;
        let mut deleted = 0u64;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.scan_batch_size)
                .query_async(&mut conn)
                .await
                .map_err(|e| AgoraError::Cache(format!("Failed to scan keys: {}", e)))?;
            rounds += 1;

            if !keys.is_empty() {
                let removed: i64 = conn
                    .del(&keys)
                    .await
                    .map_err(|e| AgoraError::Cache(format!("Failed to delete keys: {}", e)))?;
                deleted += u64::try_from(removed).unwrap_or(0);
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        if rounds > 1 {
            warn!(
                pattern,
                rounds,
                batch = self.scan_batch_size,
                "Pattern delete needed several SCAN rounds; cost grows with keyspace size"
            );
        }

        debug!(pattern, deleted, "Deleted keys matching pattern");
        Ok(deleted)
    }
}

/// Creates a Redis pool and checks it with a PING.
pub async fn create_pool(config: &RedisConfig) -> AgoraResult<Pool> {
    info!("Creating Redis connection pool for the cache...");

    let pool = Config::from_url(&config.url)
        .builder()
        .map_err(|e| AgoraError::Configuration(format!("Invalid Redis config: {}", e)))?
        .max_size(config.pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| AgoraError::Configuration(format!("Failed to create pool: {}", e)))?;

    let mut conn = pool
        .get()
        .await
        .map_err(|e| AgoraError::Cache(format!("Failed to get Redis connection: {}", e)))?;
    redis::cmd("PING")
        .query_async::<String>(&mut conn)
        .await
        .map_err(|e| AgoraError::Cache(format!("Redis PING failed: {}", e)))?;

    info!("Redis connection pool created successfully");
    Ok(pool)
}

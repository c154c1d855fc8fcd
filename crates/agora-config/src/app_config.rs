//! Application configuration structures.

use crate::ServiceRole;
use agora_core::telemetry::{LogFormat, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Message broker configuration.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Redis configuration.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Read-through cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
    /// Which service this process runs.
    pub role: ServiceRole,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "agora".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            role: ServiceRole::default(),
        }
    }
}

/// What the dispatcher does with a message whose handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HandlerFailurePolicy {
    /// Log the failure and acknowledge; the message is dropped.
    #[default]
    Ack,
    /// Requeue a first delivery once; acknowledge and drop a redelivery.
    RequeueOnce,
}

/// Message broker configuration.
///
/// One instance describes the whole topology a service needs: the broker, the
/// shared exchange, and the reconnect policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// AMQP URL.
    pub url: String,
    /// Name of the shared topic exchange.
    pub exchange: String,
    /// Whether the exchange survives broker restarts.
    pub exchange_durable: bool,
    /// Maximum connection attempts before giving up.
    pub max_attempts: u32,
    /// Fixed delay between connection attempts in milliseconds.
    pub retry_delay_ms: u64,
    /// Upper bound for a single connection attempt in milliseconds.
    pub attempt_timeout_ms: u64,
    /// Disposition of messages whose handler failed.
    pub on_handler_error: HandlerFailurePolicy,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "amqp://localhost:5672".to_string(),
            exchange: "facebook_events".to_string(),
            exchange_durable: false,
            max_attempts: 10,
            retry_delay_ms: 5000,
            attempt_timeout_ms: 10_000,
            on_handler_error: HandlerFailurePolicy::default(),
        }
    }
}

impl BrokerConfig {
    /// Returns the delay between connection attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Returns the per-attempt connection timeout.
    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// Redis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis URL.
    pub url: String,
    /// Connection pool size.
    pub pool_size: usize,
    /// Enable Redis (can be disabled for local development).
    pub enabled: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            enabled: true,
        }
    }
}

/// Read-through cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for `entity:{id}` keys in seconds.
    pub entity_ttl_secs: u64,
    /// TTL for `listing:{page}` keys in seconds.
    pub listing_ttl_secs: u64,
    /// Posts per listing page.
    pub listing_page_size: usize,
    /// Keys requested per SCAN round trip during bulk invalidation.
    pub scan_batch_size: usize,
    /// Bound on one cache round trip in milliseconds.
    pub op_timeout_ms: u64,
    /// Bound on the whole listing invalidation in milliseconds.
    pub invalidation_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity_ttl_secs: 3600,
            listing_ttl_secs: 300,
            listing_page_size: 10,
            scan_batch_size: 500,
            op_timeout_ms: 2000,
            invalidation_timeout_ms: 30_000,
        }
    }
}

impl CacheConfig {
    /// Returns the entity TTL as a Duration.
    #[must_use]
    pub const fn entity_ttl(&self) -> Duration {
        Duration::from_secs(self.entity_ttl_secs)
    }

    /// Returns the listing TTL as a Duration.
    #[must_use]
    pub const fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl_secs)
    }

    /// Returns the per round trip cache bound as a Duration.
    #[must_use]
    pub const fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    /// Returns the listing invalidation bound as a Duration.
    #[must_use]
    pub const fn invalidation_timeout(&self) -> Duration {
        Duration::from_millis(self.invalidation_timeout_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter (trace, debug, info, warn, error, or a full directive).
    pub log_level: String,
    /// Log format (json, pretty).
    pub log_format: LogFormat,
    /// Record messaging metrics.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info,agora=debug".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}

impl ObservabilityConfig {
    /// Returns the logging settings for subscriber initialization.
    #[must_use]
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            filter: self.log_level.clone(),
            format: self.log_format,
        }
    }
}

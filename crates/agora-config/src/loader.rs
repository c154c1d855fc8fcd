//! Configuration loader with layered sources.

use crate::AppConfig;
use agora_core::AgoraError;
use config::{Config, ConfigError, Environment, File};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Conventional variable overriding `broker.url`.
pub const BROKER_URL_ENV: &str = "RABBITMQ_URL";

/// Conventional variable overriding `redis.url`.
pub const REDIS_URL_ENV: &str = "REDIS_URL";

/// Configuration loader with runtime refresh support.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
    config_dir: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Uncommitted local overrides
    /// 4. Environment variables with `AGORA__` prefix (`AGORA__BROKER__URL`)
    /// 5. `RABBITMQ_URL` and `REDIS_URL`
    pub fn new(config_dir: impl Into<String>) -> Result<Self, AgoraError> {
        let config_dir = config_dir.into();
        let config = Self::load_config(&config_dir)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, AgoraError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Reloads the configuration from disk.
    pub async fn reload(&self) -> Result<(), AgoraError> {
        let new_config = Self::load_config(&self.config_dir)?;
        let mut config = self.config.write().await;
        *config = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Loads configuration from the specified directory.
    fn load_config(config_dir: &str) -> Result<AppConfig, AgoraError> {
        // Load .env file if present
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment = std::env::var("AGORA_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        info!(environment = %environment, "Loading configuration");

        let mut builder = Config::builder();

        for name in ["default", environment.as_str(), "local"] {
            let path = format!("{}/{}.toml", config_dir, name);
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("AGORA")
                .separator("__")
                .try_parsing(true),
        );

        builder = builder
            .set_override_option("broker.url", std::env::var(BROKER_URL_ENV).ok())
            .map_err(config_error_to_agora_error)?
            .set_override_option("redis.url", std::env::var(REDIS_URL_ENV).ok())
            .map_err(config_error_to_agora_error)?;

        let config = builder.build().map_err(config_error_to_agora_error)?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(config_error_to_agora_error)?;

        validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Gets a specific configuration value by key path.
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let config = self.config.read().await;
        let json = serde_json::to_value(&*config).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        serde_json::from_value(current.clone()).ok()
    }
}

/// Validates the values the backbone cannot run without.
pub fn validate_config(config: &AppConfig) -> Result<(), AgoraError> {
    if config.broker.url.trim().is_empty() {
        return Err(AgoraError::Configuration("Broker URL is required".to_string()));
    }

    if config.broker.exchange.trim().is_empty() {
        return Err(AgoraError::Configuration("Broker exchange name is required".to_string()));
    }

    if config.broker.max_attempts == 0 {
        return Err(AgoraError::Configuration(
            "broker.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.cache.listing_page_size == 0 {
        return Err(AgoraError::Configuration(
            "cache.listing_page_size must be at least 1".to_string(),
        ));
    }

    if config.redis.enabled && config.redis.url.trim().is_empty() {
        return Err(AgoraError::Configuration(
            "Redis URL is required when redis is enabled".to_string(),
        ));
    }

    Ok(())
}

fn config_error_to_agora_error(err: ConfigError) -> AgoraError {
    AgoraError::Configuration(err.to_string())
}

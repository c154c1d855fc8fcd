//! Server startup utilities.

use agora_config::AppConfig;
use agora_messaging::redact_url;
use tracing::info;

/// Logs what this process is about to run.
pub fn print_startup_info(config: &AppConfig) {
    let separator = "=".repeat(60);
    info!("{}", separator);
    info!("Service:     {} v{}", config.app.name, config.app.version);
    info!("Role:        {}", config.app.role);
    info!("Environment: {}", config.app.environment);
    info!("Broker:      {}", redact_url(&config.broker.url));
    info!("Exchange:    {}", config.broker.exchange);
    info!(
        "Redis:       {}",
        if config.redis.enabled {
            redact_url(&config.redis.url)
        } else {
            "disabled".to_string()
        }
    );
    info!("{}", separator);
}

//! # Agora Server
//!
//! Runs one service role (`posts`, `search`, `media`) or all of them. The
//! role comes from `app.role`, e.g. `AGORA__APP__ROLE=search`.

use agora_config::ConfigLoader;
use agora_core::telemetry::{init_logging, LoggingConfig};
use agora_core::{AgoraError, AgoraResult};
use agora_messaging::register_metrics;
use agora_server::startup::print_startup_info;
use agora_server::AppBuilder;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> AgoraResult<()> {
    let config = match ConfigLoader::from_default_location() {
        Ok(loader) => loader.get().await,
        Err(e) => {
            let _ = init_logging(&LoggingConfig::default());
            return Err(e);
        }
    };

    init_logging(&config.observability.logging())?;
    info!("Starting Agora server...");
    print_startup_info(&config);

    if config.observability.metrics_enabled {
        register_metrics();
    }

    let app = AppBuilder::new(config).start().await?;

    let lost = tokio::select! {
        () = shutdown_signal() => false,
        () = app.subscription_lost() => true,
    };

    app.shutdown().await?;
    if lost {
        return Err(AgoraError::Messaging(
            "subscription lost after reconnect attempts were exhausted".to_string(),
        ));
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}

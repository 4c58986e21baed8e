//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve configuration (file or validated defaults)
//! - Install the metrics exporter
//! - Build the gateway, start background tasks, bind the listener
//! - Serve until a termination signal, then drain

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;
use crate::config::loader::{load_config, ConfigError};
use crate::config::validation::validate_config;
use crate::config::GatewayConfig;
use crate::gateway::Gateway;
use crate::http::GatewayServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Configuration from `path`, or validated defaults without one.
pub fn resolve_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let config = GatewayConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

/// Run the gateway until SIGINT/SIGTERM. Logging must already be set up.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let bind_address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    let gateway = Arc::new(Gateway::new(config));
    tracing::info!(
        services = gateway.registry().len(),
        strategy = %gateway.balancer().strategy(),
        "Gateway initialized"
    );

    let shutdown = Shutdown::new();
    let tasks = gateway.spawn_background_tasks(&shutdown);
    signals::spawn_signal_handler(shutdown.clone());

    let server = GatewayServer::new(gateway);
    let result = server.run(listener, shutdown.subscribe()).await;

    // The server may also stop on its own; make sure the loops follow.
    shutdown.trigger();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Background task ended abnormally");
        }
    }

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}

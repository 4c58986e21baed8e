//! Active health checking.
//!
//! # Responsibilities
//! - Probe every registered service once at startup
//! - Re-probe all services on a fixed interval, concurrently
//! - Stop on the shutdown broadcast

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;
use crate::config::HealthCheckConfig;
use crate::registry::ServiceRegistry;

pub struct HealthMonitor {
    registry: Arc<ServiceRegistry>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ServiceRegistry>, config: HealthCheckConfig) -> Self {
        Self { registry, config }
    }

    /// Start the monitor on the runtime.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            services = self.registry.len(),
            "Health monitor starting"
        );

        // The first tick fires immediately, which gives the startup probe.
        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.registry.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

//! Periodic housekeeping.
//!
//! Every `cleanup_interval_secs`: decay stale connection counters in the
//! load balancer and zero idle breaker streaks.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;
use crate::config::LoadBalancerConfig;
use crate::load_balancer::LoadBalancer;
use crate::resilience::CircuitBreaker;

pub struct Maintenance {
    balancer: Arc<LoadBalancer>,
    breaker: Arc<CircuitBreaker>,
    interval: Duration,
}

impl Maintenance {
    pub fn new(balancer: Arc<LoadBalancer>, breaker: Arc<CircuitBreaker>, config: &LoadBalancerConfig) -> Self {
        Self {
            balancer,
            breaker,
            interval: Duration::from_secs(config.cleanup_interval_secs.max(1)),
        }
    }

    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// One sweep. Returns the number of instances whose counter was decayed.
    pub fn sweep(&self) -> usize {
        let adjusted = self.balancer.cleanup_stale_connections();
        self.breaker.cleanup();
        if adjusted > 0 {
            tracing::debug!(instances = adjusted, "Decayed stale connection counters");
        }
        adjusted
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Maintenance task received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

//! Administrative views and mutations over the core.
//!
//! Thin compositions of registry, breaker and load balancer operations;
//! no state of their own.

use std::collections::BTreeMap;
use serde::Serialize;
use crate::clock;
use crate::config::{ServiceConfig, StrategyKind};
use crate::gateway::Gateway;
use crate::health::{HealthState, ServiceStatus};
use crate::load_balancer::{InstanceSnapshot, ServiceStats};
use crate::proxy::WarmupResult;
use crate::resilience::CircuitBreakerSnapshot;

/// Aggregate health across services.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    /// Percentage of healthy services, rounded; 0 with no services.
    pub system_health: u8,
    pub total_services: usize,
    pub healthy_services: usize,
    pub unhealthy_services: usize,
    pub services: Vec<ServiceStatus>,
    pub circuit_breakers: Vec<CircuitBreakerSnapshot>,
    pub load_balancer: Vec<ServiceStats>,
    pub load_balancer_healthy: bool,
    pub timestamp: u64,
}

/// A service config merged with its last status.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    #[serde(flatten)]
    pub config: ServiceConfig,
    pub status: HealthState,
    pub last_checked_at: Option<u64>,
    pub last_response_time_ms: Option<u64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceDetail {
    #[serde(flatten)]
    pub config: ServiceConfig,
    pub status: Option<ServiceStatus>,
    pub circuit_breaker: CircuitBreakerSnapshot,
    pub instances: Vec<InstanceSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadBalancerView {
    pub strategy: StrategyKind,
    pub stats: Vec<ServiceStats>,
    pub instances: BTreeMap<String, Vec<InstanceSnapshot>>,
    pub is_healthy: bool,
}

pub(crate) fn health_percentage(healthy: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((healthy as f64 / total as f64) * 100.0).round() as u8
}

impl Gateway {
    pub fn system_health(&self) -> SystemHealth {
        let services = self.registry.get_all_statuses();
        let total = services.len();
        let healthy = services.iter().filter(|s| s.state == HealthState::Healthy).count();

        SystemHealth {
            system_health: health_percentage(healthy, total),
            total_services: total,
            healthy_services: healthy,
            unhealthy_services: total - healthy,
            services,
            circuit_breakers: self.breaker.all_statuses(),
            load_balancer: self.balancer.stats(),
            load_balancer_healthy: self.balancer.is_healthy(),
            timestamp: clock::now_millis(),
        }
    }

    pub fn services_with_status(&self) -> Vec<ServiceView> {
        self.registry
            .get_all_services()
            .into_iter()
            .map(|config| {
                let status = self.registry.get_status(&config.name);
                ServiceView {
                    status: status.as_ref().map_or(HealthState::Unknown, |s| s.state),
                    last_checked_at: status.as_ref().map(|s| s.last_checked_at),
                    last_response_time_ms: status.as_ref().map(|s| s.last_response_time_ms),
                    last_error: status.and_then(|s| s.last_error),
                    config,
                }
            })
            .collect()
    }

    /// `None` when the service is not registered.
    pub fn service_detail(&self, name: &str) -> Option<ServiceDetail> {
        let config = self.registry.get_service(name)?;
        Some(ServiceDetail {
            status: self.registry.get_status(name),
            circuit_breaker: self.breaker.status(name),
            instances: self.balancer.service_instances(name),
            config,
        })
    }

    pub fn circuit_breakers(&self) -> Vec<CircuitBreakerSnapshot> {
        self.breaker.all_statuses()
    }

    pub fn circuit_breaker(&self, name: &str) -> CircuitBreakerSnapshot {
        self.breaker.status(name)
    }

    pub fn reset_circuit_breaker(&self, name: &str) -> CircuitBreakerSnapshot {
        self.breaker.reset(name);
        self.breaker.status(name)
    }

    pub fn load_balancer_view(&self) -> LoadBalancerView {
        LoadBalancerView {
            strategy: self.balancer.strategy(),
            stats: self.balancer.stats(),
            instances: self.balancer.all_instances(),
            is_healthy: self.balancer.is_healthy(),
        }
    }

    pub fn add_instance(&self, service: &str, url: &str, weight: u32) {
        self.balancer.add_instance(service, url, weight);
    }

    pub fn remove_instance(&self, service: &str, url: &str) {
        self.balancer.remove_instance(service, url);
    }

    /// Probe one service now. `None` when it is not registered.
    pub async fn trigger_health_check(&self, name: &str) -> Option<ServiceStatus> {
        self.registry.check_service(name).await
    }

    pub async fn warmup(&self) -> Vec<WarmupResult> {
        self.forwarder.warmup_services().await
    }
}

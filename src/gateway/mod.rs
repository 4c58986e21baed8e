//! Gateway core: the four collaborators wired together.
//!
//! # Data Flow
//! ```text
//! GatewayConfig
//!     → ServiceRegistry (services + health)
//!     → CircuitBreaker (per-service thresholds from config)
//!     → LoadBalancer (pools seeded from the registry)
//!     → Forwarder (uses all three)
//!
//! Background (spawn_background_tasks):
//!     → HealthMonitor (periodic probes)
//!     → Maintenance (stale connection sweep, breaker cleanup)
//! ```

pub mod admin;
pub mod maintenance;

use std::sync::Arc;
use tokio::task::JoinHandle;
use crate::config::{GatewayConfig, ServiceConfig};
use crate::health::{HealthMonitor, ServiceStatus};
use crate::lifecycle::Shutdown;
use crate::load_balancer::LoadBalancer;
use crate::proxy::{Forwarder, GatewayError, ProxyRequest, ProxyResponse};
use crate::registry::ServiceRegistry;
use crate::resilience::{BreakerSettings, CircuitBreaker};

pub use admin::{LoadBalancerView, ServiceDetail, ServiceView, SystemHealth};
pub use maintenance::Maintenance;

/// The resilient gateway core.
pub struct Gateway {
    config: GatewayConfig,
    registry: Arc<ServiceRegistry>,
    breaker: Arc<CircuitBreaker>,
    balancer: Arc<LoadBalancer>,
    forwarder: Forwarder,
}

impl Gateway {
    /// Build every subsystem from a validated configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let registry = Arc::new(ServiceRegistry::with_services(
            config.services.clone(),
            &config.health_check,
        ));

        let breaker = Arc::new(CircuitBreaker::new(&config.circuit_breaker));
        for service in &config.services {
            breaker.configure(
                &service.name,
                BreakerSettings::resolve(&service.circuit_breaker, &config.circuit_breaker),
            );
        }

        let balancer = Arc::new(LoadBalancer::new(registry.clone(), &config.load_balancer));
        let forwarder = Forwarder::new(
            registry.clone(),
            breaker.clone(),
            balancer.clone(),
            config.proxy.clone(),
        );

        Self {
            config,
            registry,
            breaker,
            balancer,
            forwarder,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    pub async fn proxy_request(&self, request: ProxyRequest) -> Result<ProxyResponse, GatewayError> {
        self.forwarder.proxy_request(request).await
    }

    /// Pair of a successful `proxy_request`: call once the response has been
    /// delivered. Failed requests release their connection themselves.
    pub fn release_connection(&self, service: &str, instance_url: &str) {
        self.balancer.release_connection(service, instance_url);
    }

    /// Register (or replace) a service and probe it once.
    ///
    /// Replacing a service resets its instance pool to the new URL.
    pub async fn register_service(&self, service: ServiceConfig) -> ServiceStatus {
        self.breaker.configure(
            &service.name,
            BreakerSettings::resolve(&service.circuit_breaker, &self.config.circuit_breaker),
        );
        // New config first: a pool reseeded after the reset sees the new URL.
        self.registry.upsert_service(service.clone());
        self.balancer.forget_service(&service.name);
        self.registry.probe_service(service).await
    }

    pub fn unregister_service(&self, name: &str) -> bool {
        let removed = self.registry.unregister_service(name);
        self.balancer.forget_service(name);
        removed
    }

    /// Start the health monitor and the maintenance loop.
    pub fn spawn_background_tasks(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let monitor = HealthMonitor::new(self.registry.clone(), self.config.health_check.clone());
        let maintenance = Maintenance::new(
            self.balancer.clone(),
            self.breaker.clone(),
            &self.config.load_balancer,
        );
        vec![
            monitor.spawn(shutdown.subscribe()),
            maintenance.spawn(shutdown.subscribe()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceBreakerConfig;
    use crate::health::HealthState;

    fn config_with(services: Vec<ServiceConfig>) -> GatewayConfig {
        GatewayConfig {
            services,
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_breaker_settings_follow_service_overrides() {
        let mut service = ServiceConfig::new("payment-service", "http://127.0.0.1:3005");
        service.circuit_breaker = ServiceBreakerConfig {
            failure_threshold: Some(2),
            ..ServiceBreakerConfig::default()
        };
        let gateway = Gateway::new(config_with(vec![service]));

        assert_eq!(gateway.breaker().settings_for("payment-service").failure_threshold, 2);
        assert_eq!(gateway.breaker().settings_for("other").failure_threshold, 5);
        assert_eq!(gateway.balancer().service_instances("payment-service").len(), 1);
    }

    fn mark_healthy(gateway: &Gateway, name: &str) {
        let mut status = gateway.registry().get_status(name).unwrap();
        status.state = HealthState::Healthy;
        gateway.registry().update_status(status);
    }

    #[test]
    fn test_pool_reseeds_from_new_config_after_reset() {
        let gateway = Gateway::new(config_with(vec![ServiceConfig::new("cart", "http://127.0.0.1:9")]));
        mark_healthy(&gateway, "cart");
        let old = gateway.balancer().get_service_url("cart").unwrap();
        gateway.release_connection("cart", &old);

        // A selection landing between the config update and the pool reset.
        gateway.registry().upsert_service(ServiceConfig::new("cart", "http://127.0.0.1:10"));
        if let Some(url) = gateway.balancer().get_service_url("cart") {
            gateway.release_connection("cart", &url);
        }
        gateway.balancer().forget_service("cart");

        mark_healthy(&gateway, "cart");
        assert_eq!(gateway.balancer().get_service_url("cart").as_deref(), Some("http://127.0.0.1:10"));
        let instances = gateway.balancer().service_instances("cart");
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].url, "http://127.0.0.1:10");
    }

    #[tokio::test]
    async fn test_reregistration_resets_pool() {
        let gateway = Gateway::new(config_with(vec![ServiceConfig::new("cart", "http://127.0.0.1:9")]));
        gateway.balancer().add_instance("cart", "http://127.0.0.1:10", 1);
        assert_eq!(gateway.balancer().service_instances("cart").len(), 2);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let status = gateway.register_service(ServiceConfig::new("cart", url.clone())).await;
        assert_eq!(status.state, HealthState::Unhealthy);
        assert!(gateway.balancer().get_service_url("cart").is_none());
        let instances = gateway.balancer().service_instances("cart");
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].url, url);

        assert!(gateway.unregister_service("cart"));
        assert!(gateway.balancer().service_instances("cart").is_empty());
        assert!(!gateway.unregister_service("cart"));
    }
}

//! Registry of backend services and their health.

use std::time::Duration;
use dashmap::DashMap;
use futures_util::future::join_all;
use crate::config::{HealthCheckConfig, ServiceConfig};
use crate::health::{HealthProber, HealthState, ServiceStatus};
use crate::observability::metrics;

/// Static service configuration plus live health state.
pub struct ServiceRegistry {
    services: DashMap<String, ServiceConfig>,
    statuses: DashMap<String, ServiceStatus>,
    prober: HealthProber,
    default_timeout: Duration,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new(config: &HealthCheckConfig) -> Self {
        Self {
            services: DashMap::new(),
            statuses: DashMap::new(),
            prober: HealthProber::new(),
            default_timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Create a registry seeded with startup services, all `unknown`.
    /// The first health cycle probes them.
    pub fn with_services(services: Vec<ServiceConfig>, config: &HealthCheckConfig) -> Self {
        let registry = Self::new(config);
        for service in services {
            registry.statuses.insert(service.name.clone(), ServiceStatus::unknown(&service));
            registry.services.insert(service.name.clone(), service);
        }
        tracing::info!(count = registry.services.len(), "Registered services");
        registry
    }

    pub fn get_service(&self, name: &str) -> Option<ServiceConfig> {
        self.services.get(name).map(|r| r.value().clone())
    }

    pub fn get_status(&self, name: &str) -> Option<ServiceStatus> {
        self.statuses.get(name).map(|r| r.value().clone())
    }

    pub fn service_url(&self, name: &str) -> Option<String> {
        self.services.get(name).map(|r| r.base_url.clone())
    }

    /// All services, sorted by name.
    pub fn get_all_services(&self) -> Vec<ServiceConfig> {
        let mut services: Vec<_> = self.services.iter().map(|r| r.value().clone()).collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    /// All statuses, sorted by name.
    pub fn get_all_statuses(&self) -> Vec<ServiceStatus> {
        let mut statuses: Vec<_> = self.statuses.iter().map(|r| r.value().clone()).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub fn is_service_healthy(&self, name: &str) -> bool {
        self.statuses.get(name).is_some_and(|s| s.is_healthy())
    }

    pub fn healthy_services(&self) -> Vec<ServiceStatus> {
        self.statuses_in(HealthState::Healthy)
    }

    pub fn unhealthy_services(&self) -> Vec<ServiceStatus> {
        self.statuses_in(HealthState::Unhealthy)
    }

    fn statuses_in(&self, state: HealthState) -> Vec<ServiceStatus> {
        self.get_all_statuses()
            .into_iter()
            .filter(|s| s.state == state)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Upsert a service, reset its status to `unknown` and probe it once.
    pub async fn register_service(&self, config: ServiceConfig) -> ServiceStatus {
        self.upsert_service(config.clone());
        self.probe_service(config).await
    }

    /// Upsert a service and reset its status to `unknown`, without probing.
    pub fn upsert_service(&self, config: ServiceConfig) {
        let name = config.name.clone();
        tracing::info!(service = %name, url = %config.base_url, "Service registered");
        self.statuses.insert(name.clone(), ServiceStatus::unknown(&config));
        self.services.insert(name, config);
    }

    /// Remove a service and its status. Returns false if it was not registered.
    pub fn unregister_service(&self, name: &str) -> bool {
        let removed = self.services.remove(name).is_some();
        self.statuses.remove(name);
        if removed {
            tracing::info!(service = %name, "Service unregistered");
        }
        removed
    }

    /// Overwrite the status of a registered service.
    ///
    /// Ignored when the service is no longer registered, so a probe that
    /// finishes after `unregister_service` cannot resurrect the entry.
    pub fn update_status(&self, status: ServiceStatus) {
        if !self.services.contains_key(&status.name) {
            tracing::debug!(service = %status.name, "Dropping status for unregistered service");
            return;
        }
        metrics::record_service_health(&status.name, status.is_healthy());
        self.statuses.insert(status.name.clone(), status);
    }

    /// Probe one service now. `None` if it is not registered.
    pub async fn check_service(&self, name: &str) -> Option<ServiceStatus> {
        let service = self.get_service(name)?;
        Some(self.probe_service(service).await)
    }

    /// Probe every registered service concurrently and wait for all of them.
    pub async fn check_all(&self) {
        let probes = self
            .get_all_services()
            .into_iter()
            .map(|service| self.probe_service(service));
        join_all(probes).await;
    }

    /// Probe `service` and record the result.
    pub async fn probe_service(&self, service: ServiceConfig) -> ServiceStatus {
        let timeout = service
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);
        let status = self.prober.probe(&service, timeout).await;
        self.update_status(status.clone());
        status
    }
}

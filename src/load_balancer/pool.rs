//! Per-service instance pools.
//!
//! # Responsibilities
//! - Keep an ordered instance list per service, seeded from the registry
//! - Mirror registry health onto instances before each selection
//! - Apply the configured selection strategy
//! - Approximate connection accounting (select / release / stale sweep)

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use crate::config::{LoadBalancerConfig, ServiceConfig, StrategyKind};
use crate::load_balancer::{build_strategy, InstanceSnapshot, SelectionStrategy, ServiceInstance};
use crate::observability::metrics;
use crate::registry::ServiceRegistry;

#[derive(Debug, Default)]
struct ServicePool {
    instances: Vec<ServiceInstance>,
    /// Monotonic selection counter for the rotating strategies.
    cursor: u64,
}

impl ServicePool {
    /// One instance at the registry URL plus any configured extras.
    fn seeded(service: &ServiceConfig) -> Self {
        let mut instances = vec![ServiceInstance::new(service.base_url.clone(), 1)];
        for extra in &service.instances {
            if extra.url != service.base_url {
                instances.push(ServiceInstance::new(extra.url.clone(), extra.weight));
            }
        }
        Self { instances, cursor: 0 }
    }

    fn find_mut(&mut self, url: &str) -> Option<&mut ServiceInstance> {
        self.instances.iter_mut().find(|i| i.url == url)
    }
}

/// Aggregate view of one service's pool.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub service: String,
    pub total_instances: usize,
    pub healthy_instances: usize,
    pub total_connections: u64,
    pub average_response_time_ms: u64,
    pub strategy: StrategyKind,
    pub instances: Vec<InstanceSnapshot>,
}

/// Selects a service instance for each request.
pub struct LoadBalancer {
    registry: Arc<ServiceRegistry>,
    pools: DashMap<String, ServicePool>,
    strategy: Box<dyn SelectionStrategy>,
    stale_after: Duration,
}

impl LoadBalancer {
    /// Create a load balancer with one pool per currently registered service.
    pub fn new(registry: Arc<ServiceRegistry>, config: &LoadBalancerConfig) -> Self {
        Self::with_strategy(registry, build_strategy(config.strategy), config)
    }

    pub fn with_strategy(
        registry: Arc<ServiceRegistry>,
        strategy: Box<dyn SelectionStrategy>,
        config: &LoadBalancerConfig,
    ) -> Self {
        let pools = DashMap::new();
        for service in registry.get_all_services() {
            pools.insert(service.name.clone(), ServicePool::seeded(&service));
        }
        tracing::info!(
            services = pools.len(),
            strategy = %strategy.kind(),
            "Load balancer initialized with service instances"
        );

        Self {
            registry,
            pools,
            strategy,
            stale_after: Duration::from_secs(config.stale_connection_secs),
        }
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Pick a healthy instance of `service` and count a connection against it.
    ///
    /// `None` when the service is unknown or no instance is healthy.
    pub fn get_service_url(&self, service: &str) -> Option<String> {
        let mut pool = match self.pools.get_mut(service) {
            Some(pool) => pool,
            // Read the config under the entry lock so a concurrent
            // `forget_service` after re-registration cannot keep a stale pool.
            None => match self.pools.entry(service.to_string()) {
                Entry::Occupied(entry) => entry.into_ref(),
                Entry::Vacant(entry) => {
                    let config = self.registry.get_service(service)?;
                    entry.insert(ServicePool::seeded(&config))
                }
            },
        };
        let ServicePool { instances, cursor } = &mut *pool;

        if instances.is_empty() {
            tracing::warn!(service = %service, "No instances found for service");
            return None;
        }

        // Only the instance at the registry URL has a health signal; an
        // unprobed (`unknown`) service is not routable.
        if let Some(status) = self.registry.get_status(service) {
            for instance in instances.iter_mut().filter(|i| i.url == status.url) {
                instance.healthy = status.is_healthy();
                instance.last_response_time_ms = status.last_response_time_ms;
            }
        }

        let healthy: Vec<usize> = instances
            .iter()
            .enumerate()
            .filter(|(_, i)| i.healthy)
            .map(|(index, _)| index)
            .collect();
        if healthy.is_empty() {
            tracing::warn!(service = %service, "No healthy instances found for service");
            return None;
        }

        let candidates: Vec<&ServiceInstance> = healthy.iter().map(|&i| &instances[i]).collect();
        let choice = self.strategy.select(&candidates, cursor)?;
        let selected = &mut instances[healthy[choice]];

        selected.active_connections += 1;
        selected.last_used_at = Instant::now();
        metrics::record_instance_connections(service, &selected.url, selected.active_connections);

        tracing::debug!(service = %service, instance = %selected.url, "Selected instance");
        Some(selected.url.clone())
    }

    /// Add an instance. An existing instance with the same URL only gets
    /// its weight updated.
    pub fn add_instance(&self, service: &str, url: &str, weight: u32) {
        let mut pool = self.pools.entry(service.to_string()).or_insert_with(|| {
            self.registry
                .get_service(service)
                .map(|config| ServicePool::seeded(&config))
                .unwrap_or_default()
        });

        match pool.find_mut(url) {
            Some(existing) => existing.weight = weight,
            None => pool.instances.push(ServiceInstance::new(url, weight)),
        }

        tracing::info!(service = %service, instance = %url, weight, "Added service instance");
    }

    /// Remove an instance; unknown services or URLs are a no-op.
    pub fn remove_instance(&self, service: &str, url: &str) {
        let Some(mut pool) = self.pools.get_mut(service) else {
            return;
        };
        let before = pool.instances.len();
        pool.instances.retain(|i| i.url != url);
        if pool.instances.len() != before {
            tracing::info!(service = %service, instance = %url, "Removed service instance");
        }
    }

    pub fn update_instance_weight(&self, service: &str, url: &str, weight: u32) {
        if let Some(mut pool) = self.pools.get_mut(service) {
            if let Some(instance) = pool.find_mut(url) {
                instance.weight = weight;
                tracing::info!(service = %service, instance = %url, weight, "Updated instance weight");
            }
        }
    }

    /// Decrement the connection count of an instance, floored at zero.
    pub fn release_connection(&self, service: &str, url: &str) {
        if let Some(mut pool) = self.pools.get_mut(service) {
            if let Some(instance) = pool.find_mut(url) {
                instance.active_connections = instance.active_connections.saturating_sub(1);
                metrics::record_instance_connections(service, url, instance.active_connections);
            }
        }
    }

    /// Drop the pool of a service (after unregistration).
    pub fn forget_service(&self, service: &str) {
        self.pools.remove(service);
    }

    /// Decay by one the connection count of every instance idle for longer
    /// than the staleness window. Returns how many instances were adjusted.
    pub fn cleanup_stale_connections(&self) -> usize {
        self.cleanup_stale_connections_at(Instant::now())
    }

    pub(crate) fn cleanup_stale_connections_at(&self, now: Instant) -> usize {
        let mut adjusted = 0;
        for mut entry in self.pools.iter_mut() {
            let (service, pool) = entry.pair_mut();
            for instance in pool.instances.iter_mut() {
                let idle = now.saturating_duration_since(instance.last_used_at);
                if idle > self.stale_after && instance.active_connections > 0 {
                    tracing::debug!(
                        service = %service,
                        instance = %instance.url,
                        "Cleaning up stale connections"
                    );
                    instance.active_connections -= 1;
                    adjusted += 1;
                }
            }
        }
        adjusted
    }

    /// True when at least half of the services have a healthy instance,
    /// or there are no services at all.
    pub fn is_healthy(&self) -> bool {
        let total = self.pools.len();
        let healthy = self
            .pools
            .iter()
            .filter(|pool| pool.instances.iter().any(|i| i.healthy))
            .count();
        total == 0 || healthy * 2 >= total
    }

    pub fn service_instances(&self, service: &str) -> Vec<InstanceSnapshot> {
        self.pools
            .get(service)
            .map(|pool| pool.instances.iter().map(ServiceInstance::snapshot).collect())
            .unwrap_or_default()
    }

    pub fn all_instances(&self) -> BTreeMap<String, Vec<InstanceSnapshot>> {
        self.pools
            .iter()
            .map(|pool| {
                let snapshots = pool.instances.iter().map(ServiceInstance::snapshot).collect();
                (pool.key().clone(), snapshots)
            })
            .collect()
    }

    /// Per-service statistics, sorted by service name.
    pub fn stats(&self) -> Vec<ServiceStats> {
        let mut stats: Vec<_> = self
            .pools
            .iter()
            .map(|pool| {
                let instances = &pool.instances;
                let average = if instances.is_empty() {
                    0
                } else {
                    instances.iter().map(|i| i.last_response_time_ms).sum::<u64>()
                        / instances.len() as u64
                };
                ServiceStats {
                    service: pool.key().clone(),
                    total_instances: instances.len(),
                    healthy_instances: instances.iter().filter(|i| i.healthy).count(),
                    total_connections: instances.iter().map(|i| u64::from(i.active_connections)).sum(),
                    average_response_time_ms: average,
                    strategy: self.strategy.kind(),
                    instances: instances.iter().map(ServiceInstance::snapshot).collect(),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.service.cmp(&b.service));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthCheckConfig;
    use crate::health::HealthState;

    fn registry_with(services: &[(&str, &str)]) -> Arc<ServiceRegistry> {
        let configs = services
            .iter()
            .map(|(name, url)| ServiceConfig::new(*name, *url))
            .collect();
        Arc::new(ServiceRegistry::with_services(configs, &HealthCheckConfig::default()))
    }

    fn balancer(registry: Arc<ServiceRegistry>, strategy: StrategyKind) -> LoadBalancer {
        LoadBalancer::new(
            registry,
            &LoadBalancerConfig {
                strategy,
                ..LoadBalancerConfig::default()
            },
        )
    }

    fn set_state(registry: &ServiceRegistry, name: &str, state: HealthState, response_ms: u64) {
        let mut status = registry.get_status(name).unwrap();
        status.state = state;
        status.last_response_time_ms = response_ms;
        registry.update_status(status);
    }

    #[test]
    fn test_seeded_with_registry_url() {
        let registry = registry_with(&[("auth", "http://a:3001")]);
        let lb = balancer(registry.clone(), StrategyKind::HealthBased);
        set_state(&registry, "auth", HealthState::Healthy, 3);

        assert_eq!(lb.get_service_url("auth").as_deref(), Some("http://a:3001"));
        let instances = lb.service_instances("auth");
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].active_connections, 1);
        assert!(lb.get_service_url("missing").is_none());
    }

    #[tokio::test]
    async fn test_lazy_pool_for_late_registration() {
        let registry = registry_with(&[]);
        let lb = balancer(registry.clone(), StrategyKind::RoundRobin);
        assert!(lb.get_service_url("late").is_none());
        assert!(lb.service_instances("late").is_empty());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        registry.register_service(ServiceConfig::new("late", url.clone())).await;

        // Seeded on first use, but the probe marked it unhealthy.
        assert!(lb.get_service_url("late").is_none());
        let instances = lb.service_instances("late");
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].url, url);
        assert!(!instances[0].healthy);
    }

    #[test]
    fn test_unknown_registry_status_blocks_selection() {
        let registry = registry_with(&[("s", "http://127.0.0.1:9")]);
        let lb = balancer(registry.clone(), StrategyKind::RoundRobin);
        assert_eq!(registry.get_status("s").unwrap().state, HealthState::Unknown);

        assert!(lb.get_service_url("s").is_none());
        assert!(!lb.service_instances("s")[0].healthy);

        set_state(&registry, "s", HealthState::Healthy, 1);
        assert_eq!(lb.get_service_url("s").as_deref(), Some("http://127.0.0.1:9"));
    }

    #[test]
    fn test_unhealthy_registry_status_blocks_selection() {
        let registry = registry_with(&[("cart", "http://c:3006")]);
        let lb = balancer(registry.clone(), StrategyKind::HealthBased);

        set_state(&registry, "cart", HealthState::Unhealthy, 12);
        assert!(lb.get_service_url("cart").is_none());
        assert!(!lb.is_healthy());

        set_state(&registry, "cart", HealthState::Healthy, 8);
        assert_eq!(lb.get_service_url("cart").as_deref(), Some("http://c:3006"));
        assert_eq!(lb.service_instances("cart")[0].last_response_time_ms, 8);
    }

    #[test]
    fn test_health_sync_only_touches_matching_url() {
        let registry = registry_with(&[("orders", "http://o1")]);
        let lb = balancer(registry.clone(), StrategyKind::RoundRobin);
        lb.add_instance("orders", "http://o2", 1);

        set_state(&registry, "orders", HealthState::Unhealthy, 0);
        for _ in 0..4 {
            assert_eq!(lb.get_service_url("orders").as_deref(), Some("http://o2"));
        }
    }

    #[test]
    fn test_weighted_round_robin_scenario() {
        let registry = registry_with(&[]);
        let lb = balancer(registry, StrategyKind::WeightedRoundRobin);
        lb.add_instance("svc", "http://a", 1);
        lb.add_instance("svc", "http://b", 3);

        let picks: Vec<_> = (0..4).map(|_| lb.get_service_url("svc").unwrap()).collect();
        assert_eq!(picks.iter().filter(|u| *u == "http://a").count(), 1);
        assert_eq!(picks.iter().filter(|u| *u == "http://b").count(), 3);
    }

    #[test]
    fn test_add_remove_and_release() {
        let registry = registry_with(&[("users", "http://u1")]);
        let lb = balancer(registry.clone(), StrategyKind::LeastConnections);
        set_state(&registry, "users", HealthState::Healthy, 0);
        lb.add_instance("users", "http://u2", 2);
        lb.add_instance("users", "http://u2", 5);
        assert_eq!(lb.service_instances("users").len(), 2);
        assert_eq!(lb.service_instances("users")[1].weight, 5);

        assert_eq!(lb.get_service_url("users").as_deref(), Some("http://u1"));
        assert_eq!(lb.get_service_url("users").as_deref(), Some("http://u2"));
        assert_eq!(lb.get_service_url("users").as_deref(), Some("http://u1"));

        lb.release_connection("users", "http://u1");
        lb.release_connection("users", "http://u1");
        lb.release_connection("users", "http://u1");
        assert_eq!(lb.service_instances("users")[0].active_connections, 0);

        lb.remove_instance("users", "http://nope");
        lb.remove_instance("ghost", "http://u1");
        lb.remove_instance("users", "http://u2");
        assert_eq!(lb.service_instances("users").len(), 1);
    }

    #[test]
    fn test_stale_connections_decay_by_one() {
        let registry = registry_with(&[("pay", "http://p")]);
        let lb = balancer(registry.clone(), StrategyKind::HealthBased);
        set_state(&registry, "pay", HealthState::Healthy, 0);
        lb.get_service_url("pay");
        lb.get_service_url("pay");

        assert_eq!(lb.cleanup_stale_connections_at(Instant::now()), 0);

        let later = Instant::now() + Duration::from_secs(301);
        assert_eq!(lb.cleanup_stale_connections_at(later), 1);
        assert_eq!(lb.service_instances("pay")[0].active_connections, 1);
        assert_eq!(lb.cleanup_stale_connections_at(later), 1);
        assert_eq!(lb.cleanup_stale_connections_at(later), 0);
    }

    #[test]
    fn test_is_healthy_threshold() {
        let registry = registry_with(&[("a", "http://a"), ("b", "http://b"), ("c", "http://c")]);
        let lb = balancer(registry.clone(), StrategyKind::HealthBased);
        assert!(lb.is_healthy());

        set_state(&registry, "a", HealthState::Unhealthy, 0);
        lb.get_service_url("a");
        assert!(lb.is_healthy());

        set_state(&registry, "b", HealthState::Unhealthy, 0);
        lb.get_service_url("b");
        assert!(!lb.is_healthy());

        assert!(balancer(registry_with(&[]), StrategyKind::Random).is_healthy());
    }

    #[test]
    fn test_stats() {
        let registry = registry_with(&[("b", "http://b"), ("a", "http://a")]);
        let lb = balancer(registry.clone(), StrategyKind::RoundRobin);
        set_state(&registry, "a", HealthState::Healthy, 0);
        lb.get_service_url("a");

        let stats = lb.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].service, "a");
        assert_eq!(stats[0].total_connections, 1);
        assert_eq!(stats[0].strategy, StrategyKind::RoundRobin);
        assert_eq!(lb.all_instances().len(), 2);

        lb.forget_service("a");
        assert!(lb.service_instances("a").is_empty());
    }
}

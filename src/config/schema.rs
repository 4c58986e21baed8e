//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the service gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Gateway-wide forwarding defaults.
    pub proxy: ProxyConfig,

    /// Circuit breaker defaults and admission policy.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Health check loop settings.
    pub health_check: HealthCheckConfig,

    /// Instance selection settings.
    pub load_balancer: LoadBalancerConfig,

    /// Backend services known at startup.
    pub services: Vec<ServiceConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Administrative API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Gateway-wide forwarding defaults, used when neither the request
/// nor the service overrides them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Overall request timeout in milliseconds.
    pub timeout_ms: u64,

    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Linear backoff step: retry `n` waits `n * retry_delay_ms`.
    pub retry_delay_ms: u64,

    /// Maximum upstream response body buffered by the forwarder.
    pub max_body_bytes: usize,

    /// Value of the `X-Forwarded-By` header on outbound requests.
    pub forwarded_by: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            forwarded_by: "api-gateway".to_string(),
        }
    }
}

/// Admission policy while a breaker is half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HalfOpenPolicy {
    /// One trial request in flight at a time.
    #[default]
    SingleTrial,
    /// Every caller is admitted while half-open.
    Permissive,
}

/// Circuit breaker defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in CLOSED before opening.
    pub failure_threshold: u32,

    /// Consecutive successes in HALF_OPEN before closing.
    pub success_threshold: u32,

    /// How long the breaker stays OPEN, in milliseconds.
    pub timeout_ms: u64,

    /// HALF_OPEN admission policy.
    pub half_open_policy: HalfOpenPolicy,

    /// CLOSED breakers with no failure for this long get their counters zeroed.
    pub monitoring_period_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            timeout_ms: 60_000,
            half_open_policy: HalfOpenPolicy::default(),
            monitoring_period_ms: 300_000, // 5 minutes
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the background health loop.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Probe timeout for services that do not configure their own.
    pub timeout_ms: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_ms: 5_000,
        }
    }
}

/// Instance selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    RoundRobin,
    WeightedRoundRobin,
    LeastConnections,
    Random,
    #[default]
    HealthBased,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StrategyKind::RoundRobin => "round_robin",
            StrategyKind::WeightedRoundRobin => "weighted_round_robin",
            StrategyKind::LeastConnections => "least_connections",
            StrategyKind::Random => "random",
            StrategyKind::HealthBased => "health_based",
        };
        f.write_str(name)
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Selection strategy applied to every service.
    pub strategy: StrategyKind,

    /// Idle time after which an instance's connection counter is decayed.
    pub stale_connection_secs: u64,

    /// Interval of the maintenance sweep (stale connections, breaker cleanup).
    pub cleanup_interval_secs: u64,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            stale_connection_secs: 300, // 5 minutes
            cleanup_interval_secs: 60,
        }
    }
}

/// A backend service the gateway forwards to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServiceConfig {
    /// Unique service name (the registry key).
    pub name: String,

    /// Base URL, e.g. "http://127.0.0.1:3001".
    pub base_url: String,

    /// Path probed by the health loop.
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Request timeout; falls back to `proxy.timeout_ms`.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Retry count; falls back to `proxy.max_retries`.
    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub circuit_breaker: ServiceBreakerConfig,

    /// Additional instances beyond `base_url`.
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

impl ServiceConfig {
    /// Service with default health path, timeouts and breaker settings.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            health_path: default_health_path(),
            timeout_ms: None,
            max_retries: None,
            circuit_breaker: ServiceBreakerConfig::default(),
            instances: Vec::new(),
        }
    }
}

fn default_health_path() -> String {
    "/health".to_string()
}

/// Per-service circuit breaker overrides.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServiceBreakerConfig {
    /// Whether the forwarder consults the breaker for this service.
    pub enabled: bool,
    pub failure_threshold: Option<u32>,
    pub success_threshold: Option<u32>,
    /// OPEN duration in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for ServiceBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: None,
            success_threshold: None,
            timeout_ms: None,
        }
    }
}

/// Extra instance of a service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InstanceConfig {
    pub url: String,

    /// Weight for weighted round-robin (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Administrative API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the `/admin` routes.
    pub enabled: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

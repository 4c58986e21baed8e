//! Resilient service gateway.
//!
//! Forwards requests to named backend services through a service registry,
//! per-service circuit breakers and a per-service load balancer, with
//! bounded retries and typed error translation.

pub mod clock;
pub mod config;
pub mod gateway;
pub mod health;
pub mod load_balancer;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod registry;
pub mod resilience;

// Outer surfaces
pub mod admin;
pub mod http;

pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use proxy::{GatewayError, ProxyRequest, ProxyResponse};

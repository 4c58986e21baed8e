//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to Gateway::new at startup
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; runtime changes go through the
//!   registry/load balancer operations, not the file
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::GatewayConfig;
pub use schema::CircuitBreakerConfig;
pub use schema::HalfOpenPolicy;
pub use schema::HealthCheckConfig;
pub use schema::InstanceConfig;
pub use schema::LoadBalancerConfig;
pub use schema::ProxyConfig;
pub use schema::ServiceBreakerConfig;
pub use schema::ServiceConfig;
pub use schema::StrategyKind;

//! Service registry subsystem.
//!
//! Owns the set of known services (`ServiceConfig`) and their live health
//! (`ServiceStatus`). Both maps are keyed by service name and safe for
//! concurrent access from request handlers and the health loop.

pub mod services;

pub use services::ServiceRegistry;
pub use crate::config::ServiceConfig;
pub use crate::health::{HealthState, ServiceStatus};

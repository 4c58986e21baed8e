//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → ServiceRegistry::check_all
//!     → probe.rs probes every service concurrently
//!     → ServiceStatus (state.rs) overwritten per service
//! ```
//!
//! # Design Decisions
//! - Health is per service, not per instance; the load balancer mirrors it
//!   onto the instance whose URL matches the service URL
//! - Probe failures are recorded, never propagated
//! - Each probe carries its own timeout so one hung backend cannot stall a cycle

pub mod active;
pub mod probe;
pub mod state;

pub use active::HealthMonitor;
pub use probe::HealthProber;
pub use state::{HealthState, ServiceStatus};

//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy asks for a service URL
//!     → pool.rs (per-service instance list, seeded from the registry)
//!     → sync instance health from the registry's ServiceStatus
//!     → filter healthy instances
//!     → Apply the selection strategy:
//!         - round_robin.rs (rotate through instances)
//!         - weighted.rs (cumulative-weight walk)
//!         - least_conn.rs (fewest active connections)
//!         - random.rs (uniform pick)
//!         - health_based.rs (fastest, then least loaded)
//!     → bump the chosen instance's connection counter, return its URL
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless; the per-service cursor lives in the pool
//! - One strategy for the whole gateway, chosen by configuration
//! - Connection counts are approximate: incremented on selection,
//!   decremented by `release_connection` or the stale sweep

pub mod health_based;
pub mod instance;
pub mod least_conn;
pub mod pool;
pub mod random;
pub mod round_robin;
pub mod weighted;

use std::fmt::Debug;
use crate::config::StrategyKind;

pub use instance::{InstanceSnapshot, ServiceInstance};
pub use pool::{LoadBalancer, ServiceStats};

/// Instance selection algorithm.
pub trait SelectionStrategy: Send + Sync + Debug {
    /// Which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Pick one of `candidates` (all healthy, non-empty) and return its index.
    /// `cursor` is the per-service monotonic counter.
    fn select(&self, candidates: &[&ServiceInstance], cursor: &mut u64) -> Option<usize>;
}

/// Build the strategy named in configuration.
pub fn build_strategy(kind: StrategyKind) -> Box<dyn SelectionStrategy> {
    match kind {
        StrategyKind::RoundRobin => Box::new(round_robin::RoundRobin::new()),
        StrategyKind::WeightedRoundRobin => Box::new(weighted::WeightedRoundRobin::new()),
        StrategyKind::LeastConnections => Box::new(least_conn::LeastConnections::new()),
        StrategyKind::Random => Box::new(random::RandomSelect::new()),
        StrategyKind::HealthBased => Box::new(health_based::HealthBased::new()),
    }
}

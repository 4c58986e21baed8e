//! Health-based load balancing strategy (the default).
//!
//! Prefers the instance with the lowest last response time, then the one
//! with the fewest active connections, then list order.

use crate::config::StrategyKind;
use crate::load_balancer::{SelectionStrategy, ServiceInstance};

#[derive(Debug, Default)]
pub struct HealthBased;

impl HealthBased {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for HealthBased {
    fn kind(&self) -> StrategyKind {
        StrategyKind::HealthBased
    }

    fn select(&self, candidates: &[&ServiceInstance], _cursor: &mut u64) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(index, instance)| {
                (instance.last_response_time_ms, instance.active_connections, *index)
            })
            .map(|(index, _)| index)
    }
}

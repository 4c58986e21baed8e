//! Round-robin load balancing strategy.

use crate::config::StrategyKind;
use crate::load_balancer::{SelectionStrategy, ServiceInstance};

/// Round-robin selector.
/// Rotates through instances using the per-service cursor.
#[derive(Debug, Default)]
pub struct RoundRobin;

impl RoundRobin {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for RoundRobin {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RoundRobin
    }

    fn select(&self, candidates: &[&ServiceInstance], cursor: &mut u64) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let index = (*cursor % candidates.len() as u64) as usize;
        *cursor = cursor.wrapping_add(1);
        Some(index)
    }
}

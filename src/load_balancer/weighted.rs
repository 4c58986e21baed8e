//! Weighted round-robin load balancing strategy.
//!
//! Walks the cumulative weights to find the slot `cursor % total_weight`,
//! so an instance with weight `w` gets `w` consecutive picks per cycle.

use crate::config::StrategyKind;
use crate::load_balancer::{SelectionStrategy, ServiceInstance};

#[derive(Debug, Default)]
pub struct WeightedRoundRobin;

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for WeightedRoundRobin {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WeightedRoundRobin
    }

    fn select(&self, candidates: &[&ServiceInstance], cursor: &mut u64) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let total: u64 = candidates.iter().map(|i| u64::from(i.weight)).sum();
        if total == 0 {
            return Some(0);
        }

        let target = *cursor % total + 1;
        *cursor = cursor.wrapping_add(1);

        let mut cumulative = 0;
        for (index, instance) in candidates.iter().enumerate() {
            cumulative += u64::from(instance.weight);
            if cumulative >= target {
                return Some(index);
            }
        }
        Some(0)
    }
}

//! Uniform random load balancing strategy.

use rand::Rng;
use crate::config::StrategyKind;
use crate::load_balancer::{SelectionStrategy, ServiceInstance};

#[derive(Debug, Default)]
pub struct RandomSelect;

impl RandomSelect {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for RandomSelect {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }

    fn select(&self, candidates: &[&ServiceInstance], _cursor: &mut u64) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        Some(rand::thread_rng().gen_range(0..candidates.len()))
    }
}

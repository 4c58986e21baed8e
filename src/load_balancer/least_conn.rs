//! Least Connections load balancing strategy.

use crate::config::StrategyKind;
use crate::load_balancer::{SelectionStrategy, ServiceInstance};

/// Least connections selector.
/// Selects the instance with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for LeastConnections {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LeastConnections
    }

    fn select(&self, candidates: &[&ServiceInstance], _cursor: &mut u64) -> Option<usize> {
        // Index in the key keeps ties on the first instance in list order.
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(index, instance)| (instance.active_connections, *index))
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let mut a = ServiceInstance::new("http://a", 1);
        let mut b = ServiceInstance::new("http://b", 1);
        let mut cursor = 0;

        a.active_connections = 1;
        assert_eq!(lb.select(&[&a, &b], &mut cursor), Some(1));

        b.active_connections = 2;
        assert_eq!(lb.select(&[&a, &b], &mut cursor), Some(0));

        a.active_connections = 2;
        assert_eq!(lb.select(&[&a, &b], &mut cursor), Some(0), "ties go to list order");
    }
}

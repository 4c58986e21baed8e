//! Service instance abstraction.
//!
//! # Responsibilities
//! - Represent one network-reachable replica of a service
//! - Track active connections (for least-connections and health-based selection)
//! - Carry the health and response time mirrored from the registry

use std::time::Instant;
use serde::Serialize;
use crate::clock;

/// A single instance of a backend service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInstance {
    /// Base URL of the instance.
    pub url: String,
    /// Weight for weighted round-robin.
    pub weight: u32,
    /// Selections not yet released.
    pub active_connections: u32,
    pub last_response_time_ms: u64,
    pub healthy: bool,
    pub last_used_at: Instant,
}

impl ServiceInstance {
    /// New instance, assumed healthy until the registry says otherwise.
    pub fn new(url: impl Into<String>, weight: u32) -> Self {
        Self {
            url: url.into(),
            weight,
            active_connections: 0,
            last_response_time_ms: 0,
            healthy: true,
            last_used_at: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            url: self.url.clone(),
            weight: self.weight,
            active_connections: self.active_connections,
            last_response_time_ms: self.last_response_time_ms,
            healthy: self.healthy,
            last_used_at: clock::instant_to_millis(self.last_used_at),
        }
    }
}

/// Serializable view of an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    pub url: String,
    pub weight: u32,
    pub active_connections: u32,
    pub last_response_time_ms: u64,
    pub healthy: bool,
    /// Unix epoch milliseconds.
    pub last_used_at: u64,
}

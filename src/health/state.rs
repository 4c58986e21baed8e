//! Service health state.
//!
//! # States
//! - Unknown: registered, not yet probed
//! - Healthy: last probe returned 2xx
//! - Unhealthy: last probe failed (non-2xx, connection error or timeout)
//!
//! Each probe overwrites the previous status wholesale; there is no
//! hysteresis at this level.

use serde::Serialize;
use crate::clock;
use crate::config::ServiceConfig;

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Unknown => f.write_str("unknown"),
            HealthState::Healthy => f.write_str("healthy"),
            HealthState::Unhealthy => f.write_str("unhealthy"),
        }
    }
}

/// Last observed health of a service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub url: String,
    pub state: HealthState,
    /// Unix epoch milliseconds of the last probe (or registration).
    pub last_checked_at: u64,
    pub last_response_time_ms: u64,
    pub last_error: Option<String>,
}

impl ServiceStatus {
    /// Status of a service that has not been probed yet.
    pub fn unknown(service: &ServiceConfig) -> Self {
        Self {
            name: service.name.clone(),
            url: service.base_url.clone(),
            state: HealthState::Unknown,
            last_checked_at: clock::now_millis(),
            last_response_time_ms: 0,
            last_error: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

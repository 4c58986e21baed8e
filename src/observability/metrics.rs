//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by service, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency by service
//! - `gateway_upstream_retries_total` (counter): retries by service
//! - `gateway_circuit_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_service_health` (gauge): 1=healthy, 0=unhealthy
//! - `gateway_active_connections` (gauge): per service instance

use std::net::SocketAddr;
use std::time::Instant;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use crate::resilience::BreakerState;

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(service: &str, status: u16, started: Instant) {
    counter!(
        "gateway_requests_total",
        "service" => service.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "service" => service.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_retry(service: &str) {
    counter!("gateway_upstream_retries_total", "service" => service.to_string()).increment(1);
}

pub fn record_breaker_state(service: &str, state: BreakerState) {
    gauge!("gateway_circuit_breaker_state", "service" => service.to_string())
        .set(breaker_state_value(state));
}

pub fn record_service_health(service: &str, healthy: bool) {
    gauge!("gateway_service_health", "service" => service.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_instance_connections(service: &str, instance: &str, connections: u32) {
    gauge!(
        "gateway_active_connections",
        "service" => service.to_string(),
        "instance" => instance.to_string()
    )
    .set(f64::from(connections));
}

fn breaker_state_value(state: BreakerState) -> f64 {
    match state {
        BreakerState::Closed => 0.0,
        BreakerState::HalfOpen => 1.0,
        BreakerState::Open => 2.0,
    }
}

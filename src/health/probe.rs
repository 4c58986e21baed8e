//! Single-service health probe.
//!
//! `GET {base_url}{health_path}` with the service's timeout. 2xx is healthy;
//! anything else (status, connection error, timeout) is unhealthy with the
//! error text captured. Response time is recorded either way.

use std::time::{Duration, Instant};
use axum::body::Body;
use axum::http::{header, Method, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;
use crate::clock;
use crate::config::ServiceConfig;
use crate::health::state::{HealthState, ServiceStatus};

const USER_AGENT: &str = "service-gateway-health-check";

/// Issues health probes over a shared HTTP client.
#[derive(Clone)]
pub struct HealthProber {
    client: Client<HttpConnector, Body>,
}

impl HealthProber {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    /// Probe one service. Never fails; problems end up in the returned status.
    pub async fn probe(&self, service: &ServiceConfig, timeout: Duration) -> ServiceStatus {
        let started = Instant::now();
        let result = self.check(service, timeout).await;
        let elapsed = clock::as_millis(started.elapsed());

        let (state, last_error) = match result {
            Ok(()) => {
                tracing::debug!(service = %service.name, elapsed_ms = elapsed, "Health check passed");
                (HealthState::Healthy, None)
            }
            Err(error) => {
                tracing::warn!(service = %service.name, error = %error, "Health check failed");
                (HealthState::Unhealthy, Some(error))
            }
        };

        ServiceStatus {
            name: service.name.clone(),
            url: service.base_url.clone(),
            state,
            last_checked_at: clock::now_millis(),
            last_response_time_ms: elapsed,
            last_error,
        }
    }

    async fn check(&self, service: &ServiceConfig, timeout: Duration) -> Result<(), String> {
        let uri = format!("{}{}", service.base_url.trim_end_matches('/'), service.health_path);
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::USER_AGENT, USER_AGENT)
            .body(Body::empty())
            .map_err(|e| format!("invalid health check request: {e}"))?;

        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(format!("unexpected status {}", response.status())),
            Ok(Err(e)) => Err(crate::proxy::error::describe(&e)),
            Err(_) => Err(format!("timed out after {}ms", clock::as_millis(timeout))),
        }
    }
}

impl Default for HealthProber {
    fn default() -> Self {
        Self::new()
    }
}

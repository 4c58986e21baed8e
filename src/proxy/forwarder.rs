//! Request forwarding with breaker admission, instance selection, retries
//! and error translation.
//!
//! # Flow
//! ```text
//! proxy_request
//!     → registry lookup            (unknown → ServiceNotFound)
//!     → breaker admission          (rejected → ServiceUnavailable, counters untouched)
//!     → load balancer selection    (none → ServiceUnavailable)
//!     → build URL, headers, body
//!     → attempt loop under one overall deadline, linear backoff between attempts
//!     → record success/failure on the breaker, translate the final failure
//! ```
//!
//! A failed request releases its selected connection before returning. A
//! successful one leaves the release to the caller, once the response has
//! been delivered (`ProxyResponse::instance_url`).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use axum::body::{Body, Bytes};
use axum::http::{response::Parts, HeaderMap, Method, Request, Uri};
use futures_util::future::join_all;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Serialize;
use tokio::time;
use url::Url;
use crate::clock;
use crate::config::{ProxyConfig, ServiceConfig};
use crate::health::ServiceStatus;
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::proxy::error::{AttemptFailure, GatewayError, UnavailableReason};
use crate::proxy::headers;
use crate::proxy::types::{ProxyRequest, ProxyResponse};
use crate::registry::ServiceRegistry;
use crate::resilience::retries::is_retryable_status;
use crate::resilience::{CircuitBreaker, Deadline, RetryPolicy};

/// Outcome of warming up one service.
#[derive(Debug, Clone, Serialize)]
pub struct WarmupResult {
    pub service: String,
    pub success: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// Fully prepared outbound request, reused across attempts.
struct Outbound {
    uri: Uri,
    method: Method,
    headers: HeaderMap,
    body: Option<Bytes>,
}

/// Forwards requests to backend services.
#[derive(Clone)]
pub struct Forwarder {
    registry: Arc<ServiceRegistry>,
    breaker: Arc<CircuitBreaker>,
    balancer: Arc<LoadBalancer>,
    client: Client<HttpConnector, Body>,
    config: ProxyConfig,
}

impl Forwarder {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        breaker: Arc<CircuitBreaker>,
        balancer: Arc<LoadBalancer>,
        config: ProxyConfig,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            registry,
            breaker,
            balancer,
            client,
            config,
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Forward one request. See the module docs for the sequence.
    pub async fn proxy_request(&self, request: ProxyRequest) -> Result<ProxyResponse, GatewayError> {
        let started = Instant::now();
        let service = request.service_name.clone();

        let result = self.forward(request, started).await;
        match &result {
            Ok(response) => {
                metrics::record_request(&service, response.status.as_u16(), started);
                tracing::debug!(
                    service = %service,
                    status = %response.status,
                    instance = %response.instance_url,
                    elapsed_ms = clock::as_millis(response.elapsed),
                    "Request completed"
                );
            }
            Err(error) => {
                metrics::record_request(&service, error.status_code().as_u16(), started);
                tracing::error!(
                    service = %service,
                    kind = error.kind().as_str(),
                    elapsed_ms = clock::as_millis(started.elapsed()),
                    error = %error,
                    "Request failed"
                );
            }
        }
        result
    }

    async fn forward(&self, request: ProxyRequest, started: Instant) -> Result<ProxyResponse, GatewayError> {
        let name = request.service_name.as_str();

        // 1. Service lookup
        let service = self
            .registry
            .get_service(name)
            .ok_or_else(|| GatewayError::ServiceNotFound { service: name.to_string() })?;

        // 2. Breaker admission
        let breaker_enabled = service.circuit_breaker.enabled;
        if breaker_enabled && !self.breaker.can_execute(name) {
            tracing::warn!(service = %name, "Circuit breaker rejected request");
            return Err(GatewayError::ServiceUnavailable {
                service: name.to_string(),
                reason: UnavailableReason::CircuitOpen,
            });
        }

        // 3. Instance selection
        let Some(instance_url) = self.balancer.get_service_url(name) else {
            if breaker_enabled {
                self.breaker.abandon_trial(name);
            }
            return Err(GatewayError::ServiceUnavailable {
                service: name.to_string(),
                reason: UnavailableReason::NoHealthyInstance,
            });
        };

        // 4. Outbound request
        let outbound = match self.prepare(&request, &instance_url) {
            Ok(outbound) => outbound,
            Err(error) => {
                if breaker_enabled {
                    self.breaker.abandon_trial(name);
                }
                self.balancer.release_connection(name, &instance_url);
                return Err(error);
            }
        };
        let request_id = headers::request_id(&outbound.headers)
            .unwrap_or_default()
            .to_string();

        tracing::debug!(
            service = %name,
            request_id = %request_id,
            method = %outbound.method,
            target = %outbound.uri,
            "Proxying request"
        );

        // 5. Attempts under one deadline
        let deadline = Deadline::new(self.timeout_for(&request, &service));
        let policy = RetryPolicy::new(
            self.retries_for(&request, &service),
            Duration::from_millis(self.config.retry_delay_ms),
        );
        let outcome = self.execute(name, &request_id, &outbound, &deadline, &policy).await;

        match outcome {
            // 6. Success
            Ok((parts, body)) => {
                if breaker_enabled {
                    self.breaker.record_success(name);
                }
                let elapsed = started.elapsed();
                Ok(ProxyResponse {
                    status: parts.status,
                    headers: headers::sanitize_response_headers(&parts.headers, name, elapsed),
                    body,
                    elapsed,
                    instance_url,
                    request_id,
                })
            }
            // 7. Failure
            Err(failure) => {
                if breaker_enabled {
                    self.breaker.record_failure(name);
                }
                self.balancer.release_connection(name, &instance_url);
                Err(failure.into_gateway_error(name, clock::as_millis(started.elapsed())))
            }
        }
    }

    async fn execute(
        &self,
        service: &str,
        request_id: &str,
        outbound: &Outbound,
        deadline: &Deadline,
        policy: &RetryPolicy,
    ) -> Result<(Parts, Bytes), AttemptFailure> {
        let mut retry = 0;
        loop {
            let remaining = deadline.remaining();
            if remaining.is_zero() {
                return Err(AttemptFailure::Timeout);
            }

            let failure = match self.attempt(outbound, remaining).await {
                Ok(done) => return Ok(done),
                Err(failure) => failure,
            };

            retry += 1;
            let Some(delay) = policy.next_delay(retry, deadline) else {
                return Err(failure);
            };

            tracing::warn!(
                service = %service,
                request_id = %request_id,
                attempt = retry,
                delay_ms = clock::as_millis(delay),
                error = %failure,
                "Request failed, retrying"
            );
            metrics::record_retry(service);
            time::sleep(delay).await;
        }
    }

    async fn attempt(&self, outbound: &Outbound, budget: Duration) -> Result<(Parts, Bytes), AttemptFailure> {
        let body = match &outbound.body {
            Some(bytes) => Body::from(bytes.clone()),
            None => Body::empty(),
        };
        let mut request = Request::builder()
            .method(outbound.method.clone())
            .uri(outbound.uri.clone())
            .body(body)
            .map_err(|e| AttemptFailure::Transport(format!("invalid upstream request: {e}")))?;
        *request.headers_mut() = outbound.headers.clone();

        match time::timeout(budget, self.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(AttemptFailure::Timeout),
        }
    }

    async fn send(&self, request: Request<Body>) -> Result<(Parts, Bytes), AttemptFailure> {
        let response: hyper::Response<Incoming> = self
            .client
            .request(request)
            .await
            .map_err(|e| AttemptFailure::from_client(&e))?;

        let (parts, body) = response.into_parts();
        if is_retryable_status(parts.status) {
            return Err(AttemptFailure::Status(parts.status));
        }

        let bytes = axum::body::to_bytes(Body::new(body), self.config.max_body_bytes)
            .await
            .map_err(|e| AttemptFailure::Transport(format!("failed to read upstream body: {e}")))?;
        Ok((parts, bytes))
    }

    fn prepare(&self, request: &ProxyRequest, instance_url: &str) -> Result<Outbound, GatewayError> {
        let uri = target_uri(instance_url, &request.path, &request.query).map_err(|message| {
            GatewayError::UpstreamError {
                service: request.service_name.clone(),
                message,
                status: None,
            }
        })?;

        let body = if request.carries_body() {
            Some(request.body.clone().unwrap_or_default())
        } else {
            None
        };
        let headers = headers::outbound_headers(
            &request.headers,
            request.caller.as_ref(),
            &self.config.forwarded_by,
            body.as_ref().is_some_and(|b| !b.is_empty()),
        );

        Ok(Outbound {
            uri,
            method: request.method.clone(),
            headers,
            body,
        })
    }

    fn timeout_for(&self, request: &ProxyRequest, service: &ServiceConfig) -> Duration {
        request
            .timeout_override
            .or_else(|| service.timeout_ms.map(Duration::from_millis))
            .unwrap_or_else(|| Duration::from_millis(self.config.timeout_ms))
    }

    fn retries_for(&self, request: &ProxyRequest, service: &ServiceConfig) -> u32 {
        request
            .retry_override
            .or(service.max_retries)
            .unwrap_or(self.config.max_retries)
    }

    pub async fn proxy_get(
        &self,
        service: &str,
        path: &str,
        query: Vec<(String, String)>,
        headers: HeaderMap,
    ) -> Result<ProxyResponse, GatewayError> {
        self.proxy_request(
            ProxyRequest::new(service, Method::GET, path)
                .with_query(query)
                .with_headers(headers),
        )
        .await
    }

    pub async fn proxy_post(
        &self,
        service: &str,
        path: &str,
        body: Bytes,
        headers: HeaderMap,
    ) -> Result<ProxyResponse, GatewayError> {
        self.proxy_with_body(service, Method::POST, path, body, headers).await
    }

    pub async fn proxy_put(
        &self,
        service: &str,
        path: &str,
        body: Bytes,
        headers: HeaderMap,
    ) -> Result<ProxyResponse, GatewayError> {
        self.proxy_with_body(service, Method::PUT, path, body, headers).await
    }

    pub async fn proxy_patch(
        &self,
        service: &str,
        path: &str,
        body: Bytes,
        headers: HeaderMap,
    ) -> Result<ProxyResponse, GatewayError> {
        self.proxy_with_body(service, Method::PATCH, path, body, headers).await
    }

    pub async fn proxy_delete(
        &self,
        service: &str,
        path: &str,
        headers: HeaderMap,
    ) -> Result<ProxyResponse, GatewayError> {
        self.proxy_request(ProxyRequest::new(service, Method::DELETE, path).with_headers(headers))
            .await
    }

    async fn proxy_with_body(
        &self,
        service: &str,
        method: Method,
        path: &str,
        body: Bytes,
        headers: HeaderMap,
    ) -> Result<ProxyResponse, GatewayError> {
        self.proxy_request(
            ProxyRequest::new(service, method, path)
                .with_body(body)
                .with_headers(headers),
        )
        .await
    }

    /// GET every service's health path through the full forwarding path,
    /// concurrently. Failures are reported, never raised.
    pub async fn warmup_services(&self) -> Vec<WarmupResult> {
        tracing::info!("Warming up services");

        let warmups = self.registry.get_all_services().into_iter().map(|service| async move {
            let result = self
                .proxy_get(&service.name, &service.health_path, Vec::new(), HeaderMap::new())
                .await;
            match result {
                Ok(response) => {
                    self.balancer.release_connection(&service.name, &response.instance_url);
                    tracing::debug!(service = %service.name, "Warmed up service");
                    WarmupResult {
                        service: service.name,
                        success: true,
                        status: Some(response.status.as_u16()),
                        error: None,
                    }
                }
                Err(error) => {
                    tracing::warn!(service = %service.name, error = %error, "Failed to warm up service");
                    WarmupResult {
                        service: service.name,
                        success: false,
                        status: None,
                        error: Some(error.to_string()),
                    }
                }
            }
        });

        let results = join_all(warmups).await;
        tracing::info!(services = results.len(), "Service warmup completed");
        results
    }

    /// Last known health of every service, keyed by name.
    pub fn service_health(&self) -> BTreeMap<String, ServiceStatus> {
        self.registry
            .get_all_statuses()
            .into_iter()
            .map(|status| (status.name.clone(), status))
            .collect()
    }
}

/// `instance_url + path`, with `query` appended to any query already in `path`.
pub(crate) fn target_uri(instance_url: &str, path: &str, query: &[(String, String)]) -> Result<Uri, String> {
    let joined = if path.is_empty() || path.starts_with('/') {
        format!("{}{}", instance_url.trim_end_matches('/'), path)
    } else {
        format!("{}/{}", instance_url.trim_end_matches('/'), path)
    };

    let mut url = Url::parse(&joined).map_err(|e| format!("invalid target url {joined}: {e}"))?;
    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    url.as_str()
        .parse::<Uri>()
        .map_err(|e| format!("invalid target uri {url}: {e}"))
}

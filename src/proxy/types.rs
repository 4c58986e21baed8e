//! Request and response descriptors exchanged with the forwarder.

use std::time::Duration;
use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

/// Authenticated caller, resolved upstream of the gateway core.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

/// A request destined for one backend service.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub service_name: String,
    /// Path appended to the instance URL, including the leading '/'.
    pub path: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub caller: Option<CallerIdentity>,
    /// Overall timeout; beats the service and gateway defaults.
    pub timeout_override: Option<Duration>,
    /// Retry count; beats the service and gateway defaults.
    pub retry_override: Option<u32>,
}

impl ProxyRequest {
    pub fn new(service_name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            path: path.into(),
            method,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            caller: None,
            timeout_override: None,
            retry_override: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Add a single header; invalid names or values are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_caller(mut self, caller: CallerIdentity) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retry_override = Some(retries);
        self
    }

    /// Only POST, PUT and PATCH forward a body.
    pub fn carries_body(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }
}

/// Normalized upstream response.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    /// Allow-listed upstream headers plus the gateway's own.
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Time from entering the forwarder to the last body byte.
    pub elapsed: Duration,
    /// Instance that served the request; pass it to `release_connection`.
    pub instance_url: String,
    /// `X-Request-ID` sent upstream.
    pub request_id: String,
}

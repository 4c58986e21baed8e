//! Forwarding errors.
//!
//! # Taxonomy
//! - `ServiceNotFound`: unknown service name, never retried
//! - `ServiceUnavailable`: breaker open, no healthy instance, or the
//!   instance refused the connection / could not be resolved
//! - `RequestTimeout`: the overall deadline ran out
//! - `UpstreamError`: any other transport or HTTP-level failure
//!
//! The core only exposes kind and message; `http::response` maps kinds
//! onto status codes and JSON bodies.

use std::error::Error as StdError;
use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Why a service could not be attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    CircuitOpen,
    NoHealthyInstance,
    /// Connection refused or name resolution failed.
    Unreachable(String),
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnavailableReason::CircuitOpen => f.write_str("circuit breaker open"),
            UnavailableReason::NoHealthyInstance => f.write_str("no healthy instances"),
            UnavailableReason::Unreachable(cause) => write!(f, "unreachable: {cause}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Service {service} not found")]
    ServiceNotFound { service: String },

    #[error("Service {service} is currently unavailable ({reason})")]
    ServiceUnavailable {
        service: String,
        reason: UnavailableReason,
    },

    #[error("Request to {service} timed out after {elapsed_ms}ms")]
    RequestTimeout { service: String, elapsed_ms: u64 },

    #[error("Error from {service}: {message}")]
    UpstreamError {
        service: String,
        message: String,
        /// Upstream status when the failure was an HTTP response.
        status: Option<u16>,
    },
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ServiceNotFound,
    ServiceUnavailable,
    RequestTimeout,
    UpstreamError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ServiceNotFound => "service_not_found",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::RequestTimeout => "request_timeout",
            ErrorKind::UpstreamError => "upstream_error",
        }
    }
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::ServiceNotFound { .. } => ErrorKind::ServiceNotFound,
            GatewayError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            GatewayError::RequestTimeout { .. } => ErrorKind::RequestTimeout,
            GatewayError::UpstreamError { .. } => ErrorKind::UpstreamError,
        }
    }

    pub fn service(&self) -> &str {
        match self {
            GatewayError::ServiceNotFound { service }
            | GatewayError::ServiceUnavailable { service, .. }
            | GatewayError::RequestTimeout { service, .. }
            | GatewayError::UpstreamError { service, .. } => service,
        }
    }

    /// HTTP status returned to the client.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::ServiceNotFound => StatusCode::NOT_FOUND,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::RequestTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::UpstreamError => StatusCode::BAD_GATEWAY,
        }
    }

    /// True when no network call was made for this request.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            GatewayError::ServiceNotFound { .. }
                | GatewayError::ServiceUnavailable {
                    reason: UnavailableReason::CircuitOpen | UnavailableReason::NoHealthyInstance,
                    ..
                }
        )
    }
}

/// Outcome of one failed attempt, before translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttemptFailure {
    Connect(String),
    Timeout,
    Transport(String),
    Status(StatusCode),
}

impl AttemptFailure {
    pub(crate) fn from_client(err: &hyper_util::client::legacy::Error) -> Self {
        if err.is_connect() {
            AttemptFailure::Connect(describe(err))
        } else {
            AttemptFailure::Transport(describe(err))
        }
    }

    pub(crate) fn into_gateway_error(self, service: &str, elapsed_ms: u64) -> GatewayError {
        let service = service.to_string();
        match self {
            AttemptFailure::Connect(cause) => GatewayError::ServiceUnavailable {
                service,
                reason: UnavailableReason::Unreachable(cause),
            },
            AttemptFailure::Timeout => GatewayError::RequestTimeout { service, elapsed_ms },
            AttemptFailure::Transport(message) => GatewayError::UpstreamError {
                service,
                message,
                status: None,
            },
            AttemptFailure::Status(status) => GatewayError::UpstreamError {
                service,
                message: format!("upstream responded with {status}"),
                status: Some(status.as_u16()),
            },
        }
    }
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptFailure::Connect(cause) => write!(f, "connect error: {cause}"),
            AttemptFailure::Timeout => f.write_str("timed out"),
            AttemptFailure::Transport(cause) => f.write_str(cause),
            AttemptFailure::Status(status) => write!(f, "status {status}"),
        }
    }
}

/// Render a client error with its source chain.
///
/// The legacy client's own `Display` is only "client error (Connect)".
pub fn describe(err: &hyper_util::client::legacy::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

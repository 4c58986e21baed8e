//! Response handling.
//!
//! # Responsibilities
//! - Turn a `ProxyResponse` into the client response (status, allow-listed
//!   headers, buffered body, `X-Request-ID`)
//! - Map `GatewayError` onto a status code and a JSON error body

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use crate::clock;
use crate::proxy::headers::X_REQUEST_ID;
use crate::proxy::{GatewayError, ProxyResponse};

/// JSON body of every gateway-generated error.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub message: String,
    pub service: Option<String>,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
}

impl ErrorBody {
    pub fn new(error: &str, message: impl Into<String>, service: Option<&str>) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            message: message.into(),
            service: service.map(str::to_string),
            timestamp: clock::now_millis(),
        }
    }
}

/// Error response with the standard JSON body.
pub fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorBody::new(self.kind().as_str(), self.to_string(), Some(self.service()));
        error_response(self.status_code(), body)
    }
}

pub fn proxy_response(response: ProxyResponse) -> Response {
    let mut headers = response.headers;
    if let Ok(value) = HeaderValue::from_str(&response.request_id) {
        headers.insert(HeaderName::from_static(X_REQUEST_ID), value);
    }

    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = headers;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use axum::body::{to_bytes, Bytes};
    use axum::http::HeaderMap;
    use crate::proxy::UnavailableReason;

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = GatewayError::ServiceUnavailable {
            service: "cart-service".into(),
            reason: UnavailableReason::NoHealthyInstance,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "service_unavailable");
        assert_eq!(json["service"], "cart-service");
        assert!(json["timestamp"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_proxy_response_echoes_request_id() {
        let response = proxy_response(ProxyResponse {
            status: StatusCode::CREATED,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"{\"id\":1}"),
            elapsed: Duration::from_millis(5),
            instance_url: "http://127.0.0.1:3001".into(),
            request_id: "req-1".into(),
        });

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-1");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"{\"id\":1}");
    }
}

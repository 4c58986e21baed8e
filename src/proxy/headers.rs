//! Header transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers (the fixed set plus anything named in `Connection`)
//! - Add `X-Forwarded-By` and `X-Request-ID` (generated when the caller sent none)
//! - Write caller identity as `X-User-ID`, `X-User-Email`, `X-User-Roles`
//! - Allow-list upstream response headers and add the gateway's own

use std::time::Duration;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;
use crate::clock;
use crate::proxy::types::CallerIdentity;

pub const X_FORWARDED_BY: &str = "x-forwarded-by";
pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_USER_ID: &str = "x-user-id";
pub const X_USER_EMAIL: &str = "x-user-email";
pub const X_USER_ROLES: &str = "x-user-roles";
pub const X_GATEWAY_SERVICE: &str = "x-gateway-service";
pub const X_RESPONSE_TIME: &str = "x-response-time";

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
];

const RESPONSE_ALLOW_LIST: &[&str] = &[
    "content-type",
    "content-length",
    "cache-control",
    "etag",
    "last-modified",
    "x-request-id",
    "x-response-time",
];

/// Headers for the upstream request.
///
/// `content-length` is dropped as well; the client recomputes it from the
/// body actually sent.
pub fn outbound_headers(
    incoming: &HeaderMap,
    caller: Option<&CallerIdentity>,
    forwarded_by: &str,
    has_body: bool,
) -> HeaderMap {
    let connection_listed: Vec<String> = incoming
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut headers = HeaderMap::with_capacity(incoming.len() + 4);
    for (name, value) in incoming {
        let lower = name.as_str();
        if HOP_BY_HOP.contains(&lower)
            || connection_listed.iter().any(|listed| listed == lower)
            || *name == header::CONTENT_LENGTH
            || is_identity_header(lower)
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Ok(value) = HeaderValue::from_str(forwarded_by) {
        headers.insert(HeaderName::from_static(X_FORWARDED_BY), value);
    }

    let has_request_id = headers
        .get(X_REQUEST_ID)
        .is_some_and(|v| !v.as_bytes().is_empty());
    if !has_request_id {
        headers.insert(HeaderName::from_static(X_REQUEST_ID), generate_request_id());
    }

    if let Some(caller) = caller {
        write_identity(&mut headers, caller);
    }

    if has_body && !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    headers
}

/// Allow-listed upstream headers plus `X-Gateway-Service` and `X-Response-Time`.
pub fn sanitize_response_headers(upstream: &HeaderMap, service: &str, elapsed: Duration) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if RESPONSE_ALLOW_LIST.contains(&name.as_str()) {
            headers.append(name.clone(), value.clone());
        }
    }

    if let Ok(value) = HeaderValue::from_str(service) {
        headers.insert(HeaderName::from_static(X_GATEWAY_SERVICE), value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{}ms", clock::as_millis(elapsed))) {
        headers.insert(HeaderName::from_static(X_RESPONSE_TIME), value);
    }
    headers
}

pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

fn generate_request_id() -> HeaderValue {
    // A hyphenated UUID is always a valid header value.
    HeaderValue::from_str(&Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

fn is_identity_header(name: &str) -> bool {
    matches!(name, X_USER_ID | X_USER_EMAIL | X_USER_ROLES)
}

fn write_identity(headers: &mut HeaderMap, caller: &CallerIdentity) {
    if let Some(value) = caller.user_id.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(HeaderName::from_static(X_USER_ID), value);
    }
    if let Some(value) = caller.email.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(HeaderName::from_static(X_USER_EMAIL), value);
    }
    if caller.user_id.is_some() {
        let roles = serde_json::to_string(&caller.roles).unwrap_or_else(|_| "[]".to_string());
        if let Ok(value) = HeaderValue::from_str(&roles) {
            headers.insert(HeaderName::from_static(X_USER_ROLES), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_strips_hop_by_hop() {
        let headers = outbound_headers(
            &incoming(&[
                ("connection", "keep-alive, x-secret"),
                ("keep-alive", "timeout=5"),
                ("host", "gateway.local"),
                ("transfer-encoding", "chunked"),
                ("x-secret", "1"),
                ("accept", "application/json"),
            ]),
            None,
            "api-gateway",
            false,
        );

        assert!(headers.get("connection").is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get("host").is_none());
        assert!(headers.get("transfer-encoding").is_none());
        assert!(headers.get("x-secret").is_none());
        assert_eq!(headers.get("accept").unwrap(), "application/json");
        assert_eq!(headers.get(X_FORWARDED_BY).unwrap(), "api-gateway");
    }

    #[test]
    fn test_request_id_kept_or_generated() {
        let kept = outbound_headers(&incoming(&[("x-request-id", "abc")]), None, "gw", false);
        assert_eq!(request_id(&kept), Some("abc"));

        let generated = outbound_headers(&HeaderMap::new(), None, "gw", false);
        let id = request_id(&generated).unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn test_identity_headers_come_from_caller() {
        let caller = CallerIdentity {
            user_id: Some("u-1".into()),
            email: Some("a@example.com".into()),
            roles: vec!["admin".into(), "user".into()],
        };
        let headers = outbound_headers(
            &incoming(&[("x-user-id", "spoofed")]),
            Some(&caller),
            "gw",
            false,
        );
        assert_eq!(headers.get(X_USER_ID).unwrap(), "u-1");
        assert_eq!(headers.get(X_USER_EMAIL).unwrap(), "a@example.com");
        assert_eq!(headers.get(X_USER_ROLES).unwrap(), r#"["admin","user"]"#);

        let anonymous = outbound_headers(&incoming(&[("x-user-id", "spoofed")]), None, "gw", false);
        assert!(anonymous.get(X_USER_ID).is_none());
    }

    #[test]
    fn test_default_content_type_only_with_body() {
        let with_body = outbound_headers(&HeaderMap::new(), None, "gw", true);
        assert_eq!(with_body.get(header::CONTENT_TYPE).unwrap(), "application/json");

        let explicit = outbound_headers(&incoming(&[("content-type", "text/plain")]), None, "gw", true);
        assert_eq!(explicit.get(header::CONTENT_TYPE).unwrap(), "text/plain");

        let without = outbound_headers(&HeaderMap::new(), None, "gw", false);
        assert!(without.get(header::CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_response_allow_list() {
        let upstream = incoming(&[
            ("content-type", "application/json"),
            ("etag", "\"v1\""),
            ("set-cookie", "session=1"),
            ("server", "nginx"),
        ]);
        let headers = sanitize_response_headers(&upstream, "cart", Duration::from_millis(42));

        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        assert_eq!(headers.get("etag").unwrap(), "\"v1\"");
        assert!(headers.get("set-cookie").is_none());
        assert!(headers.get("server").is_none());
        assert_eq!(headers.get(X_GATEWAY_SERVICE).unwrap(), "cart");
        assert_eq!(headers.get(X_RESPONSE_TIME).unwrap(), "42ms");
    }
}

//! Inbound request handling.
//!
//! # Responsibilities
//! - Resolve `/api/{service}/{path}` into a service name and target path
//! - Read caller identity forwarded by the authenticating layer in front
//! - Add `X-Forwarded-For`, `X-Forwarded-Proto` and `X-Forwarded-Host`
//! - Turn the result into a `ProxyRequest`

use std::net::SocketAddr;
use axum::body::Bytes;
use axum::http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue};
use crate::proxy::headers::{X_USER_EMAIL, X_USER_ID, X_USER_ROLES};
use crate::proxy::{CallerIdentity, ProxyRequest};

pub const API_PREFIX: &str = "/api/";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Split `/api/{service}/{rest}` into `(service, "/{rest}")`.
///
/// The path stays percent-encoded as received.
pub fn split_service_path(path: &str) -> Option<(String, String)> {
    let rest = path.strip_prefix(API_PREFIX)?;
    let (service, target) = match rest.split_once('/') {
        Some((service, target)) => (service, format!("/{target}")),
        None => (rest, "/".to_string()),
    };
    if service.is_empty() {
        return None;
    }
    Some((service.to_string(), target))
}

/// Identity headers set upstream. `None` without an `X-User-ID`.
///
/// `X-User-Roles` may be a JSON array or a comma-separated list.
pub fn caller_identity(headers: &HeaderMap) -> Option<CallerIdentity> {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let user_id = text(X_USER_ID)?;
    let roles = text(X_USER_ROLES).map(parse_roles).unwrap_or_default();
    Some(CallerIdentity {
        user_id: Some(user_id),
        email: text(X_USER_EMAIL),
        roles,
    })
}

fn parse_roles(raw: String) -> Vec<String> {
    if let Ok(roles) = serde_json::from_str::<Vec<String>>(&raw) {
        return roles;
    }
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the forwarding descriptor for an inbound request.
pub fn descriptor_from_parts(
    service: &str,
    path: &str,
    parts: &Parts,
    body: Bytes,
    client: Option<SocketAddr>,
) -> ProxyRequest {
    let query = parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let mut headers = parts.headers.clone();
    add_forwarding_headers(&mut headers, client);

    let mut request = ProxyRequest::new(service, parts.method.clone(), path)
        .with_headers(headers)
        .with_query(query);
    if let Some(caller) = caller_identity(&parts.headers) {
        request = request.with_caller(caller);
    }
    if !body.is_empty() {
        request = request.with_body(body);
    }
    request
}

fn add_forwarding_headers(headers: &mut HeaderMap, client: Option<SocketAddr>) {
    if let Some(addr) = client {
        let forwarded_for = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{existing}, {}", addr.ip()),
            None => addr.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(HeaderName::from_static(X_FORWARDED_FOR), value);
        }
    }

    headers.insert(HeaderName::from_static(X_FORWARDED_PROTO), HeaderValue::from_static("http"));

    if let Some(host) = headers.get(header::HOST).cloned() {
        headers.insert(HeaderName::from_static(X_FORWARDED_HOST), host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request};

    #[test]
    fn test_split_service_path() {
        assert_eq!(
            split_service_path("/api/user-service/profile/42"),
            Some(("user-service".into(), "/profile/42".into()))
        );
        assert_eq!(split_service_path("/api/cart"), Some(("cart".into(), "/".into())));
        assert_eq!(split_service_path("/api/cart/"), Some(("cart".into(), "/".into())));
        assert_eq!(split_service_path("/api/"), None);
        assert_eq!(split_service_path("/admin/health"), None);
    }

    #[test]
    fn test_caller_identity_parsing() {
        let mut headers = HeaderMap::new();
        assert!(caller_identity(&headers).is_none());

        headers.insert("x-user-id", HeaderValue::from_static("u-7"));
        headers.insert("x-user-roles", HeaderValue::from_static(r#"["admin"]"#));
        let caller = caller_identity(&headers).unwrap();
        assert_eq!(caller.user_id.as_deref(), Some("u-7"));
        assert_eq!(caller.email, None);
        assert_eq!(caller.roles, vec!["admin".to_string()]);

        headers.insert("x-user-roles", HeaderValue::from_static("user, support"));
        assert_eq!(caller_identity(&headers).unwrap().roles, vec!["user", "support"]);
    }

    #[test]
    fn test_descriptor_from_parts() {
        let (parts, _) = Request::builder()
            .method(Method::PUT)
            .uri("/api/cart/items/7?expand=true&tag=a%20b")
            .header("host", "gateway.local")
            .header("x-forwarded-for", "10.0.0.1")
            .header("x-user-id", "u-1")
            .body(())
            .unwrap()
            .into_parts();
        let client: SocketAddr = "192.168.1.5:50000".parse().unwrap();

        let request = descriptor_from_parts("cart", "/items/7", &parts, Bytes::from_static(b"{}"), Some(client));
        assert_eq!(request.service_name, "cart");
        assert_eq!(request.path, "/items/7");
        assert_eq!(request.method, Method::PUT);
        assert_eq!(
            request.query,
            vec![("expand".to_string(), "true".to_string()), ("tag".to_string(), "a b".to_string())]
        );
        assert_eq!(request.body.as_deref(), Some(&b"{}"[..]));
        assert_eq!(request.headers.get("x-forwarded-for").unwrap(), "10.0.0.1, 192.168.1.5");
        assert_eq!(request.headers.get("x-forwarded-host").unwrap(), "gateway.local");
        assert_eq!(request.caller.unwrap().user_id.as_deref(), Some("u-1"));

        let empty = descriptor_from_parts("cart", "/", &parts, Bytes::new(), None);
        assert!(empty.body.is_none());
    }
}

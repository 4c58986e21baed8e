//! End-to-end forwarding through a running gateway.

use std::time::Duration;
use axum::http::StatusCode;
use service_gateway::health::HealthState;

mod common;

use common::TestGateway;

/// Backend that answers with the raw request it received.
async fn echo_backend() -> std::net::SocketAddr {
    common::start_programmable_backend(|request| async move { (200, request) }).await
}

#[tokio::test]
async fn test_forwarded_request_and_response_headers() {
    let backend_addr = echo_backend().await;
    let gw = TestGateway::start(common::gateway_config(&[("auth-service", backend_addr)])).await;

    let res = gw
        .client
        .get(gw.url("/api/auth-service/users/7?verbose=true&tag=a%20b"))
        .header("x-user-id", "u-42")
        .header("x-user-roles", "admin, ops")
        .header("x-custom", "kept")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let headers = res.headers().clone();
    assert_eq!(headers.get("x-gateway-service").unwrap(), "auth-service");
    assert!(headers
        .get("x-response-time")
        .unwrap()
        .to_str()
        .unwrap()
        .ends_with("ms"));
    let request_id = headers.get("x-request-id").unwrap().to_str().unwrap().to_string();
    assert!(!request_id.is_empty());

    let seen = res.text().await.unwrap().to_ascii_lowercase();
    assert!(seen.starts_with("get /users/7?"), "unexpected request line: {seen}");
    assert!(seen.contains("verbose=true"));
    assert!(seen.contains("x-forwarded-by: api-gateway"));
    assert!(seen.contains("x-custom: kept"));
    assert!(seen.contains(&format!("x-request-id: {}", request_id.to_ascii_lowercase())));
    assert!(seen.contains("x-user-id: u-42"));
    assert!(seen.contains(r#"x-user-roles: ["admin","ops"]"#));
    assert!(seen.contains("x-forwarded-for: 127.0.0.1"));

    // The handler releases its connection once the response is built.
    let instances = gw.gateway.balancer().service_instances("auth-service");
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].active_connections, 0);
}

#[tokio::test]
async fn test_incoming_request_id_is_preserved() {
    let backend_addr = echo_backend().await;
    let gw = TestGateway::start(common::gateway_config(&[("auth-service", backend_addr)])).await;

    let res = gw
        .client
        .get(gw.url("/api/auth-service"))
        .header("x-request-id", "trace-123")
        .send()
        .await
        .unwrap();

    assert_eq!(res.headers().get("x-request-id").unwrap(), "trace-123");
    let seen = res.text().await.unwrap().to_ascii_lowercase();
    assert!(seen.starts_with("get / http/1.1"));
    assert!(seen.contains("x-request-id: trace-123"));
}

#[tokio::test]
async fn test_post_body_is_forwarded() {
    let backend_addr = echo_backend().await;
    let gw = TestGateway::start(common::gateway_config(&[("order-service", backend_addr)])).await;

    let payload = r#"{"item":"book","qty":2}"#;
    let res = gw
        .client
        .post(gw.url("/api/order-service/orders"))
        .body(payload)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let seen = res.text().await.unwrap();
    let lower = seen.to_ascii_lowercase();
    assert!(lower.starts_with("post /orders http/1.1"));
    assert!(lower.contains("content-type: application/json"));
    assert!(seen.ends_with(payload));
}

#[tokio::test]
async fn test_unknown_service_is_not_found() {
    let gw = TestGateway::start(common::gateway_config(&[])).await;

    let res = gw.client.get(gw.url("/api/nowhere/x")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "service_not_found");
    assert_eq!(body["service"], "nowhere");
}

#[tokio::test]
async fn test_health_loop_marks_services() {
    let healthy_addr = common::start_mock_backend("ok").await;
    let dead_addr = common::unused_addr().await;

    let mut config = common::gateway_config(&[("up-service", healthy_addr), ("down-service", dead_addr)]);
    config.health_check.enabled = true;
    config.health_check.interval_secs = 1;
    config.health_check.timeout_ms = 500;
    let gw = TestGateway::start(config).await;
    let tasks = gw.gateway.spawn_background_tasks(&gw.shutdown);

    let registry = gw.gateway.registry().clone();
    let settled = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let up = registry.get_status("up-service").map(|s| s.state);
            let down = registry.get_status("down-service").map(|s| s.state);
            if up == Some(HealthState::Healthy) && down == Some(HealthState::Unhealthy) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(settled.is_ok(), "health loop did not classify services");

    let down = registry.get_status("down-service").unwrap();
    assert!(down.last_error.is_some());

    let res = gw.client.get(gw.url("/admin/health")).send().await.unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"]["total_services"], 2);
    assert_eq!(body["data"]["healthy_services"], 1);
    assert_eq!(body["data"]["system_health"], 50);

    gw.shutdown.trigger();
    for task in tasks {
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("background task did not stop")
            .unwrap();
    }
}

#[tokio::test]
async fn test_admin_registration_round_trip() {
    let backend_addr = common::start_mock_backend("ok").await;
    let gw = TestGateway::start(common::gateway_config(&[])).await;

    let res = gw
        .client
        .post(gw.url("/admin/services"))
        .json(&serde_json::json!({
            "name": "inventory-service",
            "base_url": format!("http://{backend_addr}"),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"]["state"], "healthy");

    let res = gw.client.get(gw.url("/api/inventory-service/stock")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "ok");

    let res = gw
        .client
        .delete(gw.url("/admin/services/inventory-service"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = gw.client.get(gw.url("/api/inventory-service/stock")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_warmup_reports_each_service() {
    let healthy_addr = common::start_mock_backend("ok").await;
    let dead_addr = common::unused_addr().await;
    let mut config = common::gateway_config(&[("up-service", healthy_addr), ("down-service", dead_addr)]);
    config.proxy.max_retries = 0;
    let gw = TestGateway::start(config).await;

    let res = gw.client.post(gw.url("/admin/warmup")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let results = body["data"].as_array().unwrap();
    assert_eq!(results.len(), 2);

    let up = results.iter().find(|r| r["service"] == "up-service").unwrap();
    assert_eq!(up["success"], true);
    assert_eq!(up["status"], 200);
    let down = results.iter().find(|r| r["service"] == "down-service").unwrap();
    assert_eq!(down["success"], false);
    assert!(down["error"].is_string());

    // Warmup releases what it selected, whether or not the call succeeded.
    for service in ["up-service", "down-service"] {
        let instances = gw.gateway.balancer().service_instances(service);
        assert_eq!(instances[0].active_connections, 0, "{service}");
    }
}

//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router: `/health`, `/api/{service}/...`, `/admin/...`
//! - Buffer the inbound body and hand a `ProxyRequest` to the gateway
//! - Release the selected instance's connection once the response is built
//! - Serve with graceful shutdown on the broadcast signal

use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use crate::admin;
use crate::gateway::Gateway;
use crate::http::request::{descriptor_from_parts, split_service_path};
use crate::http::response::{error_response, proxy_response, ErrorBody};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

/// HTTP front end of the gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let admin_enabled = gateway.config().admin.enabled;
        let router = build_router(AppState { gateway }, admin_enabled);
        Self { router }
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn build_router(state: AppState, admin_enabled: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/{service}", any(proxy_handler))
        .route("/api/{service}/{*path}", any(proxy_handler));

    if admin_enabled {
        router = router.merge(admin::router());
    }

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct LivenessBody {
    status: &'static str,
    version: &'static str,
    load_balancer_healthy: bool,
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.gateway.balancer().is_healthy();
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(LivenessBody {
            status: if healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            load_balancer_healthy: healthy,
        }),
    )
}

/// Forward `/api/{service}/...` to the named service.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let Some((service, path)) = split_service_path(request.uri().path()) else {
        return error_response(
            StatusCode::NOT_FOUND,
            ErrorBody::new("route_not_found", "Route not found", None),
        );
    };
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);

    let (parts, body) = request.into_parts();
    let limit = state.gateway.config().proxy.max_body_bytes;
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(service = %service, error = %e, "Failed to read request body");
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody::new("invalid_body", format!("Request body rejected: {e}"), Some(&service)),
            );
        }
    };

    let descriptor = descriptor_from_parts(&service, &path, &parts, body, client);
    match state.gateway.proxy_request(descriptor).await {
        Ok(response) => {
            state.gateway.release_connection(&service, &response.instance_url);
            proxy_response(response)
        }
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use tower::ServiceExt;
    use crate::config::{GatewayConfig, ServiceConfig};

    fn server(admin: bool) -> GatewayServer {
        let mut config = GatewayConfig {
            services: vec![ServiceConfig::new("auth-service", "http://127.0.0.1:9")],
            ..GatewayConfig::default()
        };
        config.admin.enabled = admin;
        GatewayServer::new(Arc::new(Gateway::new(config)))
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_service_is_404() {
        let response = server(true)
            .router()
            .oneshot(Request::get("/api/nope/x").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json(response).await;
        assert_eq!(body["error"], "service_not_found");
        assert_eq!(body["service"], "nope");
    }

    #[tokio::test]
    async fn test_liveness() {
        let response = server(true)
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_admin_routes_can_be_disabled() {
        let response = server(false)
            .router()
            .oneshot(Request::get("/admin/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

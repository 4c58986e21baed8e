//! Administrative API.
//!
//! Every route maps onto one `Gateway` operation and wraps the result in
//! `{ "success": ..., "data": ... }`. No authentication; expose it only on
//! trusted networks.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use crate::http::server::AppState;
use self::handlers::*;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/health", get(get_system_health))
        .route("/admin/config", get(get_config))
        .route("/admin/services", get(get_services).post(register_service))
        .route("/admin/services/{name}", get(get_service).delete(unregister_service))
        .route("/admin/services/{name}/health-check", post(trigger_health_check))
        .route("/admin/circuit-breakers", get(get_circuit_breakers))
        .route("/admin/circuit-breakers/{name}", get(get_circuit_breaker))
        .route("/admin/circuit-breakers/{name}/reset", post(reset_circuit_breaker))
        .route("/admin/load-balancer", get(get_load_balancer))
        .route(
            "/admin/load-balancer/{name}/instances",
            post(add_instance).delete(remove_instance),
        )
        .route("/admin/warmup", post(warmup_services))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use crate::config::validation::{validate_instance_url, validate_service_config};
use crate::config::ServiceConfig;
use crate::http::server::AppState;

/// Envelope of every admin response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(ApiResponse {
        success: true,
        data: Some(data),
        message: None,
    })
    .into_response()
}

fn done(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: true,
            data: None,
            message: Some(message),
        }),
    )
        .into_response()
}

fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            message: Some(message.into()),
        }),
    )
        .into_response()
}

fn service_not_found(name: &str) -> Response {
    fail(StatusCode::NOT_FOUND, format!("Service {name} not found"))
}

pub async fn get_system_health(State(state): State<AppState>) -> Response {
    ok(state.gateway.system_health())
}

/// Effective configuration, defaults filled in.
pub async fn get_config(State(state): State<AppState>) -> Response {
    ok(state.gateway.config())
}

pub async fn get_services(State(state): State<AppState>) -> Response {
    ok(state.gateway.services_with_status())
}

pub async fn get_service(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.gateway.service_detail(&name) {
        Some(detail) => ok(detail),
        None => service_not_found(&name),
    }
}

pub async fn register_service(
    State(state): State<AppState>,
    Json(service): Json<ServiceConfig>,
) -> Response {
    if let Err(errors) = validate_service_config(&service) {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        return fail(StatusCode::BAD_REQUEST, messages.join("; "));
    }

    let status = state.gateway.register_service(service).await;
    (
        StatusCode::CREATED,
        Json(ApiResponse {
            success: true,
            data: Some(status),
            message: None,
        }),
    )
        .into_response()
}

pub async fn unregister_service(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    if state.gateway.unregister_service(&name) {
        done(StatusCode::OK, format!("Service {name} unregistered"))
    } else {
        service_not_found(&name)
    }
}

pub async fn trigger_health_check(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.gateway.trigger_health_check(&name).await {
        Some(status) => ok(status),
        None => service_not_found(&name),
    }
}

pub async fn get_circuit_breakers(State(state): State<AppState>) -> Response {
    ok(state.gateway.circuit_breakers())
}

pub async fn get_circuit_breaker(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    ok(state.gateway.circuit_breaker(&name))
}

pub async fn reset_circuit_breaker(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    ok(state.gateway.reset_circuit_breaker(&name))
}

pub async fn get_load_balancer(State(state): State<AppState>) -> Response {
    ok(state.gateway.load_balancer_view())
}

#[derive(Debug, Deserialize)]
pub struct AddInstanceBody {
    pub url: String,
    pub weight: Option<u32>,
}

pub async fn add_instance(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<AddInstanceBody>,
) -> Response {
    if state.gateway.registry().get_service(&name).is_none() {
        return service_not_found(&name);
    }
    if let Err(error) = validate_instance_url(&name, &body.url) {
        return fail(StatusCode::BAD_REQUEST, error.to_string());
    }
    let weight = body.weight.unwrap_or(1);
    if weight == 0 {
        return fail(StatusCode::BAD_REQUEST, "weight must be greater than zero");
    }

    state.gateway.add_instance(&name, &body.url, weight);
    done(StatusCode::CREATED, format!("Instance added for {name}"))
}

#[derive(Debug, Deserialize)]
pub struct RemoveInstanceQuery {
    pub url: String,
}

pub async fn remove_instance(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<RemoveInstanceQuery>,
) -> Response {
    state.gateway.remove_instance(&name, &query.url);
    done(StatusCode::OK, format!("Instance removed for {name}"))
}

pub async fn warmup_services(State(state): State<AppState>) -> Response {
    ok(state.gateway.warmup().await)
}

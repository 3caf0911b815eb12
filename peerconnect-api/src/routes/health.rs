use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::RunQueryDsl;
use peerconnect_shared::{HealthCheck, HealthResponse, HealthStatus};
use std::sync::Arc;

use crate::AppState;

fn database_check(state: &AppState) -> HealthCheck {
    let Some(pool) = &state.db else {
        return HealthCheck::degraded("database", "no database pool configured");
    };
    match pool.get() {
        Ok(mut conn) => match diesel::sql_query("SELECT 1").execute(&mut conn) {
            Ok(_) => HealthCheck::passed("database"),
            Err(e) => HealthCheck::failed("database", e.to_string()),
        },
        Err(e) => HealthCheck::failed("database", e.to_string()),
    }
}

fn rabbitmq_check(state: &AppState) -> HealthCheck {
    match state.events.client() {
        Some(client) if client.is_connected() => HealthCheck::passed("rabbitmq"),
        Some(_) => HealthCheck::failed("rabbitmq", "channel is not connected"),
        None => HealthCheck::degraded("rabbitmq", "event publishing disabled"),
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let response = HealthResponse::healthy("peerconnect-api", env!("CARGO_PKG_VERSION"))
        .check(database_check(&state))
        .check(rabbitmq_check(&state));

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

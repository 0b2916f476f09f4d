use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod events;
pub mod feedback;
pub mod payments;
pub mod tickets;
pub mod venues;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "eventease-api",
    };

    success(payload, "Health check successful").into_response()
}

pub async fn route_not_found() -> Response {
    AppError::NotFound("No route matches this path".to_string()).into_response()
}

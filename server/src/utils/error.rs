use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::scheduling::SchedulingError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Scheduling(e) => match e {
                SchedulingError::Validation(_) | SchedulingError::InvalidRange { .. } => {
                    StatusCode::BAD_REQUEST
                }
                SchedulingError::NotFound(_) => StatusCode::NOT_FOUND,
                SchedulingError::Overlap { .. }
                | SchedulingError::AlreadyConfirmed(_)
                | SchedulingError::AlreadyCancelled(_)
                | SchedulingError::InUse(_) => StatusCode::CONFLICT,
                SchedulingError::InvalidOrganizer(_) | SchedulingError::Ineligible(_) => {
                    StatusCode::FORBIDDEN
                }
                SchedulingError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                SchedulingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Scheduling(e) => match e {
                SchedulingError::Validation(_) | SchedulingError::InvalidRange { .. } => {
                    "VALIDATION_ERROR"
                }
                SchedulingError::NotFound(_) => "NOT_FOUND",
                SchedulingError::Overlap { .. } => "OVERLAP",
                SchedulingError::InvalidOrganizer(_) => "INVALID_ORGANIZER",
                SchedulingError::AlreadyConfirmed(_) => "ALREADY_CONFIRMED",
                SchedulingError::AlreadyCancelled(_) => "ALREADY_CANCELLED",
                SchedulingError::Ineligible(_) => "INELIGIBLE",
                SchedulingError::InUse(_) => "IN_USE",
                SchedulingError::Unavailable(_) => "SERVICE_UNAVAILABLE",
                SchedulingError::Internal(_) => "INTERNAL_SERVER_ERROR",
            },
        }
    }

    fn log(&self) {
        match self {
            AppError::Scheduling(SchedulingError::Internal(msg)) => {
                error!(message = %msg, "Internal error");
            }
            AppError::Scheduling(SchedulingError::Unavailable(msg)) => {
                error!(message = %msg, "Dependency unavailable");
            }
            other => {
                warn!(code = other.code(), message = %other, "Request rejected");
            }
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Scheduling(SchedulingError::Overlap {
                venue_id,
                conflicting_event,
            }) => Some(json!({
                "venue_id": venue_id,
                "conflicting_event": conflicting_event,
            })),
            AppError::Scheduling(SchedulingError::InvalidRange { start, end }) => {
                Some(json!({ "start_time": start, "end_time": end }))
            }
            AppError::Scheduling(SchedulingError::Unavailable(_)) => {
                Some(json!({ "retryable": true }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Storage internals stay in the logs
        let public_message = match &self {
            AppError::Scheduling(SchedulingError::Internal(_)) => {
                "An internal error occurred".to_string()
            }
            AppError::Scheduling(SchedulingError::Unavailable(_)) => {
                "Service temporarily unavailable, please retry".to_string()
            }
            other => other.to_string(),
        };

        error_response(code, public_message, self.details(), status)
    }
}

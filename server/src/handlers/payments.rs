use axum::extract::State;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::models::UserRole;
use crate::routes::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{Actor, ApiPath};
use crate::utils::response::{created, success};

pub async fn pay_venue_fee(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    actor.require(&[UserRole::Organizer])?;
    let payment = state
        .engine
        .payments
        .record_venue_payment(event_id, &actor.payer())
        .await?;
    Ok(created(payment, "Venue fee recorded").into_response())
}

pub async fn pay_ticket_fee(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    actor.require(&[UserRole::RegisteredUser])?;
    let receipt = state
        .engine
        .payments
        .record_ticket_payment(ticket_id, &actor.payer())
        .await?;
    Ok(created(receipt, "Ticket fee recorded, ticket confirmed").into_response())
}

pub async fn event_payments(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    actor.require(&[UserRole::Organizer, UserRole::Admin, UserRole::SuperAdmin])?;
    let payments = state.engine.payments.history_for_event(event_id).await?;
    Ok(success(payments, "Payments retrieved successfully").into_response())
}

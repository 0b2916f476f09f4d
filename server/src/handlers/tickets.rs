use axum::extract::State;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::models::{BookTicket, UserRole};
use crate::routes::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{Actor, ApiJson, ApiPath};
use crate::utils::response::{created, success};

const TICKET_HOLDERS: &[UserRole] = &[UserRole::RegisteredUser];

pub async fn book_ticket(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(request): ApiJson<BookTicket>,
) -> Result<Response, AppError> {
    actor.require(TICKET_HOLDERS)?;
    let ticket = state.engine.tickets.book(actor.user_id, request).await?;
    Ok(created(ticket, "Ticket booked, awaiting payment").into_response())
}

pub async fn my_tickets(State(state): State<AppState>, actor: Actor) -> Result<Response, AppError> {
    actor.require(TICKET_HOLDERS)?;
    let tickets = state.engine.tickets.list_for_holder(actor.user_id).await?;
    Ok(success(tickets, "Tickets retrieved successfully").into_response())
}

pub async fn get_ticket(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    actor.require(TICKET_HOLDERS)?;
    let ticket = state.engine.tickets.get(ticket_id, actor.user_id).await?;
    Ok(success(ticket, "Ticket retrieved successfully").into_response())
}

pub async fn cancel_ticket(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    actor.require(TICKET_HOLDERS)?;
    let ticket = state.engine.tickets.cancel(ticket_id, actor.user_id).await?;
    Ok(success(ticket, "Ticket cancelled successfully").into_response())
}

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::models::{EventChanges, EventFilter, NewEvent, UserRole};
use crate::routes::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{Actor, ApiJson, ApiPath, ApiQuery};
use crate::utils::response::{created, empty_success, success};

const EVENT_EDITORS: &[UserRole] = &[UserRole::Organizer, UserRole::Admin, UserRole::SuperAdmin];

pub async fn list_events(
    State(state): State<AppState>,
    _actor: Actor,
    ApiQuery(filter): ApiQuery<EventFilter>,
) -> Result<Response, AppError> {
    let events = state.engine.events.list_events(filter).await?;
    Ok(success(events, "Events retrieved successfully").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    _actor: Actor,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let event = state.engine.events.get_event(event_id).await?;
    Ok(success(event, "Event retrieved successfully").into_response())
}

/// The calling organizer becomes the event's organizer.
pub async fn create_event(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(request): ApiJson<NewEvent>,
) -> Result<Response, AppError> {
    actor.require(&[UserRole::Organizer])?;
    let scheduled = state
        .engine
        .events
        .create_event(actor.user_id, request)
        .await?;
    Ok(created(scheduled, "Event scheduled successfully").into_response())
}

pub async fn update_event(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<EventChanges>,
) -> Result<Response, AppError> {
    actor.require(EVENT_EDITORS)?;
    let scheduled = state.engine.events.update_event(event_id, changes).await?;
    Ok(success(scheduled, "Event updated successfully").into_response())
}

pub async fn delete_event(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    actor.require(EVENT_EDITORS)?;
    state.engine.events.delete_event(event_id).await?;
    Ok(empty_success("Event deleted successfully").into_response())
}

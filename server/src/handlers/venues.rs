use axum::extract::State;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{NewVenue, UserRole, VenueChanges};
use crate::routes::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{Actor, ApiJson, ApiPath, ApiQuery};
use crate::utils::response::{created, empty_success, success};

const VENUE_ADMINS: &[UserRole] = &[UserRole::SuperAdmin];

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub exclude: Option<Uuid>,
}

pub async fn list_venues(State(state): State<AppState>, actor: Actor) -> Result<Response, AppError> {
    actor.require(VENUE_ADMINS)?;
    let venues = state.engine.venues.list().await?;
    Ok(success(venues, "Venues retrieved successfully").into_response())
}

pub async fn get_venue(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(venue_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    actor.require(VENUE_ADMINS)?;
    let details = state.engine.venues.get(venue_id).await?;
    Ok(success(details, "Venue retrieved successfully").into_response())
}

pub async fn create_venue(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(request): ApiJson<NewVenue>,
) -> Result<Response, AppError> {
    actor.require(VENUE_ADMINS)?;
    let venue = state.engine.venues.create(request).await?;
    Ok(created(venue, "Venue created successfully").into_response())
}

pub async fn update_venue(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(venue_id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<VenueChanges>,
) -> Result<Response, AppError> {
    actor.require(VENUE_ADMINS)?;
    let venue = state.engine.venues.update(venue_id, changes).await?;
    Ok(success(venue, "Venue updated successfully").into_response())
}

pub async fn delete_venue(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(venue_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    actor.require(VENUE_ADMINS)?;
    state.engine.venues.delete(venue_id).await?;
    Ok(empty_success("Venue deleted successfully").into_response())
}

pub async fn venue_availability(
    State(state): State<AppState>,
    _actor: Actor,
    ApiPath(venue_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> Result<Response, AppError> {
    let availability = state
        .engine
        .events
        .check_availability(venue_id, query.start, query.end, query.exclude)
        .await?;
    Ok(success(availability, "Availability checked").into_response())
}

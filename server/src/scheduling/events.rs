use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::error::{SchedulingError, SchedulingResult};
use super::fees;
use super::notify::Notification;
use super::overlap::TimeWindow;
use super::Context;
use crate::models::{
    Event, EventChanges, EventFilter, NewEvent, ScheduledEvent, Venue,
};

const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub venue_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub available: bool,
    pub conflicting_event: Option<Uuid>,
}

fn validate_title(title: &str) -> SchedulingResult<()> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(SchedulingError::Validation("title is required".to_string()));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(SchedulingError::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> SchedulingResult<()> {
    fees::validate_amount("price per ticket", price)
}

/// Creates, edits and removes events while keeping each venue's calendar
/// free of overlapping bookings.
#[derive(Clone)]
pub struct EventCoordinator {
    ctx: Context,
}

impl EventCoordinator {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, request), fields(venue_id = %request.venue_id))]
    pub async fn create_event(
        &self,
        organizer_id: Uuid,
        request: NewEvent,
    ) -> SchedulingResult<ScheduledEvent> {
        validate_title(&request.title)?;
        validate_price(request.price_per_ticket)?;
        let window = TimeWindow::new(request.start_time, request.end_time)?;

        let organizer = self
            .ctx
            .guarded(self.ctx.directory().user(organizer_id))
            .await?;
        if !organizer.as_ref().is_some_and(|u| u.is_organizer()) {
            return Err(SchedulingError::InvalidOrganizer(organizer_id));
        }

        let venue = self.load_venue(request.venue_id).await?;
        let venue_fee = fees::venue_fee(venue.fee_per_day, window.start, window.end)?;

        let now = self.ctx.now();
        let event = Event {
            id: Uuid::new_v4(),
            title: request.title.trim().to_string(),
            description: request.description,
            venue_id: venue.id,
            organizer_id,
            start_time: window.start,
            end_time: window.end,
            price_per_ticket: request.price_per_ticket,
            created_at: now,
            updated_at: now,
        };

        let event = match self.ctx.guarded(self.ctx.store().insert_event(event)).await {
            Ok(event) => event,
            Err(e @ SchedulingError::Overlap { .. }) => {
                warn!(error = %e, "Event rejected, venue already booked");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        info!(event_id = %event.id, %venue_fee, "Event scheduled");

        self.ctx
            .notify(Notification::EventCreated {
                organizer_id,
                event_id: event.id,
                title: event.title.clone(),
                venue_name: venue.name,
                start_time: event.start_time,
                end_time: event.end_time,
            })
            .await;

        Ok(ScheduledEvent { event, venue_fee })
    }

    #[instrument(skip(self, changes))]
    pub async fn update_event(
        &self,
        event_id: Uuid,
        changes: EventChanges,
    ) -> SchedulingResult<ScheduledEvent> {
        if changes.is_empty() {
            return Err(SchedulingError::Validation(
                "no fields to update".to_string(),
            ));
        }
        if let Some(title) = &changes.title {
            validate_title(title)?;
        }
        if let Some(price) = changes.price_per_ticket {
            validate_price(price)?;
        }
        if let (Some(start), Some(end)) = (changes.start_time, changes.end_time) {
            TimeWindow::new(start, end)?;
        }

        let mut event = self.load_event(event_id).await?;
        if let Some(title) = changes.title {
            event.title = title.trim().to_string();
        }
        if let Some(description) = changes.description {
            event.description = Some(description);
        }
        if let Some(start) = changes.start_time {
            event.start_time = start;
        }
        if let Some(end) = changes.end_time {
            event.end_time = end;
        }
        if let Some(venue_id) = changes.venue_id {
            event.venue_id = venue_id;
        }
        if let Some(price) = changes.price_per_ticket {
            event.price_per_ticket = price;
        }
        let window = TimeWindow::new(event.start_time, event.end_time)?;

        let venue = self.load_venue(event.venue_id).await?;
        let venue_fee = fees::venue_fee(venue.fee_per_day, window.start, window.end)?;
        event.updated_at = self.ctx.now();

        let event = self.ctx.guarded(self.ctx.store().update_event(event)).await?;
        info!(event_id = %event.id, "Event updated");

        Ok(ScheduledEvent { event, venue_fee })
    }

    #[instrument(skip(self))]
    pub async fn delete_event(&self, event_id: Uuid) -> SchedulingResult<()> {
        self.ctx
            .guarded(self.ctx.store().delete_event(event_id))
            .await?;
        info!(%event_id, "Event deleted");
        Ok(())
    }

    pub async fn get_event(&self, event_id: Uuid) -> SchedulingResult<Event> {
        self.load_event(event_id).await
    }

    pub async fn list_events(&self, filter: EventFilter) -> SchedulingResult<Vec<Event>> {
        self.ctx.guarded(self.ctx.store().events(&filter)).await
    }

    /// Read-only form of the overlap check, for callers picking a slot.
    pub async fn check_availability(
        &self,
        venue_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> SchedulingResult<Availability> {
        let window = TimeWindow::new(start, end)?;
        self.load_venue(venue_id).await?;
        let conflict = self
            .ctx
            .guarded(self.ctx.store().find_conflict(venue_id, window, exclude))
            .await?;
        Ok(Availability {
            venue_id,
            start_time: start,
            end_time: end,
            available: conflict.is_none(),
            conflicting_event: conflict,
        })
    }

    async fn load_event(&self, event_id: Uuid) -> SchedulingResult<Event> {
        self.ctx
            .guarded(self.ctx.store().event(event_id))
            .await?
            .ok_or_else(|| SchedulingError::not_found("Event", event_id))
    }

    async fn load_venue(&self, venue_id: Uuid) -> SchedulingResult<Venue> {
        self.ctx
            .guarded(self.ctx.store().venue(venue_id))
            .await?
            .ok_or_else(|| SchedulingError::not_found("Venue", venue_id))
    }
}

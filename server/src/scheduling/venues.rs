use tracing::info;
use uuid::Uuid;

use super::error::{SchedulingError, SchedulingResult};
use super::fees;
use super::Context;
use crate::models::{EventFilter, NewVenue, Venue, VenueChanges, VenueDetails};

fn require(field: &str, value: &str) -> SchedulingResult<()> {
    if value.trim().is_empty() {
        return Err(SchedulingError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate(venue: &Venue) -> SchedulingResult<()> {
    require("name", &venue.name)?;
    require("address", &venue.address)?;
    require("city", &venue.city)?;
    require("state", &venue.state)?;
    fees::validate_amount("fee per day", venue.fee_per_day)
}

/// Venue administration. A fee change only affects fees computed after it;
/// ledger rows keep the amount they were written with.
#[derive(Clone)]
pub struct VenueRegistry {
    ctx: Context,
}

impl VenueRegistry {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, request: NewVenue) -> SchedulingResult<Venue> {
        let now = self.ctx.now();
        let venue = Venue {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            address: request.address.trim().to_string(),
            city: request.city.trim().to_string(),
            state: request.state.trim().to_string(),
            zip_code: request.zip_code,
            fee_per_day: request.fee_per_day,
            created_at: now,
            updated_at: now,
        };
        validate(&venue)?;

        let venue = self.ctx.guarded(self.ctx.store().insert_venue(venue)).await?;
        info!(venue_id = %venue.id, fee_per_day = %venue.fee_per_day, "Venue registered");
        Ok(venue)
    }

    pub async fn list(&self) -> SchedulingResult<Vec<Venue>> {
        self.ctx.guarded(self.ctx.store().venues()).await
    }

    pub async fn get(&self, venue_id: Uuid) -> SchedulingResult<VenueDetails> {
        let venue = self.load(venue_id).await?;
        let filter = EventFilter {
            venue_id: Some(venue_id),
        };
        let events = self.ctx.guarded(self.ctx.store().events(&filter)).await?;
        Ok(VenueDetails { venue, events })
    }

    pub async fn update(&self, venue_id: Uuid, changes: VenueChanges) -> SchedulingResult<Venue> {
        if let Some(fee) = changes.fee_per_day {
            fees::validate_amount("fee per day", fee)?;
        }

        let mut venue = self.load(venue_id).await?;
        if let Some(name) = changes.name {
            venue.name = name.trim().to_string();
        }
        if let Some(address) = changes.address {
            venue.address = address.trim().to_string();
        }
        if let Some(city) = changes.city {
            venue.city = city.trim().to_string();
        }
        if let Some(state) = changes.state {
            venue.state = state.trim().to_string();
        }
        if changes.zip_code.is_some() {
            venue.zip_code = changes.zip_code;
        }
        if let Some(fee) = changes.fee_per_day {
            venue.fee_per_day = fee;
        }
        validate(&venue)?;
        venue.updated_at = self.ctx.now();

        let venue = self.ctx.guarded(self.ctx.store().update_venue(venue)).await?;
        info!(venue_id = %venue.id, "Venue updated");
        Ok(venue)
    }

    pub async fn delete(&self, venue_id: Uuid) -> SchedulingResult<()> {
        self.ctx
            .guarded(self.ctx.store().delete_venue(venue_id))
            .await?;
        info!(%venue_id, "Venue removed");
        Ok(())
    }

    async fn load(&self, venue_id: Uuid) -> SchedulingResult<Venue> {
        self.ctx
            .guarded(self.ctx.store().venue(venue_id))
            .await?
            .ok_or_else(|| SchedulingError::not_found("Venue", venue_id))
    }
}

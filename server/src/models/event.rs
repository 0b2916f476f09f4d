use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::scheduling::overlap::TimeWindow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub venue_id: Uuid,
    pub organizer_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price_per_ticket: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new_unchecked(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub venue_id: Uuid,
    pub price_per_ticket: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub venue_id: Option<Uuid>,
    pub price_per_ticket: Option<Decimal>,
}

impl EventChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.venue_id.is_none()
            && self.price_per_ticket.is_none()
    }
}

/// An event together with the venue fee its current slot would cost.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledEvent {
    #[serde(flatten)]
    pub event: Event,
    pub venue_fee: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub venue_id: Option<Uuid>,
}

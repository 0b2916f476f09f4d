use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub type SchedulingResult<T> = Result<T, SchedulingError>;

/// Failure kinds surfaced by the scheduling engine.
///
/// `Overlap`, `AlreadyConfirmed` and `AlreadyCancelled` are terminal for the
/// request: the caller has to re-derive its input before trying again. Only
/// `Unavailable` is safe to retry as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid range: end {end} is before start {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Venue {venue_id} is already booked by event {conflicting_event} in that window")]
    Overlap {
        venue_id: Uuid,
        conflicting_event: Uuid,
    },

    #[error("User {0} is not an organizer")]
    InvalidOrganizer(Uuid),

    #[error("Ticket {0} is already confirmed")]
    AlreadyConfirmed(Uuid),

    #[error("Ticket {0} is already cancelled")]
    AlreadyCancelled(Uuid),

    #[error("Feedback not allowed: {0}")]
    Ineligible(String),

    #[error("Still in use: {0}")]
    InUse(String),

    #[error("Dependency unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SchedulingError {
    pub fn not_found(entity: &str, id: Uuid) -> Self {
        SchedulingError::NotFound(format!("{entity} with id '{id}' was not found"))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulingError::Unavailable(_))
    }

    /// True for malformed input, which is rejected before touching storage.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SchedulingError::Validation(_) | SchedulingError::InvalidRange { .. }
        )
    }
}

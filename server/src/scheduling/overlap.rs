use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{SchedulingError, SchedulingResult};
use crate::models::Event;

/// Half-open `[start, end)` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> SchedulingResult<Self> {
        if end < start {
            return Err(SchedulingError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// For rows already validated on the way in.
    pub(crate) fn new_unchecked(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `s1 < e2 && s2 < e1`. Touching windows (one ends where the other
    /// starts) do not overlap. A zero-length window still overlaps any
    /// window that strictly contains its instant.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// First event at `venue_id` whose window overlaps `candidate`, ignoring
/// `exclude` (the event being edited).
pub fn find_conflict<'a, I>(
    venue_id: Uuid,
    candidate: &TimeWindow,
    exclude: Option<Uuid>,
    existing: I,
) -> Option<&'a Event>
where
    I: IntoIterator<Item = &'a Event>,
{
    existing.into_iter().find(|event| {
        event.venue_id == venue_id
            && Some(event.id) != exclude
            && event.window().overlaps(candidate)
    })
}

/// Same as [`find_conflict`] but returns the `Overlap` error directly.
pub fn ensure_free<'a, I>(
    venue_id: Uuid,
    candidate: &TimeWindow,
    exclude: Option<Uuid>,
    existing: I,
) -> SchedulingResult<()>
where
    I: IntoIterator<Item = &'a Event>,
{
    match find_conflict(venue_id, candidate, exclude, existing) {
        Some(conflict) => Err(SchedulingError::Overlap {
            venue_id,
            conflicting_event: conflict.id,
        }),
        None => Ok(()),
    }
}

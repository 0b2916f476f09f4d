//! Persistence and identity collaborators.
//!
//! Operations that must be atomic (event insert/update against the venue
//! calendar, ticket cancellation, ticket settlement, feedback submission) are
//! single trait methods: each implementation runs the engine's pure rule
//! inside its own transaction or lock scope.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Event, EventFilter, Feedback, FeedbackChanges, FeedbackSummary, FeedbackView, Payment, Ticket,
    TicketReceipt, TicketSettlement, TicketSummary, User, Venue,
};
use crate::scheduling::{SchedulingResult, TimeWindow};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Resolves user ids to role-tagged records.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn user(&self, id: Uuid) -> SchedulingResult<Option<User>>;
}

#[async_trait]
pub trait VenueStore: Send + Sync {
    async fn insert_venue(&self, venue: Venue) -> SchedulingResult<Venue>;
    async fn venue(&self, id: Uuid) -> SchedulingResult<Option<Venue>>;
    async fn venues(&self) -> SchedulingResult<Vec<Venue>>;
    /// Fails with `NotFound` when the venue is gone.
    async fn update_venue(&self, venue: Venue) -> SchedulingResult<Venue>;
    /// Fails with `InUse` while any event references the venue.
    async fn delete_venue(&self, id: Uuid) -> SchedulingResult<()>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Checks the venue calendar and inserts in one serialized step.
    async fn insert_event(&self, event: Event) -> SchedulingResult<Event>;
    /// Same as `insert_event`, with the event's own row excluded from the check.
    async fn update_event(&self, event: Event) -> SchedulingResult<Event>;
    /// Fails with `InUse` while tickets, payments or feedback reference it.
    async fn delete_event(&self, id: Uuid) -> SchedulingResult<()>;
    async fn event(&self, id: Uuid) -> SchedulingResult<Option<Event>>;
    async fn events(&self, filter: &EventFilter) -> SchedulingResult<Vec<Event>>;
    async fn find_conflict(
        &self,
        venue_id: Uuid,
        window: TimeWindow,
        exclude: Option<Uuid>,
    ) -> SchedulingResult<Option<Uuid>>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert_ticket(&self, ticket: Ticket) -> SchedulingResult<Ticket>;
    async fn ticket(&self, id: Uuid) -> SchedulingResult<Option<Ticket>>;
    async fn tickets_for_holder(&self, holder_id: Uuid) -> SchedulingResult<Vec<TicketSummary>>;
    /// Locks the (ticket, holder) row and applies the cancel transition.
    async fn cancel_ticket(
        &self,
        ticket_id: Uuid,
        holder_id: Uuid,
        at: DateTime<Utc>,
    ) -> SchedulingResult<Ticket>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Appends a venue-fee row. The ledger has no update or delete.
    async fn append_payment(&self, payment: Payment) -> SchedulingResult<Payment>;
    /// Writes the ticket-fee row and confirms the ticket, or does neither.
    async fn settle_ticket(&self, settlement: TicketSettlement) -> SchedulingResult<TicketReceipt>;
    /// Venue-fee rows of the event plus ticket-fee rows of its tickets.
    async fn payments_for_event(&self, event_id: Uuid) -> SchedulingResult<Vec<Payment>>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Re-runs the eligibility gate against the locked ticket before inserting.
    async fn insert_feedback(&self, feedback: Feedback) -> SchedulingResult<Feedback>;
    async fn update_feedback(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: &FeedbackChanges,
        at: DateTime<Utc>,
    ) -> SchedulingResult<Feedback>;
    async fn delete_feedback(&self, id: Uuid) -> SchedulingResult<()>;
    async fn feedback(&self, id: Uuid) -> SchedulingResult<Option<FeedbackView>>;
    async fn feedback_list(&self, author_id: Option<Uuid>) -> SchedulingResult<Vec<FeedbackView>>;
    async fn feedback_summary(&self) -> SchedulingResult<Vec<FeedbackSummary>>;
}

pub trait Store: VenueStore + EventStore + TicketStore + PaymentStore + FeedbackStore {}

impl<T> Store for T where T: VenueStore + EventStore + TicketStore + PaymentStore + FeedbackStore {}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Directory, EventStore, FeedbackStore, PaymentStore, TicketStore, VenueStore};
use crate::models::{
    Event, EventFilter, Feedback, FeedbackChanges, FeedbackSummary, FeedbackView, Payment,
    PaymentKind, SeedUser, Ticket, TicketReceipt, TicketSettlement, TicketSummary, User, Venue,
};
use crate::scheduling::{feedback, overlap, payments, tickets};
use crate::scheduling::{SchedulingError, SchedulingResult, TimeWindow};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    venues: HashMap<Uuid, Venue>,
    events: HashMap<Uuid, Event>,
    tickets: HashMap<Uuid, Ticket>,
    payments: Vec<Payment>,
    feedback: HashMap<Uuid, Feedback>,
}

impl Tables {
    fn event_title(&self, event_id: Uuid) -> String {
        self.events
            .get(&event_id)
            .map(|e| e.title.clone())
            .unwrap_or_default()
    }

    fn feedback_view(&self, f: &Feedback) -> FeedbackView {
        FeedbackView {
            id: f.id,
            event_id: f.event_id,
            event_title: self.event_title(f.event_id),
            ticket_id: f.ticket_id,
            author_id: f.author_id,
            rating: f.rating,
            comment: f.comment.clone(),
            submitted_at: f.submitted_at,
            updated_at: f.updated_at,
        }
    }

    fn check_calendar(&self, event: &Event, exclude: Option<Uuid>) -> SchedulingResult<()> {
        if !self.venues.contains_key(&event.venue_id) {
            return Err(SchedulingError::not_found("Venue", event.venue_id));
        }
        let window = TimeWindow::new(event.start_time, event.end_time)?;
        overlap::ensure_free(event.venue_id, &window, exclude, self.events.values())
    }
}

/// Process-local store. Every operation holds one async mutex for its whole
/// duration, so check-then-write sequences are serialized.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    /// Loads a JSON array of `{ id, name, email, role }` entries into the
    /// directory, replacing users with the same id. Returns how many were read.
    pub async fn seed_users_json(
        &self,
        json: &str,
        at: DateTime<Utc>,
    ) -> Result<usize, serde_json::Error> {
        let seeds: Vec<SeedUser> = serde_json::from_str(json)?;
        let count = seeds.len();
        let mut tables = self.tables.lock().await;
        for seed in seeds {
            let user = seed.into_user(at);
            tables.users.insert(user.id, user);
        }
        Ok(count)
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn user(&self, id: Uuid) -> SchedulingResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl VenueStore for MemoryStore {
    async fn insert_venue(&self, venue: Venue) -> SchedulingResult<Venue> {
        let mut tables = self.tables.lock().await;
        tables.venues.insert(venue.id, venue.clone());
        Ok(venue)
    }

    async fn venue(&self, id: Uuid) -> SchedulingResult<Option<Venue>> {
        Ok(self.tables.lock().await.venues.get(&id).cloned())
    }

    async fn venues(&self) -> SchedulingResult<Vec<Venue>> {
        let tables = self.tables.lock().await;
        let mut venues: Vec<Venue> = tables.venues.values().cloned().collect();
        venues.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(venues)
    }

    async fn update_venue(&self, venue: Venue) -> SchedulingResult<Venue> {
        let mut tables = self.tables.lock().await;
        let slot = tables
            .venues
            .get_mut(&venue.id)
            .ok_or_else(|| SchedulingError::not_found("Venue", venue.id))?;
        *slot = venue.clone();
        Ok(venue)
    }

    async fn delete_venue(&self, id: Uuid) -> SchedulingResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.venues.contains_key(&id) {
            return Err(SchedulingError::not_found("Venue", id));
        }
        if tables.events.values().any(|e| e.venue_id == id) {
            return Err(SchedulingError::InUse(format!(
                "venue {id} still has scheduled events"
            )));
        }
        tables.venues.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_event(&self, event: Event) -> SchedulingResult<Event> {
        let mut tables = self.tables.lock().await;
        tables.check_calendar(&event, None)?;
        tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update_event(&self, event: Event) -> SchedulingResult<Event> {
        let mut tables = self.tables.lock().await;
        if !tables.events.contains_key(&event.id) {
            return Err(SchedulingError::not_found("Event", event.id));
        }
        tables.check_calendar(&event, Some(event.id))?;
        tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn delete_event(&self, id: Uuid) -> SchedulingResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.events.contains_key(&id) {
            return Err(SchedulingError::not_found("Event", id));
        }
        let referenced = tables.tickets.values().any(|t| t.event_id == id)
            || tables.feedback.values().any(|f| f.event_id == id)
            || tables.payments.iter().any(|p| p.event_id == Some(id));
        if referenced {
            return Err(SchedulingError::InUse(format!(
                "event {id} has tickets, payments or feedback"
            )));
        }
        tables.events.remove(&id);
        Ok(())
    }

    async fn event(&self, id: Uuid) -> SchedulingResult<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn events(&self, filter: &EventFilter) -> SchedulingResult<Vec<Event>> {
        let tables = self.tables.lock().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| filter.venue_id.map_or(true, |v| e.venue_id == v))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn find_conflict(
        &self,
        venue_id: Uuid,
        window: TimeWindow,
        exclude: Option<Uuid>,
    ) -> SchedulingResult<Option<Uuid>> {
        let tables = self.tables.lock().await;
        Ok(overlap::find_conflict(venue_id, &window, exclude, tables.events.values()).map(|e| e.id))
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn insert_ticket(&self, ticket: Ticket) -> SchedulingResult<Ticket> {
        let mut tables = self.tables.lock().await;
        if !tables.events.contains_key(&ticket.event_id) {
            return Err(SchedulingError::not_found("Event", ticket.event_id));
        }
        tables.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn ticket(&self, id: Uuid) -> SchedulingResult<Option<Ticket>> {
        Ok(self.tables.lock().await.tickets.get(&id).cloned())
    }

    async fn tickets_for_holder(&self, holder_id: Uuid) -> SchedulingResult<Vec<TicketSummary>> {
        let tables = self.tables.lock().await;
        let mut summaries: Vec<TicketSummary> = tables
            .tickets
            .values()
            .filter(|t| t.holder_id == holder_id)
            .map(|t| TicketSummary {
                id: t.id,
                event_id: t.event_id,
                event_title: tables.event_title(t.event_id),
                quantity: t.quantity,
                status: t.status,
                booked_at: t.booked_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.booked_at.cmp(&b.booked_at).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    async fn cancel_ticket(
        &self,
        ticket_id: Uuid,
        holder_id: Uuid,
        at: DateTime<Utc>,
    ) -> SchedulingResult<Ticket> {
        let mut tables = self.tables.lock().await;
        let ticket = tables
            .tickets
            .get_mut(&ticket_id)
            .filter(|t| t.holder_id == holder_id)
            .ok_or_else(|| SchedulingError::not_found("Ticket", ticket_id))?;
        tickets::cancel(ticket, at)?;
        Ok(ticket.clone())
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn append_payment(&self, payment: Payment) -> SchedulingResult<Payment> {
        let mut tables = self.tables.lock().await;
        if let Some(event_id) = payment.event_id {
            if !tables.events.contains_key(&event_id) {
                return Err(SchedulingError::not_found("Event", event_id));
            }
        }
        tables.payments.push(payment.clone());
        Ok(payment)
    }

    async fn settle_ticket(&self, settlement: TicketSettlement) -> SchedulingResult<TicketReceipt> {
        let mut tables = self.tables.lock().await;
        let mut ticket = tables
            .tickets
            .get(&settlement.ticket_id)
            .cloned()
            .ok_or_else(|| SchedulingError::not_found("Ticket", settlement.ticket_id))?;
        let event = tables
            .events
            .get(&ticket.event_id)
            .ok_or_else(|| SchedulingError::not_found("Event", ticket.event_id))?;

        // Work on a copy; nothing is written unless both halves succeed.
        let payment = payments::settle(&mut ticket, event, &settlement)?;
        tables.payments.push(payment.clone());
        tables.tickets.insert(ticket.id, ticket.clone());
        Ok(TicketReceipt { payment, ticket })
    }

    async fn payments_for_event(&self, event_id: Uuid) -> SchedulingResult<Vec<Payment>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Payment> = tables
            .payments
            .iter()
            .filter(|p| match p.kind {
                PaymentKind::VenueFee => p.event_id == Some(event_id),
                PaymentKind::TicketFee => p
                    .ticket_id
                    .and_then(|id| tables.tickets.get(&id))
                    .is_some_and(|t| t.event_id == event_id),
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.paid_at.cmp(&b.paid_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn insert_feedback(&self, entry: Feedback) -> SchedulingResult<Feedback> {
        let mut tables = self.tables.lock().await;
        feedback::check_eligibility(tables.tickets.get(&entry.ticket_id), &entry)?;
        tables.feedback.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn update_feedback(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: &FeedbackChanges,
        at: DateTime<Utc>,
    ) -> SchedulingResult<Feedback> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .feedback
            .get_mut(&id)
            .filter(|f| f.author_id == author_id)
            .ok_or_else(|| SchedulingError::not_found("Feedback", id))?;
        entry.rating = changes.rating;
        entry.comment = changes.comment.clone();
        entry.updated_at = at;
        Ok(entry.clone())
    }

    async fn delete_feedback(&self, id: Uuid) -> SchedulingResult<()> {
        self.tables
            .lock()
            .await
            .feedback
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| SchedulingError::not_found("Feedback", id))
    }

    async fn feedback(&self, id: Uuid) -> SchedulingResult<Option<FeedbackView>> {
        let tables = self.tables.lock().await;
        Ok(tables.feedback.get(&id).map(|f| tables.feedback_view(f)))
    }

    async fn feedback_list(&self, author_id: Option<Uuid>) -> SchedulingResult<Vec<FeedbackView>> {
        let tables = self.tables.lock().await;
        let mut views: Vec<FeedbackView> = tables
            .feedback
            .values()
            .filter(|f| author_id.map_or(true, |a| f.author_id == a))
            .map(|f| tables.feedback_view(f))
            .collect();
        views.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        Ok(views)
    }

    async fn feedback_summary(&self) -> SchedulingResult<Vec<FeedbackSummary>> {
        let tables = self.tables.lock().await;
        let mut totals: HashMap<Uuid, (i64, i64)> = HashMap::new();
        for f in tables.feedback.values() {
            let entry = totals.entry(f.event_id).or_insert((0, 0));
            entry.0 += i64::from(f.rating);
            entry.1 += 1;
        }
        let mut summary: Vec<FeedbackSummary> = totals
            .into_iter()
            .map(|(event_id, (sum, count))| FeedbackSummary {
                event_id,
                event_title: tables.event_title(event_id),
                average_rating: sum as f64 / count as f64,
                total_feedback: count,
            })
            .collect();
        summary.sort_by(|a, b| {
            a.event_title
                .cmp(&b.event_title)
                .then(a.event_id.cmp(&b.event_id))
        });
        Ok(summary)
    }
}

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{Directory, EventStore, FeedbackStore, PaymentStore, TicketStore, VenueStore};
use crate::models::{
    Event, EventFilter, Feedback, FeedbackChanges, FeedbackSummary, FeedbackView, Payment, Ticket,
    TicketReceipt, TicketSettlement, TicketSummary, User, Venue,
};
use crate::scheduling::{feedback, overlap, payments, tickets};
use crate::scheduling::{SchedulingError, SchedulingResult, TimeWindow};

const VENUE_COLUMNS: &str =
    "id, name, address, city, state, zip_code, fee_per_day, created_at, updated_at";
const EVENT_COLUMNS: &str = "id, title, description, venue_id, organizer_id, start_time, end_time, \
     price_per_ticket, created_at, updated_at";
const TICKET_COLUMNS: &str = "id, event_id, holder_id, quantity, status, booked_at, updated_at";
const PAYMENT_COLUMNS: &str = "id, kind, event_id, ticket_id, amount, payer, paid_at";
const FEEDBACK_COLUMNS: &str =
    "id, event_id, ticket_id, author_id, rating, comment, submitted_at, updated_at";
const FEEDBACK_VIEW_SELECT: &str = "SELECT f.id, f.event_id, e.title AS event_title, f.ticket_id, \
     f.author_id, f.rating, f.comment, f.submitted_at, f.updated_at \
     FROM feedback f JOIN events e ON e.id = f.event_id";

const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
const SQLSTATE_DEADLOCK: &str = "40P01";
const SQLSTATE_FOREIGN_KEY_VIOLATION: &str = "23503";
const SQLSTATE_EXCLUSION_VIOLATION: &str = "23P01";

impl From<sqlx::Error> for SchedulingError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed => SchedulingError::Unavailable(err.to_string()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(SQLSTATE_SERIALIZATION_FAILURE) | Some(SQLSTATE_DEADLOCK) => {
                    SchedulingError::Unavailable(db.message().to_string())
                }
                Some(SQLSTATE_FOREIGN_KEY_VIOLATION) => {
                    SchedulingError::InUse(db.message().to_string())
                }
                _ => SchedulingError::Internal(db.message().to_string()),
            },
            _ => SchedulingError::Internal(err.to_string()),
        }
    }
}

fn is_exclusion_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(SQLSTATE_EXCLUSION_VIOLATION))
}

/// Postgres-backed store. Venue rows are locked `FOR UPDATE` around calendar
/// checks, and the `events_no_venue_overlap` exclusion constraint backs the
/// same rule at the schema level.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> SchedulingResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn lock_venue(tx: &mut Transaction<'_, Postgres>, venue_id: Uuid) -> SchedulingResult<()> {
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM venues WHERE id = $1 FOR UPDATE")
                .bind(venue_id)
                .fetch_optional(&mut **tx)
                .await?;
        locked
            .map(|_| ())
            .ok_or_else(|| SchedulingError::not_found("Venue", venue_id))
    }

    /// Runs the overlap rule over the venue's candidates while its row lock
    /// is held.
    async fn check_calendar(
        tx: &mut Transaction<'_, Postgres>,
        event: &Event,
        exclude: Option<Uuid>,
    ) -> SchedulingResult<()> {
        let window = TimeWindow::new(event.start_time, event.end_time)?;
        Self::lock_venue(tx, event.venue_id).await?;
        let nearby: Vec<Event> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE venue_id = $1 AND start_time < $3 AND end_time > $2"
        ))
        .bind(event.venue_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&mut **tx)
        .await?;
        overlap::ensure_free(event.venue_id, &window, exclude, &nearby)
    }

    async fn overlap_backstop(&self, err: sqlx::Error, event: &Event, exclude: Option<Uuid>) -> SchedulingError {
        if !is_exclusion_violation(&err) {
            return err.into();
        }
        let window = TimeWindow::new_unchecked(event.start_time, event.end_time);
        let conflicting_event = self
            .find_conflict(event.venue_id, window, exclude)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(Uuid::nil);
        SchedulingError::Overlap {
            venue_id: event.venue_id,
            conflicting_event,
        }
    }
}

#[async_trait]
impl Directory for PgStore {
    async fn user(&self, id: Uuid) -> SchedulingResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, role, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl VenueStore for PgStore {
    async fn insert_venue(&self, venue: Venue) -> SchedulingResult<Venue> {
        let venue = sqlx::query_as::<_, Venue>(&format!(
            "INSERT INTO venues ({VENUE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {VENUE_COLUMNS}"
        ))
        .bind(venue.id)
        .bind(&venue.name)
        .bind(&venue.address)
        .bind(&venue.city)
        .bind(&venue.state)
        .bind(&venue.zip_code)
        .bind(venue.fee_per_day)
        .bind(venue.created_at)
        .bind(venue.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(venue)
    }

    async fn venue(&self, id: Uuid) -> SchedulingResult<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>(&format!(
            "SELECT {VENUE_COLUMNS} FROM venues WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(venue)
    }

    async fn venues(&self) -> SchedulingResult<Vec<Venue>> {
        let venues = sqlx::query_as::<_, Venue>(&format!(
            "SELECT {VENUE_COLUMNS} FROM venues ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(venues)
    }

    async fn update_venue(&self, venue: Venue) -> SchedulingResult<Venue> {
        sqlx::query_as::<_, Venue>(&format!(
            "UPDATE venues SET name = $2, address = $3, city = $4, state = $5, zip_code = $6, \
             fee_per_day = $7, updated_at = $8 WHERE id = $1 RETURNING {VENUE_COLUMNS}"
        ))
        .bind(venue.id)
        .bind(&venue.name)
        .bind(&venue.address)
        .bind(&venue.city)
        .bind(&venue.state)
        .bind(&venue.zip_code)
        .bind(venue.fee_per_day)
        .bind(venue.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| SchedulingError::not_found("Venue", venue.id))
    }

    async fn delete_venue(&self, id: Uuid) -> SchedulingResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_venue(&mut tx, id).await?;

        let in_use: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE venue_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if in_use {
            return Err(SchedulingError::InUse(format!(
                "venue {id} still has scheduled events"
            )));
        }

        sqlx::query("DELETE FROM venues WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn insert_event(&self, event: Event) -> SchedulingResult<Event> {
        let mut tx = self.pool.begin().await?;
        Self::check_calendar(&mut tx, &event, None).await?;

        let inserted = sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events ({EVENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.venue_id)
        .bind(event.organizer_id)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.price_per_ticket)
        .bind(event.created_at)
        .bind(event.updated_at)
        .fetch_one(&mut *tx)
        .await;

        let inserted = match inserted {
            Ok(row) => row,
            Err(e) => {
                drop(tx);
                return Err(self.overlap_backstop(e, &event, None).await);
            }
        };
        tx.commit().await?;
        Ok(inserted)
    }

    async fn update_event(&self, event: Event) -> SchedulingResult<Event> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM events WHERE id = $1 FOR UPDATE")
                .bind(event.id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(SchedulingError::not_found("Event", event.id));
        }
        Self::check_calendar(&mut tx, &event, Some(event.id)).await?;

        let updated = sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET title = $2, description = $3, venue_id = $4, start_time = $5, \
             end_time = $6, price_per_ticket = $7, updated_at = $8 \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.venue_id)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.price_per_ticket)
        .bind(event.updated_at)
        .fetch_one(&mut *tx)
        .await;

        let updated = match updated {
            Ok(row) => row,
            Err(e) => {
                drop(tx);
                return Err(self.overlap_backstop(e, &event, Some(event.id)).await);
            }
        };
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_event(&self, id: Uuid) -> SchedulingResult<()> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM events WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(SchedulingError::not_found("Event", id));
        }

        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM tickets WHERE event_id = $1) \
                 OR EXISTS (SELECT 1 FROM payments WHERE event_id = $1) \
                 OR EXISTS (SELECT 1 FROM feedback WHERE event_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if referenced {
            return Err(SchedulingError::InUse(format!(
                "event {id} has tickets, payments or feedback"
            )));
        }

        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn event(&self, id: Uuid) -> SchedulingResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn events(&self, filter: &EventFilter) -> SchedulingResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE ($1::uuid IS NULL OR venue_id = $1) ORDER BY start_time, id"
        ))
        .bind(filter.venue_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn find_conflict(
        &self,
        venue_id: Uuid,
        window: TimeWindow,
        exclude: Option<Uuid>,
    ) -> SchedulingResult<Option<Uuid>> {
        let nearby = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE venue_id = $1 AND start_time < $3 AND end_time > $2"
        ))
        .bind(venue_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(overlap::find_conflict(venue_id, &window, exclude, &nearby).map(|e| e.id))
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn insert_ticket(&self, ticket: Ticket) -> SchedulingResult<Ticket> {
        let inserted = sqlx::query_as::<_, Ticket>(&format!(
            "INSERT INTO tickets ({TICKET_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(ticket.id)
        .bind(ticket.event_id)
        .bind(ticket.holder_id)
        .bind(ticket.quantity)
        .bind(ticket.status)
        .bind(ticket.booked_at)
        .bind(ticket.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match SchedulingError::from(e) {
            // the event was deleted between lookup and insert
            SchedulingError::InUse(_) => SchedulingError::not_found("Event", ticket.event_id),
            other => other,
        })?;
        Ok(inserted)
    }

    async fn ticket(&self, id: Uuid) -> SchedulingResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn tickets_for_holder(&self, holder_id: Uuid) -> SchedulingResult<Vec<TicketSummary>> {
        let rows = sqlx::query_as::<_, TicketSummary>(
            "SELECT t.id, t.event_id, e.title AS event_title, t.quantity, t.status, t.booked_at \
             FROM tickets t JOIN events e ON e.id = t.event_id \
             WHERE t.holder_id = $1 ORDER BY t.booked_at, t.id",
        )
        .bind(holder_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn cancel_ticket(
        &self,
        ticket_id: Uuid,
        holder_id: Uuid,
        at: DateTime<Utc>,
    ) -> SchedulingResult<Ticket> {
        let mut tx = self.pool.begin().await?;
        let mut ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 AND holder_id = $2 FOR UPDATE"
        ))
        .bind(ticket_id)
        .bind(holder_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| SchedulingError::not_found("Ticket", ticket_id))?;

        tickets::cancel(&mut ticket, at)?;

        sqlx::query("UPDATE tickets SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(ticket.id)
            .bind(ticket.status)
            .bind(ticket.updated_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(ticket)
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn append_payment(&self, payment: Payment) -> SchedulingResult<Payment> {
        let inserted = sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.id)
        .bind(payment.kind)
        .bind(payment.event_id)
        .bind(payment.ticket_id)
        .bind(payment.amount)
        .bind(&payment.payer)
        .bind(payment.paid_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match SchedulingError::from(e) {
            SchedulingError::InUse(msg) => SchedulingError::NotFound(msg),
            other => other,
        })?;
        Ok(inserted)
    }

    async fn settle_ticket(&self, settlement: TicketSettlement) -> SchedulingResult<TicketReceipt> {
        let mut tx = self.pool.begin().await?;
        let mut ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 FOR UPDATE"
        ))
        .bind(settlement.ticket_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| SchedulingError::not_found("Ticket", settlement.ticket_id))?;

        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(ticket.event_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| SchedulingError::not_found("Event", ticket.event_id))?;

        let payment = payments::settle(&mut ticket, &event, &settlement)?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.id)
        .bind(payment.kind)
        .bind(payment.event_id)
        .bind(payment.ticket_id)
        .bind(payment.amount)
        .bind(&payment.payer)
        .bind(payment.paid_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE tickets SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(ticket.id)
            .bind(ticket.status)
            .bind(ticket.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(TicketReceipt { payment, ticket })
    }

    async fn payments_for_event(&self, event_id: Uuid) -> SchedulingResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE event_id = $1 \
                OR ticket_id IN (SELECT id FROM tickets WHERE event_id = $1) \
             ORDER BY paid_at, id"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl FeedbackStore for PgStore {
    async fn insert_feedback(&self, entry: Feedback) -> SchedulingResult<Feedback> {
        let mut tx = self.pool.begin().await?;
        // FOR SHARE keeps a concurrent cancel from slipping in before commit
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 FOR SHARE"
        ))
        .bind(entry.ticket_id)
        .fetch_optional(&mut *tx)
        .await?;
        feedback::check_eligibility(ticket.as_ref(), &entry)?;

        let inserted = sqlx::query_as::<_, Feedback>(&format!(
            "INSERT INTO feedback ({FEEDBACK_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {FEEDBACK_COLUMNS}"
        ))
        .bind(entry.id)
        .bind(entry.event_id)
        .bind(entry.ticket_id)
        .bind(entry.author_id)
        .bind(entry.rating)
        .bind(&entry.comment)
        .bind(entry.submitted_at)
        .bind(entry.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn update_feedback(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: &FeedbackChanges,
        at: DateTime<Utc>,
    ) -> SchedulingResult<Feedback> {
        sqlx::query_as::<_, Feedback>(&format!(
            "UPDATE feedback SET rating = $3, comment = $4, updated_at = $5 \
             WHERE id = $1 AND author_id = $2 RETURNING {FEEDBACK_COLUMNS}"
        ))
        .bind(id)
        .bind(author_id)
        .bind(changes.rating)
        .bind(&changes.comment)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| SchedulingError::not_found("Feedback", id))
    }

    async fn delete_feedback(&self, id: Uuid) -> SchedulingResult<()> {
        let result = sqlx::query("DELETE FROM feedback WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SchedulingError::not_found("Feedback", id));
        }
        Ok(())
    }

    async fn feedback(&self, id: Uuid) -> SchedulingResult<Option<FeedbackView>> {
        let view = sqlx::query_as::<_, FeedbackView>(&format!(
            "{FEEDBACK_VIEW_SELECT} WHERE f.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(view)
    }

    async fn feedback_list(&self, author_id: Option<Uuid>) -> SchedulingResult<Vec<FeedbackView>> {
        let views = sqlx::query_as::<_, FeedbackView>(&format!(
            "{FEEDBACK_VIEW_SELECT} WHERE ($1::uuid IS NULL OR f.author_id = $1) \
             ORDER BY f.submitted_at, f.id"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(views)
    }

    async fn feedback_summary(&self) -> SchedulingResult<Vec<FeedbackSummary>> {
        let rows = sqlx::query_as::<_, FeedbackSummary>(
            "SELECT f.event_id, e.title AS event_title, \
                    AVG(f.rating)::float8 AS average_rating, COUNT(*) AS total_feedback \
             FROM feedback f JOIN events e ON e.id = f.event_id \
             GROUP BY f.event_id, e.title ORDER BY e.title, f.event_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

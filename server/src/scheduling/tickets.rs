use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use super::error::{SchedulingError, SchedulingResult};
use super::notify::Notification;
use super::Context;
use crate::models::{BookTicket, Ticket, TicketStatus, TicketSummary};

// Lifecycle:
//   payment_pending --(ticket fee paid)--> confirmed
//   payment_pending | confirmed --(cancel)--> cancelled
// cancelled is terminal and nothing ever returns to payment_pending.

pub fn open_ticket(
    holder_id: Uuid,
    event_id: Uuid,
    quantity: i32,
    at: DateTime<Utc>,
) -> SchedulingResult<Ticket> {
    validate_quantity(quantity)?;
    Ok(Ticket {
        id: Uuid::new_v4(),
        event_id,
        holder_id,
        quantity,
        status: TicketStatus::PaymentPending,
        booked_at: at,
        updated_at: at,
    })
}

pub fn validate_quantity(quantity: i32) -> SchedulingResult<()> {
    if quantity < 1 {
        return Err(SchedulingError::Validation(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    Ok(())
}

pub fn cancel(ticket: &mut Ticket, at: DateTime<Utc>) -> SchedulingResult<()> {
    match ticket.status {
        TicketStatus::Cancelled => Err(SchedulingError::AlreadyCancelled(ticket.id)),
        TicketStatus::PaymentPending | TicketStatus::Confirmed => {
            ticket.status = TicketStatus::Cancelled;
            ticket.updated_at = at;
            Ok(())
        }
    }
}

/// Only the payment ledger's settlement path calls this, inside the same
/// transaction that writes the ticket-fee row.
pub(crate) fn confirm_via_payment(ticket: &mut Ticket, at: DateTime<Utc>) -> SchedulingResult<()> {
    match ticket.status {
        TicketStatus::PaymentPending => {
            ticket.status = TicketStatus::Confirmed;
            ticket.updated_at = at;
            Ok(())
        }
        TicketStatus::Confirmed => Err(SchedulingError::AlreadyConfirmed(ticket.id)),
        TicketStatus::Cancelled => Err(SchedulingError::AlreadyCancelled(ticket.id)),
    }
}

#[derive(Clone)]
pub struct TicketLifecycle {
    ctx: Context,
}

impl TicketLifecycle {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, request), fields(event_id = %request.event_id))]
    pub async fn book(&self, holder_id: Uuid, request: BookTicket) -> SchedulingResult<Ticket> {
        validate_quantity(request.quantity)?;

        let event = self
            .ctx
            .guarded(self.ctx.store().event(request.event_id))
            .await?
            .ok_or_else(|| SchedulingError::not_found("Event", request.event_id))?;

        let ticket = open_ticket(holder_id, event.id, request.quantity, self.ctx.now())?;
        let ticket = self
            .ctx
            .guarded(self.ctx.store().insert_ticket(ticket))
            .await?;

        info!(ticket_id = %ticket.id, quantity = ticket.quantity, "Ticket booked, awaiting payment");

        self.ctx
            .notify(Notification::TicketBooked {
                holder_id,
                ticket_id: ticket.id,
                event_title: event.title,
                booked_at: ticket.booked_at,
            })
            .await;

        Ok(ticket)
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, ticket_id: Uuid, holder_id: Uuid) -> SchedulingResult<Ticket> {
        let now = self.ctx.now();
        let ticket = self
            .ctx
            .guarded(self.ctx.store().cancel_ticket(ticket_id, holder_id, now))
            .await?;

        info!(ticket_id = %ticket.id, "Ticket cancelled");

        let event_title = match self.ctx.guarded(self.ctx.store().event(ticket.event_id)).await {
            Ok(Some(event)) => event.title,
            Ok(None) => String::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not load event title for cancellation notice");
                String::new()
            }
        };
        self.ctx
            .notify(Notification::TicketCancelled {
                holder_id,
                ticket_id: ticket.id,
                event_title,
                cancelled_at: now,
            })
            .await;

        Ok(ticket)
    }

    /// The holder's own ticket; another user's ticket reads as not found.
    pub async fn get(&self, ticket_id: Uuid, holder_id: Uuid) -> SchedulingResult<Ticket> {
        self.ctx
            .guarded(self.ctx.store().ticket(ticket_id))
            .await?
            .filter(|t| t.holder_id == holder_id)
            .ok_or_else(|| SchedulingError::not_found("Ticket", ticket_id))
    }

    pub async fn list_for_holder(&self, holder_id: Uuid) -> SchedulingResult<Vec<TicketSummary>> {
        self.ctx
            .guarded(self.ctx.store().tickets_for_holder(holder_id))
            .await
    }
}

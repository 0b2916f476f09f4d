use tracing::{info, instrument};
use uuid::Uuid;

use super::error::{SchedulingError, SchedulingResult};
use super::fees;
use super::Context;
use crate::models::{Payment, TicketReceipt, TicketSettlement};

fn validate_payer(payer: &str) -> SchedulingResult<String> {
    let payer = payer.trim();
    if payer.is_empty() {
        return Err(SchedulingError::Validation(
            "payer identity is required".to_string(),
        ));
    }
    Ok(payer.to_string())
}

/// Append-only record of venue and ticket fees.
#[derive(Clone)]
pub struct PaymentLedger {
    ctx: Context,
}

impl PaymentLedger {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Bills the event's venue at its current per-day fee.
    #[instrument(skip(self, payer))]
    pub async fn record_venue_payment(&self, event_id: Uuid, payer: &str) -> SchedulingResult<Payment> {
        let payer = validate_payer(payer)?;

        let event = self
            .ctx
            .guarded(self.ctx.store().event(event_id))
            .await?
            .ok_or_else(|| SchedulingError::not_found("Event", event_id))?;
        let venue = self
            .ctx
            .guarded(self.ctx.store().venue(event.venue_id))
            .await?
            .ok_or_else(|| SchedulingError::not_found("Venue", event.venue_id))?;

        let amount = fees::venue_fee(venue.fee_per_day, event.start_time, event.end_time)?;
        let payment = Payment::venue_fee(event.id, amount, payer, self.ctx.now());
        if !payment.is_well_formed() {
            return Err(SchedulingError::Validation(format!(
                "venue fee for event {event_id} is not billable"
            )));
        }

        let payment = self
            .ctx
            .guarded(self.ctx.store().append_payment(payment))
            .await?;
        info!(payment_id = %payment.id, amount = %payment.amount, "Venue fee recorded");
        Ok(payment)
    }

    /// Charges `price_per_ticket * quantity` and confirms the ticket in the
    /// same transaction. A ticket that is already confirmed or cancelled is
    /// rejected without writing a row.
    #[instrument(skip(self, payer))]
    pub async fn record_ticket_payment(
        &self,
        ticket_id: Uuid,
        payer: &str,
    ) -> SchedulingResult<TicketReceipt> {
        let payer = validate_payer(payer)?;
        let settlement = TicketSettlement {
            ticket_id,
            payer,
            paid_at: self.ctx.now(),
        };

        let receipt = self
            .ctx
            .guarded(self.ctx.store().settle_ticket(settlement))
            .await?;
        info!(
            payment_id = %receipt.payment.id,
            amount = %receipt.payment.amount,
            "Ticket fee recorded, ticket confirmed"
        );
        Ok(receipt)
    }

    pub async fn history_for_event(&self, event_id: Uuid) -> SchedulingResult<Vec<Payment>> {
        self.ctx
            .guarded(self.ctx.store().event(event_id))
            .await?
            .ok_or_else(|| SchedulingError::not_found("Event", event_id))?;
        self.ctx
            .guarded(self.ctx.store().payments_for_event(event_id))
            .await
    }
}

/// Settlement rule shared by the store implementations: given the locked
/// ticket and its event, confirm the ticket and build the ledger row.
pub(crate) fn settle(
    ticket: &mut crate::models::Ticket,
    event: &crate::models::Event,
    settlement: &TicketSettlement,
) -> SchedulingResult<Payment> {
    super::tickets::confirm_via_payment(ticket, settlement.paid_at)?;
    let amount = fees::ticket_fee(event.price_per_ticket, ticket.quantity)?;
    let payment = Payment::ticket_fee(
        ticket.id,
        amount,
        settlement.payer.clone(),
        settlement.paid_at,
    );
    if !payment.is_well_formed() {
        return Err(SchedulingError::Validation(format!(
            "ticket {} has no billable amount",
            ticket.id
        )));
    }
    Ok(payment)
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ticket::Ticket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    VenueFee,
    TicketFee,
}

/// Ledger row. Rows are append-only; exactly one of `event_id` / `ticket_id`
/// is set, matching `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub kind: PaymentKind,
    pub event_id: Option<Uuid>,
    pub ticket_id: Option<Uuid>,
    pub amount: Decimal,
    pub payer: String,
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    pub fn venue_fee(event_id: Uuid, amount: Decimal, payer: String, paid_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: PaymentKind::VenueFee,
            event_id: Some(event_id),
            ticket_id: None,
            amount,
            payer,
            paid_at,
        }
    }

    pub fn ticket_fee(ticket_id: Uuid, amount: Decimal, payer: String, paid_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: PaymentKind::TicketFee,
            event_id: None,
            ticket_id: Some(ticket_id),
            amount,
            payer,
            paid_at,
        }
    }

    /// Checks the reference/kind pairing and the positive amount rule.
    pub fn is_well_formed(&self) -> bool {
        let refs_match = match self.kind {
            PaymentKind::VenueFee => self.event_id.is_some() && self.ticket_id.is_none(),
            PaymentKind::TicketFee => self.ticket_id.is_some() && self.event_id.is_none(),
        };
        refs_match && self.amount > Decimal::ZERO
    }
}

/// Everything a ticket-fee settlement needs; the amount is derived inside the
/// store transaction from the locked ticket and its event.
#[derive(Debug, Clone)]
pub struct TicketSettlement {
    pub ticket_id: Uuid,
    pub payer: String,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketReceipt {
    pub payment: Payment,
    pub ticket: Ticket,
}

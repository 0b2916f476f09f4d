use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    EventCreated {
        organizer_id: Uuid,
        event_id: Uuid,
        title: String,
        venue_name: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    },
    TicketBooked {
        holder_id: Uuid,
        ticket_id: Uuid,
        event_title: String,
        booked_at: DateTime<Utc>,
    },
    TicketCancelled {
        holder_id: Uuid,
        ticket_id: Uuid,
        event_title: String,
        cancelled_at: DateTime<Utc>,
    },
}

impl Notification {
    pub fn recipient(&self) -> Uuid {
        match self {
            Notification::EventCreated { organizer_id, .. } => *organizer_id,
            Notification::TicketBooked { holder_id, .. }
            | Notification::TicketCancelled { holder_id, .. } => *holder_id,
        }
    }
}

#[derive(Debug, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Best-effort delivery channel (email, push, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the tracing pipeline instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification)
            .map_err(|e| NotifyError(format!("could not encode notification: {e}")))?;
        tracing::info!(
            recipient = %notification.recipient(),
            payload = %payload,
            "Notification dispatched"
        );
        Ok(())
    }
}

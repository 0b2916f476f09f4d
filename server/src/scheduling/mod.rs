//! Event scheduling and ticket lifecycle engine.
//!
//! The pure rules (fees, overlap, ticket transitions, feedback eligibility)
//! are plain functions; the services in this module orchestrate them against
//! the [`Store`](crate::store::Store) and the other collaborators held in a
//! [`Context`].

pub mod clock;
pub mod error;
pub mod events;
pub mod feedback;
pub mod fees;
pub mod notify;
pub mod overlap;
pub mod payments;
pub mod tickets;
pub mod venues;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{SchedulingError, SchedulingResult};
pub use events::{Availability, EventCoordinator};
pub use feedback::FeedbackGate;
pub use notify::{LogNotifier, Notification, Notifier, NotifyError};
pub use overlap::TimeWindow;
pub use payments::PaymentLedger;
pub use tickets::TicketLifecycle;
pub use venues::VenueRegistry;

use crate::store::{Directory, Store};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Collaborators shared by every engine service.
#[derive(Clone)]
pub struct Context {
    store: Arc<dyn Store>,
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl Context {
    pub fn new(store: Arc<dyn Store>, directory: Arc<dyn Directory>) -> Self {
        Self {
            store,
            directory,
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub(crate) fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }

    /// Runs a storage or directory call under the configured deadline. A
    /// call that does not finish in time becomes `Unavailable`.
    pub(crate) async fn guarded<T, F>(&self, call: F) -> SchedulingResult<T>
    where
        F: Future<Output = SchedulingResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Storage call timed out");
                Err(SchedulingError::Unavailable(format!(
                    "storage did not respond within {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }

    /// Delivers a notification without ever failing the caller.
    pub(crate) async fn notify(&self, notification: Notification) {
        match tokio::time::timeout(self.timeout, self.notifier.notify(&notification)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, recipient = %notification.recipient(), "Dropping notification");
            }
            Err(_) => {
                tracing::warn!(recipient = %notification.recipient(), "Notification timed out, dropping");
            }
        }
    }
}

/// The full operation set, one service per component.
#[derive(Clone)]
pub struct Engine {
    pub venues: VenueRegistry,
    pub events: EventCoordinator,
    pub tickets: TicketLifecycle,
    pub payments: PaymentLedger,
    pub feedback: FeedbackGate,
}

impl Engine {
    pub fn new(ctx: Context) -> Self {
        Self {
            venues: VenueRegistry::new(ctx.clone()),
            events: EventCoordinator::new(ctx.clone()),
            tickets: TicketLifecycle::new(ctx.clone()),
            payments: PaymentLedger::new(ctx.clone()),
            feedback: FeedbackGate::new(ctx),
        }
    }
}

pub mod event;
pub mod feedback;
pub mod payment;
pub mod ticket;
pub mod user;
pub mod venue;

pub use event::{Event, EventChanges, EventFilter, NewEvent, ScheduledEvent};
pub use feedback::{Feedback, FeedbackChanges, FeedbackSummary, FeedbackView, SubmitFeedback};
pub use payment::{Payment, PaymentKind, TicketReceipt, TicketSettlement};
pub use ticket::{BookTicket, Ticket, TicketStatus, TicketSummary};
pub use user::{SeedUser, User, UserRole};
pub use venue::{NewVenue, Venue, VenueChanges, VenueDetails};

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use eventease_server::models::{
    BookTicket, EventChanges, EventFilter, FeedbackChanges, NewEvent, NewVenue, PaymentKind,
    SubmitFeedback, TicketStatus, User, UserRole, Venue, VenueChanges,
};
use eventease_server::scheduling::{
    Context, Engine, FixedClock, Notification, Notifier, NotifyError, SchedulingError,
    SchedulingResult,
};
use eventease_server::store::{Directory, MemoryStore, PaymentStore};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
}

fn user(role: UserRole) -> User {
    User {
        id: Uuid::new_v4(),
        name: format!("{} user", role.as_str()),
        email: format!("{}@example.com", Uuid::new_v4()),
        role,
        created_at: at(1, 0),
        updated_at: at(1, 0),
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError("smtp relay refused connection".to_string()))
    }
}

struct SlowDirectory;

#[async_trait]
impl Directory for SlowDirectory {
    async fn user(&self, _id: Uuid) -> SchedulingResult<Option<User>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }
}

struct Harness {
    engine: Engine,
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    organizer: User,
    attendee: User,
}

impl Harness {
    async fn new() -> Self {
        Self::with_notifier(Arc::new(RecordingNotifier::default())).await
    }

    async fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(at(1, 9)));
        let organizer = user(UserRole::Organizer);
        let attendee = user(UserRole::RegisteredUser);
        store.insert_user(organizer.clone()).await;
        store.insert_user(attendee.clone()).await;

        let ctx = Context::new(store.clone(), store.clone())
            .with_clock(clock.clone())
            .with_notifier(notifier);
        Self {
            engine: Engine::new(ctx),
            store,
            clock,
            organizer,
            attendee,
        }
    }

    async fn venue(&self, fee_per_day: i64) -> Venue {
        self.engine
            .venues
            .create(NewVenue {
                name: "Harbor Hall".to_string(),
                address: "1 Pier Road".to_string(),
                city: "Portside".to_string(),
                state: "CA".to_string(),
                zip_code: None,
                fee_per_day: Decimal::from(fee_per_day),
            })
            .await
            .unwrap()
    }

    fn new_event(venue: &Venue, start: DateTime<Utc>, end: DateTime<Utc>, price: i64) -> NewEvent {
        NewEvent {
            title: "Summer Showcase".to_string(),
            description: None,
            start_time: start,
            end_time: end,
            venue_id: venue.id,
            price_per_ticket: Decimal::from(price),
        }
    }
}

#[tokio::test]
async fn test_same_day_event_costs_one_day_and_blocks_overlap() {
    let h = Harness::new().await;
    let venue = h.venue(30000).await;

    let scheduled = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 10), at(10, 12), 500))
        .await
        .unwrap();
    assert_eq!(scheduled.venue_fee, Decimal::from(30000));

    let err = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 11), at(10, 13), 500))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SchedulingError::Overlap {
            venue_id: venue.id,
            conflicting_event: scheduled.event.id,
        }
    );

    // back-to-back slots share only a boundary
    h.engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 12), at(10, 14), 500))
        .await
        .unwrap();

    let events = h
        .engine
        .events
        .list_events(EventFilter {
            venue_id: Some(venue.id),
        })
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn test_multi_day_event_bills_whole_elapsed_days_plus_one() {
    let h = Harness::new().await;
    let venue = h.venue(1000).await;

    // 39 hours: one whole elapsed day, billed as two
    let overnight = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 18), at(12, 9), 50))
        .await
        .unwrap();
    assert_eq!(overnight.venue_fee, Decimal::from(2000));

    // 49 hours: two whole elapsed days, billed as three
    let weekend = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(13, 18), at(15, 19), 50))
        .await
        .unwrap();
    assert_eq!(weekend.venue_fee, Decimal::from(3000));

    let payment = h
        .engine
        .payments
        .record_venue_payment(weekend.event.id, &h.organizer.email)
        .await
        .unwrap();
    assert_eq!(payment.kind, PaymentKind::VenueFee);
    assert_eq!(payment.amount, Decimal::from(3000));
    assert_eq!(payment.event_id, Some(weekend.event.id));
    assert_eq!(payment.ticket_id, None);
}

#[tokio::test]
async fn test_update_can_move_event_but_not_onto_another() {
    let h = Harness::new().await;
    let venue = h.venue(100).await;
    let first = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 10), at(10, 12), 20))
        .await
        .unwrap();
    let second = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(11, 10), at(11, 12), 20))
        .await
        .unwrap();

    let moved = h
        .engine
        .events
        .update_event(
            first.event.id,
            EventChanges {
                end_time: Some(at(10, 13)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.event.end_time, at(10, 13));

    let err = h
        .engine
        .events
        .update_event(
            first.event.id,
            EventChanges {
                start_time: Some(at(11, 9)),
                end_time: Some(at(11, 11)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulingError::Overlap { conflicting_event, .. } if conflicting_event == second.event.id
    ));
}

#[tokio::test]
async fn test_ticket_payment_confirms_once() {
    let h = Harness::new().await;
    let venue = h.venue(100).await;
    let event = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 10), at(10, 12), 500))
        .await
        .unwrap()
        .event;

    let ticket = h
        .engine
        .tickets
        .book(
            h.attendee.id,
            BookTicket {
                event_id: event.id,
                quantity: 3,
            },
        )
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::PaymentPending);

    h.clock.advance(chrono::Duration::minutes(5));
    let receipt = h
        .engine
        .payments
        .record_ticket_payment(ticket.id, &h.attendee.email)
        .await
        .unwrap();
    assert_eq!(receipt.payment.amount, Decimal::from(1500));
    assert_eq!(receipt.payment.kind, PaymentKind::TicketFee);
    assert_eq!(receipt.ticket.status, TicketStatus::Confirmed);

    let err = h
        .engine
        .payments
        .record_ticket_payment(ticket.id, &h.attendee.email)
        .await
        .unwrap_err();
    assert_eq!(err, SchedulingError::AlreadyConfirmed(ticket.id));

    let history = h.store.payments_for_event(event.id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_cancelled_ticket_cannot_be_paid() {
    let h = Harness::new().await;
    let venue = h.venue(100).await;
    let event = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 10), at(10, 12), 40))
        .await
        .unwrap()
        .event;
    let ticket = h
        .engine
        .tickets
        .book(
            h.attendee.id,
            BookTicket {
                event_id: event.id,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let cancelled = h.engine.tickets.cancel(ticket.id, h.attendee.id).await.unwrap();
    assert_eq!(cancelled.status, TicketStatus::Cancelled);

    let err = h
        .engine
        .payments
        .record_ticket_payment(ticket.id, &h.attendee.email)
        .await
        .unwrap_err();
    assert_eq!(err, SchedulingError::AlreadyCancelled(ticket.id));

    let err = h.engine.tickets.cancel(ticket.id, h.attendee.id).await.unwrap_err();
    assert_eq!(err, SchedulingError::AlreadyCancelled(ticket.id));

    let history = h.engine.payments.history_for_event(event.id).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_feedback_requires_confirmed_ticket_for_the_event() {
    let h = Harness::new().await;
    let venue = h.venue(100).await;
    let event = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 10), at(10, 12), 40))
        .await
        .unwrap()
        .event;
    let other_event = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(12, 10), at(12, 12), 40))
        .await
        .unwrap()
        .event;
    let ticket = h
        .engine
        .tickets
        .book(
            h.attendee.id,
            BookTicket {
                event_id: event.id,
                quantity: 2,
            },
        )
        .await
        .unwrap();

    let submission = |event_id: Uuid| SubmitFeedback {
        event_id,
        ticket_id: ticket.id,
        rating: 9,
        comment: Some("Great acoustics".to_string()),
    };

    let err = h
        .engine
        .feedback
        .submit(h.attendee.id, submission(event.id))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Ineligible(_)));

    h.engine
        .payments
        .record_ticket_payment(ticket.id, &h.attendee.email)
        .await
        .unwrap();

    let err = h
        .engine
        .feedback
        .submit(h.attendee.id, submission(other_event.id))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Ineligible(_)));

    let stranger = Uuid::new_v4();
    let err = h
        .engine
        .feedback
        .submit(stranger, submission(event.id))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Ineligible(_)));

    let entry = h
        .engine
        .feedback
        .submit(h.attendee.id, submission(event.id))
        .await
        .unwrap();
    assert_eq!(entry.rating, 9);

    let summary = h.engine.feedback.summary_by_event().await.unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].event_id, event.id);
    assert_eq!(summary[0].total_feedback, 1);
    assert!((summary[0].average_rating - 9.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_non_organizer_cannot_create_event() {
    let h = Harness::new().await;
    let venue = h.venue(100).await;

    let err = h
        .engine
        .events
        .create_event(h.attendee.id, Harness::new_event(&venue, at(10, 10), at(10, 12), 40))
        .await
        .unwrap_err();
    assert_eq!(err, SchedulingError::InvalidOrganizer(h.attendee.id));

    let unknown = Uuid::new_v4();
    let err = h
        .engine
        .events
        .create_event(unknown, Harness::new_event(&venue, at(10, 10), at(10, 12), 40))
        .await
        .unwrap_err();
    assert_eq!(err, SchedulingError::InvalidOrganizer(unknown));
}

#[tokio::test]
async fn test_reversed_window_is_rejected_before_storage() {
    let h = Harness::new().await;
    let venue = h.venue(100).await;

    let err = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 12), at(10, 10), 40))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let events = h.engine.events.list_events(EventFilter::default()).await.unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_notifications_follow_state_changes() {
    let notifier = Arc::new(RecordingNotifier::default());
    let h = Harness::with_notifier(notifier.clone()).await;
    let venue = h.venue(100).await;
    let event = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 10), at(10, 12), 40))
        .await
        .unwrap()
        .event;
    let ticket = h
        .engine
        .tickets
        .book(
            h.attendee.id,
            BookTicket {
                event_id: event.id,
                quantity: 1,
            },
        )
        .await
        .unwrap();
    h.engine.tickets.cancel(ticket.id, h.attendee.id).await.unwrap();

    let sent = notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].recipient(), h.organizer.id);
    assert!(matches!(sent[1], Notification::TicketBooked { ticket_id, .. } if ticket_id == ticket.id));
    assert!(
        matches!(&sent[2], Notification::TicketCancelled { event_title, .. } if event_title == "Summer Showcase")
    );
}

#[tokio::test]
async fn test_failed_notification_does_not_fail_booking() {
    let h = Harness::with_notifier(Arc::new(FailingNotifier)).await;
    let venue = h.venue(100).await;
    let event = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 10), at(10, 12), 40))
        .await
        .unwrap()
        .event;

    let ticket = h
        .engine
        .tickets
        .book(
            h.attendee.id,
            BookTicket {
                event_id: event.id,
                quantity: 1,
            },
        )
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::PaymentPending);
}

#[tokio::test]
async fn test_slow_directory_surfaces_unavailable() {
    let store = Arc::new(MemoryStore::new());
    let ctx = Context::new(store, Arc::new(SlowDirectory)).with_timeout(Duration::from_millis(50));
    let engine = Engine::new(ctx);
    let venue = engine
        .venues
        .create(NewVenue {
            name: "Annex".to_string(),
            address: "2 Side St".to_string(),
            city: "Portside".to_string(),
            state: "CA".to_string(),
            zip_code: Some("90000".to_string()),
            fee_per_day: Decimal::from_str("250.50").unwrap(),
        })
        .await
        .unwrap();

    let err = engine
        .events
        .create_event(Uuid::new_v4(), Harness::new_event(&venue, at(10, 10), at(10, 12), 40))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, SchedulingError::Unavailable(_)));
}

#[tokio::test]
async fn test_concurrent_bookings_for_one_slot_admit_one() {
    let h = Harness::new().await;
    let venue = h.venue(100).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let engine = h.engine.clone();
        let organizer = h.organizer.id;
        let request = Harness::new_event(&venue, at(20, 18), at(20, 22), 15);
        handles.push(tokio::spawn(async move {
            engine.events.create_event(organizer, request).await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(e) => assert!(matches!(e, SchedulingError::Overlap { .. })),
        }
    }
    assert_eq!(admitted, 1);
}

#[tokio::test]
async fn test_event_with_bookings_cannot_be_deleted() {
    let h = Harness::new().await;
    let venue = h.venue(100).await;
    let booked = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 10), at(10, 12), 40))
        .await
        .unwrap()
        .event;
    let empty = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(11, 10), at(11, 12), 40))
        .await
        .unwrap()
        .event;
    h.engine
        .tickets
        .book(
            h.attendee.id,
            BookTicket {
                event_id: booked.id,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let err = h.engine.events.delete_event(booked.id).await.unwrap_err();
    assert!(matches!(err, SchedulingError::InUse(_)));

    h.engine.events.delete_event(empty.id).await.unwrap();
    let err = h.engine.events.get_event(empty.id).await.unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound(_)));

    // the freed slot can be booked again
    h.engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(11, 10), at(11, 12), 40))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_feedback_can_be_edited_by_author_and_removed() {
    let h = Harness::new().await;
    let venue = h.venue(100).await;
    let event = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 10), at(10, 12), 40))
        .await
        .unwrap()
        .event;
    let ticket = h
        .engine
        .tickets
        .book(
            h.attendee.id,
            BookTicket {
                event_id: event.id,
                quantity: 1,
            },
        )
        .await
        .unwrap();
    h.engine
        .payments
        .record_ticket_payment(ticket.id, &h.attendee.email)
        .await
        .unwrap();
    let entry = h
        .engine
        .feedback
        .submit(
            h.attendee.id,
            SubmitFeedback {
                event_id: event.id,
                ticket_id: ticket.id,
                rating: 4,
                comment: None,
            },
        )
        .await
        .unwrap();

    h.clock.advance(chrono::Duration::days(2));
    let changes = FeedbackChanges {
        rating: 7,
        comment: Some("Better on reflection".to_string()),
    };
    let err = h
        .engine
        .feedback
        .update(entry.id, h.organizer.id, changes.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound(_)));

    let updated = h
        .engine
        .feedback
        .update(entry.id, h.attendee.id, changes)
        .await
        .unwrap();
    assert_eq!(updated.rating, 7);
    assert_eq!(updated.submitted_at, entry.submitted_at);
    assert_eq!(updated.updated_at, entry.submitted_at + chrono::Duration::days(2));

    let view = h.engine.feedback.get(entry.id).await.unwrap();
    assert_eq!(view.event_title, "Summer Showcase");
    assert_eq!(h.engine.feedback.list().await.unwrap().len(), 1);
    assert_eq!(
        h.engine
            .feedback
            .list_for_author(h.attendee.id)
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(h
        .engine
        .feedback
        .list_for_author(h.organizer.id)
        .await
        .unwrap()
        .is_empty());

    h.engine.feedback.delete(entry.id).await.unwrap();
    assert!(h.engine.feedback.list().await.unwrap().is_empty());
    let err = h.engine.feedback.delete(entry.id).await.unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound(_)));
}

#[tokio::test]
async fn test_missing_references_are_not_found() {
    let h = Harness::new().await;
    let venue = h.venue(100).await;
    let missing = Uuid::new_v4();

    let err = h
        .engine
        .tickets
        .book(
            h.attendee.id,
            BookTicket {
                event_id: missing,
                quantity: 1,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound(_)));

    let mut request = Harness::new_event(&venue, at(10, 10), at(10, 12), 40);
    request.venue_id = missing;
    let err = h
        .engine
        .events
        .create_event(h.organizer.id, request)
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound(_)));

    let err = h
        .engine
        .payments
        .record_venue_payment(missing, &h.organizer.email)
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound(_)));

    let err = h
        .engine
        .payments
        .record_ticket_payment(missing, &h.attendee.email)
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound(_)));

    assert!(h.engine.events.list_events(EventFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fee_change_leaves_recorded_payments_alone() {
    let h = Harness::new().await;
    let venue = h.venue(100).await;
    let event = h
        .engine
        .events
        .create_event(h.organizer.id, Harness::new_event(&venue, at(10, 10), at(10, 12), 40))
        .await
        .unwrap()
        .event;

    let first = h
        .engine
        .payments
        .record_venue_payment(event.id, &h.organizer.email)
        .await
        .unwrap();
    assert_eq!(first.amount, Decimal::from(100));

    let repriced = h
        .engine
        .venues
        .update(
            venue.id,
            VenueChanges {
                fee_per_day: Some(Decimal::from(250)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(repriced.fee_per_day, Decimal::from(250));

    let second = h
        .engine
        .payments
        .record_venue_payment(event.id, &h.organizer.email)
        .await
        .unwrap();
    assert_eq!(second.amount, Decimal::from(250));

    let history = h.engine.payments.history_for_event(event.id).await.unwrap();
    assert_eq!(history.len(), 2);
    let recorded = history.iter().find(|p| p.id == first.id).unwrap();
    assert_eq!(recorded.amount, Decimal::from(100));
}

#[tokio::test]
async fn test_seeded_directory_admits_organizer() {
    let store = Arc::new(MemoryStore::new());
    let seeded = store
        .seed_users_json(include_str!("../fixtures/users.json"), at(1, 0))
        .await
        .unwrap();
    assert_eq!(seeded, 4);

    let engine = Engine::new(Context::new(store.clone(), store));
    let venue = engine
        .venues
        .create(NewVenue {
            name: "Harbor Hall".to_string(),
            address: "1 Pier Road".to_string(),
            city: "Portside".to_string(),
            state: "CA".to_string(),
            zip_code: None,
            fee_per_day: Decimal::from(100),
        })
        .await
        .unwrap();

    let organizer = Uuid::parse_str("e4a1f6b8-2c3d-4e5f-9a0b-1c2d3e4f5a23").unwrap();
    let scheduled = engine
        .events
        .create_event(organizer, Harness::new_event(&venue, at(10, 10), at(10, 12), 40))
        .await
        .unwrap();
    assert_eq!(scheduled.event.organizer_id, organizer);
}

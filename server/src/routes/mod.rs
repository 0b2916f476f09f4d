use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{self, events, feedback, payments, tickets, venues};
use crate::scheduling::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let api = Router::new()
        .route("/venues", get(venues::list_venues).post(venues::create_venue))
        .route(
            "/venues/:id",
            get(venues::get_venue)
                .put(venues::update_venue)
                .delete(venues::delete_venue),
        )
        .route("/venues/:id/availability", get(venues::venue_availability))
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/tickets", post(tickets::book_ticket))
        .route("/tickets/mine", get(tickets::my_tickets))
        .route("/tickets/:id", get(tickets::get_ticket))
        .route("/tickets/:id/cancel", put(tickets::cancel_ticket))
        .route("/payments/venue/:event_id", post(payments::pay_venue_fee))
        .route("/payments/ticket/:ticket_id", post(payments::pay_ticket_fee))
        .route("/payments/event/:event_id", get(payments::event_payments))
        .route(
            "/feedback",
            get(feedback::list_feedback).post(feedback::submit_feedback),
        )
        .route("/feedback/mine", get(feedback::my_feedback))
        .route("/feedback/summary", get(feedback::feedback_summary))
        .route(
            "/feedback/:id",
            get(feedback::get_feedback)
                .put(feedback::update_feedback)
                .delete(feedback::delete_feedback),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .fallback(handlers::route_not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config.production))
        .layer(create_cors_layer(config.cors_allowed_origins.as_deref()))
}

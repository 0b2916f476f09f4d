use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use eventease_server::config::Config;
use eventease_server::models::{User, UserRole};
use eventease_server::routes::{create_routes, AppState};
use eventease_server::scheduling::{Context, Engine};
use eventease_server::store::MemoryStore;

#[derive(Clone, Copy)]
struct Caller {
    id: Uuid,
    role: &'static str,
}

struct TestApp {
    router: Router,
    super_admin: Caller,
    admin: Caller,
    organizer: Caller,
    attendee: Caller,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let organizer_id = Uuid::new_v4();
        let now = Utc::now();
        store
            .insert_user(User {
                id: organizer_id,
                name: "Olive Organizer".to_string(),
                email: "olive@example.com".to_string(),
                role: UserRole::Organizer,
                created_at: now,
                updated_at: now,
            })
            .await;

        let engine = Engine::new(Context::new(store.clone(), store));
        let config = Config::from_lookup(|_| None);
        Self {
            router: create_routes(AppState::new(engine), &config),
            super_admin: Caller {
                id: Uuid::new_v4(),
                role: "super_admin",
            },
            admin: Caller {
                id: Uuid::new_v4(),
                role: "admin",
            },
            organizer: Caller {
                id: organizer_id,
                role: "organizer",
            },
            attendee: Caller {
                id: Uuid::new_v4(),
                role: "registered_user",
            },
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        caller: Option<Caller>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder
                .header("x-user-id", caller.id.to_string())
                .header("x-user-role", caller.role);
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&value).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create_venue(&self, fee_per_day: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/venues",
                Some(self.super_admin),
                Some(json!({
                    "name": "Harbor Hall",
                    "address": "1 Pier Road",
                    "city": "Portside",
                    "state": "CA",
                    "fee_per_day": fee_per_day,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_event(&self, venue_id: &str, start: &str, end: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/events",
            Some(self.organizer),
            Some(json!({
                "title": "Summer Showcase",
                "venue_id": venue_id,
                "start_time": start,
                "end_time": end,
                "price_per_ticket": "500",
            })),
        )
        .await
    }
}

#[tokio::test]
async fn test_health_check_carries_security_headers() {
    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert!(!response.headers().contains_key("strict-transport-security"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/api/events", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn test_role_checks_guard_each_route() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::GET, "/api/venues", Some(app.organizer), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = app
        .send(Method::GET, "/api/feedback/summary", Some(app.attendee), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::GET, "/api/feedback/summary", Some(app.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_body_and_unknown_route() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/venues",
            Some(app.super_admin),
            Some(json!({ "name": "No fee" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .send(Method::GET, "/api/events/not-a-uuid", Some(app.attendee), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app.send(Method::GET, "/api/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_scheduling_conflicts_are_reported() {
    let app = TestApp::new().await;
    let venue_id = app.create_venue("30000").await;

    let (status, body) = app
        .create_event(&venue_id, "2030-03-14T10:00:00Z", "2030-03-14T12:00:00Z")
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["venue_fee"], "30000");
    let event_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .create_event(&venue_id, "2030-03-14T11:00:00Z", "2030-03-14T13:00:00Z")
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "OVERLAP");
    assert_eq!(body["error"]["details"]["conflicting_event"], event_id.as_str());

    let (status, body) = app
        .create_event(&venue_id, "2030-03-14T12:00:00Z", "2030-03-14T10:00:00Z")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let uri = format!(
        "/api/venues/{venue_id}/availability?start=2030-03-14T11:30:00Z&end=2030-03-14T14:00:00Z"
    );
    let (status, body) = app.send(Method::GET, &uri, Some(app.attendee), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available"], false);

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/venues/{venue_id}"),
            Some(app.super_admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "IN_USE");
}

#[tokio::test]
async fn test_ticket_lifecycle_over_http() {
    let app = TestApp::new().await;
    let venue_id = app.create_venue("1000").await;
    let (_, body) = app
        .create_event(&venue_id, "2030-05-01T18:00:00Z", "2030-05-01T22:00:00Z")
        .await;
    let event_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/tickets",
            Some(app.attendee),
            Some(json!({ "event_id": event_id, "quantity": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "payment_pending");
    let ticket_id = body["data"]["id"].as_str().unwrap().to_string();

    let pay_uri = format!("/api/payments/ticket/{ticket_id}");
    let (status, body) = app
        .send(Method::POST, &pay_uri, Some(app.attendee), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["payment"]["amount"], "1500");
    assert_eq!(body["data"]["ticket"]["status"], "confirmed");

    let (status, body) = app
        .send(Method::POST, &pay_uri, Some(app.attendee), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_CONFIRMED");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/feedback",
            Some(app.attendee),
            Some(json!({
                "event_id": event_id,
                "ticket_id": ticket_id,
                "rating": 8,
                "comment": "Loved it",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, body) = app
        .send(Method::GET, "/api/tickets/mine", Some(app.attendee), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["event_title"], "Summer Showcase");

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/payments/event/{event_id}"),
            Some(app.organizer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/tickets/{ticket_id}/cancel"),
            Some(app.attendee),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
}

#[tokio::test]
async fn test_feedback_without_paid_ticket_is_ineligible() {
    let app = TestApp::new().await;
    let venue_id = app.create_venue("1000").await;
    let (_, body) = app
        .create_event(&venue_id, "2030-06-01T18:00:00Z", "2030-06-01T22:00:00Z")
        .await;
    let event_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .send(
            Method::POST,
            "/api/tickets",
            Some(app.attendee),
            Some(json!({ "event_id": event_id, "quantity": 1 })),
        )
        .await;
    let ticket_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/feedback",
            Some(app.attendee),
            Some(json!({ "event_id": event_id, "ticket_id": ticket_id, "rating": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INELIGIBLE");
}

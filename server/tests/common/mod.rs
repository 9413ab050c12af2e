//! Shared fixtures: an app wired to the in-memory store, the sandbox
//! gateway and a notifier that records what it was asked to send.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use eventpass_server::models::{Event, NewEvent};
use eventpass_server::notify::{Notifier, NotifyError, TicketNotification};
use eventpass_server::payment::{MockGateway, PaymentAdapter};
use eventpass_server::routes::create_routes;
use eventpass_server::store::MemoryStore;
use eventpass_server::{AppState, Settings};

pub const BASE_URL: &str = "http://localhost:3001";
pub const ADMIN_SECRET: &str = "test-admin-secret";

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<TicketNotification>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_ticket(&self, notification: &TicketNotification) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Delivery("relay refused connection".into()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub event: Event,
}

pub fn settings() -> Settings {
    Settings {
        base_url: BASE_URL.to_string(),
        admin_secret: ADMIN_SECRET.to_string(),
        currency: "INR".to_string(),
        notify_timeout: std::time::Duration::from_secs(2),
    }
}

pub fn concert() -> NewEvent {
    NewEvent {
        name: "Monsoon Live".into(),
        description: Some("An evening of indie rock".into()),
        date: Utc::now() + Duration::days(30),
        venue: "Phoenix Arena".into(),
        price: Decimal::new(20000, 2),
        image_url: None,
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(
            Arc::new(MockGateway::new(BASE_URL.to_string())),
            RecordingNotifier::default(),
        )
        .await
    }

    pub async fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self::build(Arc::new(MockGateway::new(BASE_URL.to_string())), notifier).await
    }

    pub async fn with_gateway(gateway: Arc<dyn PaymentAdapter>) -> Self {
        Self::build(gateway, RecordingNotifier::default()).await
    }

    async fn build(gateway: Arc<dyn PaymentAdapter>, notifier: RecordingNotifier) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(notifier);
        let event = store.insert_event(concert()).await;

        let state = AppState::new(store.clone(), gateway, notifier.clone(), settings());
        Self {
            router: create_routes(state.clone()),
            state,
            store,
            notifier,
            event,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, headers, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }

    /// Places an order for the fixture event and returns the response data.
    pub async fn place_order(&self) -> Value {
        let (status, body) = self
            .post_json(
                "/orders",
                serde_json::json!({
                    "eventId": self.event.id,
                    "name": "Asha Rao",
                    "email": "asha@example.com",
                    "phone": "9876543210"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "order failed: {body}");
        body["data"].clone()
    }
}

/// Callback body the sandbox page would produce.
pub fn mock_callback(transaction_id: &str, code: &str, checksum: &str) -> Value {
    serde_json::json!({
        "merchantTransactionId": transaction_id,
        "code": code,
        "providerReferenceId": format!("MOCK_PAY_{transaction_id}"),
        "checksum": checksum,
    })
}
